// src/error.rs
//! Domain error taxonomy. Plumbing (file IO, CLI) stays on `anyhow`.

use thiserror::Error;

/// Errors raised inside a source adapter. They never cross the adapter
/// boundary as errors: `SourceFetch::from_result` turns them into a `Failure`.
#[derive(Debug, Error)]
pub enum SourceError {
    /// Network, HTTP status, rate limit or timeout.
    #[error("fetch failed: {0}")]
    Fetch(String),

    /// Payload could not be parsed into listings.
    #[error("parse failed: {0}")]
    Parse(String),
}

impl From<reqwest::Error> for SourceError {
    fn from(err: reqwest::Error) -> Self {
        SourceError::Fetch(err.to_string())
    }
}

impl From<serde_json::Error> for SourceError {
    fn from(err: serde_json::Error) -> Self {
        SourceError::Parse(err.to_string())
    }
}

impl From<quick_xml::DeError> for SourceError {
    fn from(err: quick_xml::DeError) -> Self {
        SourceError::Parse(err.to_string())
    }
}

/// Fatal configuration problem. Carries every problem found, not just the first.
#[derive(Debug, Error)]
#[error("invalid scoring config: {}", .problems.join("; "))]
pub struct ConfigValidationError {
    pub problems: Vec<String>,
}

impl ConfigValidationError {
    pub fn single(problem: impl Into<String>) -> Self {
        Self {
            problems: vec![problem.into()],
        }
    }
}

/// A merge tried to replace a populated field with a different value.
/// Non-fatal: the first value is kept and the anomaly is surfaced for review.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("dedup anomaly on {listing_id}: field `{field}` kept {kept:?}, {source_name} reported {incoming:?}")]
pub struct DeduplicationAnomaly {
    pub listing_id: String,
    pub field: &'static str,
    pub kept: String,
    pub incoming: String,
    pub source_name: String,
}

#[derive(Debug, Error)]
pub enum ScanError {
    #[error("scan cancelled before publication")]
    Cancelled,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_error_lists_all_problems() {
        let e = ConfigValidationError {
            problems: vec!["weights sum to 0.95".into(), "unknown dimension `foo`".into()],
        };
        let msg = e.to_string();
        assert!(msg.contains("0.95"));
        assert!(msg.contains("`foo`"));
    }
}
