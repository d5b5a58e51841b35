// src/ingest/types.rs
use crate::error::SourceError;
use crate::listing::RawListing;
use serde::Serialize;

/// How one adapter call ended.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum FetchOutcome {
    /// Listings were produced. `dropped` counts items the adapter saw but
    /// could not parse, or a tail it could not reach (partial success).
    Success { dropped: usize },
    Failure { reason: String },
}

impl FetchOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, FetchOutcome::Success { .. })
    }

    /// One-line human summary, e.g. "ok, 12 listings (2 dropped)".
    pub fn describe(&self, listings: usize) -> String {
        match self {
            FetchOutcome::Success { dropped: 0 } => format!("ok, {listings} listings"),
            FetchOutcome::Success { dropped } => format!("ok, {listings} listings ({dropped} dropped)"),
            FetchOutcome::Failure { reason } => format!("failed: {reason}"),
        }
    }
}

/// Result of `SourceAdapter::fetch`. Never an error: failures are data.
#[derive(Debug, Clone)]
pub struct SourceFetch {
    pub listings: Vec<RawListing>,
    pub outcome: FetchOutcome,
}

impl SourceFetch {
    pub fn success(listings: Vec<RawListing>) -> Self {
        Self {
            listings,
            outcome: FetchOutcome::Success { dropped: 0 },
        }
    }

    pub fn partial(listings: Vec<RawListing>, dropped: usize) -> Self {
        Self {
            listings,
            outcome: FetchOutcome::Success { dropped },
        }
    }

    pub fn failure(reason: impl Into<String>) -> Self {
        Self {
            listings: Vec::new(),
            outcome: FetchOutcome::Failure {
                reason: reason.into(),
            },
        }
    }

    /// Fold an internal adapter result into the boundary shape.
    pub fn from_result(source: &str, res: Result<SourceFetch, SourceError>) -> Self {
        match res {
            Ok(fetch) => fetch,
            Err(e) => {
                tracing::warn!(target: "ingest", source, error = %e, "source failed");
                Self::failure(e.to_string())
            }
        }
    }
}

/// One external job source. Implementations must catch every network and
/// parse error and report it through `FetchOutcome::Failure`.
#[async_trait::async_trait]
pub trait SourceAdapter: Send + Sync {
    async fn fetch(&self) -> SourceFetch;
    fn name(&self) -> &'static str;
}
