// src/listing.rs
//! Listing shapes shared by ingest, dedup and scoring.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LocationType {
    #[default]
    Remote,
    Hybrid,
    Onsite,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Currency {
    Eur,
    Usd,
    Gbp,
    Pln,
}

impl Currency {
    pub fn code(self) -> &'static str {
        match self {
            Currency::Eur => "EUR",
            Currency::Usd => "USD",
            Currency::Gbp => "GBP",
            Currency::Pln => "PLN",
        }
    }

    /// Currency from a symbol found in free text.
    pub fn from_symbol(c: char) -> Option<Self> {
        match c {
            '€' => Some(Currency::Eur),
            '$' => Some(Currency::Usd),
            '£' => Some(Currency::Gbp),
            _ => None,
        }
    }
}

impl fmt::Display for Currency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Seniority {
    Junior,
    Mid,
    Senior,
    Staff,
    Principal,
    #[default]
    Unknown,
}

impl Seniority {
    /// Best-effort seniority from a job title or free text. Most specific first,
    /// so "Staff Engineer (Senior track)" is Staff.
    pub fn infer(text: &str) -> Self {
        let t = text.to_lowercase();
        let has = |words: &[&str]| words.iter().any(|w| contains_word(&t, w));
        if has(&["principal"]) {
            Seniority::Principal
        } else if has(&["staff"]) {
            Seniority::Staff
        } else if has(&["senior", "sr", "lead"]) {
            Seniority::Senior
        } else if has(&["mid", "mid-level", "intermediate"]) {
            Seniority::Mid
        } else if has(&["junior", "jr", "entry", "graduate"]) {
            Seniority::Junior
        } else {
            Seniority::Unknown
        }
    }
}

fn contains_word(haystack: &str, word: &str) -> bool {
    haystack
        .split(|c: char| !(c.is_alphanumeric() || c == '-'))
        .any(|tok| tok == word)
}

/// Salary range; either bound may be missing.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SalaryRange {
    #[serde(default)]
    pub min: Option<f64>,
    #[serde(default)]
    pub max: Option<f64>,
    pub currency: Currency,
}

impl SalaryRange {
    pub fn new(min: f64, max: f64, currency: Currency) -> Self {
        Self {
            min: Some(min),
            max: Some(max),
            currency,
        }
    }

    /// True when neither bound carries a usable value.
    pub fn is_empty(&self) -> bool {
        self.lower().is_none()
    }

    /// Lower bound, falling back to the upper one.
    pub fn lower(&self) -> Option<f64> {
        self.min.or(self.max).filter(|v| v.is_finite() && *v > 0.0)
    }

    /// Upper bound, falling back to the lower one.
    pub fn upper(&self) -> Option<f64> {
        self.max.or(self.min).filter(|v| v.is_finite() && *v > 0.0)
    }
}

/// One posting as reported by one source. Owned by its adapter until merge.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawListing {
    pub company: String,
    pub role: String,
    #[serde(default)]
    pub description: String,
    pub location: LocationType,
    #[serde(default)]
    pub salary: Option<SalaryRange>,
    #[serde(default)]
    pub tech_tags: Vec<String>,
    #[serde(default)]
    pub seniority: Seniority,
    pub source: String,
    #[serde(default)]
    pub url: String,
    pub fetched_at: DateTime<Utc>,
}

impl RawListing {
    /// Minimal listing; adapters fill the rest field by field.
    pub fn new(source: &str, company: impl Into<String>, role: impl Into<String>) -> Self {
        Self {
            company: company.into(),
            role: role.into(),
            description: String::new(),
            location: LocationType::Remote,
            salary: None,
            tech_tags: Vec::new(),
            seniority: Seniority::Unknown,
            source: source.to_string(),
            url: String::new(),
            fetched_at: Utc::now(),
        }
    }
}

/// Deduplicated listing. `listing_id` is derived from the fingerprint, see `dedup`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CanonicalListing {
    pub listing_id: String,
    pub company: String,
    pub role: String,
    pub description: String,
    pub location: LocationType,
    pub salary_range: Option<SalaryRange>,
    pub tech_stack: Vec<String>,
    pub seniority: Seniority,
    pub sources: Vec<String>,
    pub discovered_at: DateTime<Utc>,
    pub url: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn seniority_prefers_most_specific() {
        assert_eq!(Seniority::infer("Staff ML Engineer"), Seniority::Staff);
        assert_eq!(Seniority::infer("Sr. Data Scientist"), Seniority::Senior);
        assert_eq!(Seniority::infer("Principal AI Architect"), Seniority::Principal);
        assert_eq!(Seniority::infer("Junior Analyst"), Seniority::Junior);
        assert_eq!(Seniority::infer("ML Engineer"), Seniority::Unknown);
    }

    #[test]
    fn seniority_matches_whole_words_only() {
        // "misleading" contains "lead", "staffing" contains "staff"
        assert_eq!(Seniority::infer("Misleading staffing ad"), Seniority::Unknown);
    }

    #[test]
    fn salary_bounds_fall_back() {
        let only_max = SalaryRange {
            min: None,
            max: Some(90_000.0),
            currency: Currency::Usd,
        };
        assert_eq!(only_max.lower(), Some(90_000.0));
        assert_eq!(only_max.upper(), Some(90_000.0));

        let empty = SalaryRange {
            min: None,
            max: None,
            currency: Currency::Eur,
        };
        assert!(empty.is_empty());
    }

    #[test]
    fn enums_serialize_in_wire_casing() {
        let v = serde_json::to_value(SalaryRange::new(1.0, 2.0, Currency::Gbp)).unwrap();
        assert_eq!(v["currency"], "GBP");
        assert_eq!(serde_json::to_value(LocationType::Onsite).unwrap(), "onsite");
        assert_eq!(serde_json::to_value(Seniority::Principal).unwrap(), "principal");
    }
}
