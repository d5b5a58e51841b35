// src/scoring/mod.rs
//! Weighted multi-dimension scoring of canonical listings.
//!
//! `ScoringEngine::score` is pure: same listing and config, same result.
//! Hard filters short-circuit to a rejected record with every dimension at 0.

pub mod config;
pub mod keywords;

use crate::error::ConfigValidationError;
use crate::listing::{CanonicalListing, LocationType, SalaryRange, Seniority};
use config::{ScoringConfig, Weights};
use keywords::KeywordSet;
use metrics::{counter, describe_counter};
use once_cell::sync::OnceCell;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;
use std::sync::{Arc, RwLock};
use std::thread;
use std::time::{Duration, SystemTime};

pub const REJECT_NOT_REMOTE: &str = "Not remote";
pub const REJECT_BELOW_SALARY_FLOOR: &str = "Below salary floor";

pub const ENV_SCORING_HOT_RELOAD: &str = "SCORING_HOT_RELOAD";

/// Upper bound of the fintech bonus dimension.
pub const FINTECH_BONUS_CAP: f64 = 20.0;

fn ensure_metrics_described() {
    static ONCE: OnceCell<()> = OnceCell::new();
    ONCE.get_or_init(|| {
        describe_counter!(
            "scoring_listings_total",
            "Listings scored, labelled by outcome (accepted|rejected)."
        );
    });
}

/// Per-dimension scores. All 0..=100 except `fintech_bonus` (0..=20).
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Breakdown {
    pub remote_match: f64,
    pub ai_ml_relevance: f64,
    pub seniority_match: f64,
    pub salary_match: f64,
    pub fintech_bonus: f64,
}

impl Breakdown {
    fn weighted(&self, w: &Weights) -> f64 {
        self.remote_match * w.remote_match
            + self.ai_ml_relevance * w.ai_ml_relevance
            + self.seniority_match * w.seniority_match
            + self.salary_match * w.salary_match
            + self.fintech_bonus * w.fintech_bonus
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoredListing {
    pub listing_id: String,
    /// 0..=100, one decimal.
    pub score: f64,
    pub breakdown: Breakdown,
    /// Weights in effect when this record was produced.
    pub weights: Weights,
    pub rejected: bool,
    pub rejection_reason: Option<String>,
}

fn round1(x: f64) -> f64 {
    (x * 10.0).round() / 10.0
}

pub struct ScoringEngine {
    cfg: ScoringConfig,
    ai_high: KeywordSet,
    ai_medium: KeywordSet,
    ai_low: KeywordSet,
    fintech: KeywordSet,
    /// Bands sorted by `min`, highest first.
    bands: Vec<(f64, f64)>,
}

impl ScoringEngine {
    /// Validate and compile. An invalid config never produces an engine.
    pub fn new(cfg: ScoringConfig) -> Result<Self, ConfigValidationError> {
        cfg.validate()?;
        let compile = |name: &str, words: &[String]| {
            KeywordSet::compile(words)
                .map_err(|e| ConfigValidationError::single(format!("{name} lexicon: {e}")))
        };
        let ai_high = compile("ai_ml.high", &cfg.ai_ml.high)?;
        let ai_medium = compile("ai_ml.medium", &cfg.ai_ml.medium)?;
        let ai_low = compile("ai_ml.low", &cfg.ai_ml.low)?;
        let fintech = compile("fintech", &cfg.fintech.keywords)?;

        let mut bands: Vec<(f64, f64)> = cfg.salary.bands.iter().map(|b| (b.min, b.score)).collect();
        bands.sort_by(|a, b| b.0.total_cmp(&a.0));

        Ok(Self {
            cfg,
            ai_high,
            ai_medium,
            ai_low,
            fintech,
            bands,
        })
    }

    pub fn config(&self) -> &ScoringConfig {
        &self.cfg
    }

    pub fn score(&self, l: &CanonicalListing) -> ScoredListing {
        ensure_metrics_described();
        let weights = self.cfg.weights;

        if let Some(reason) = self.hard_filter(l) {
            counter!("scoring_listings_total", "outcome" => "rejected").increment(1);
            tracing::debug!(target: "scoring", listing_id = %l.listing_id, reason, "rejected");
            return ScoredListing {
                listing_id: l.listing_id.clone(),
                score: 0.0,
                breakdown: Breakdown::default(),
                weights,
                rejected: true,
                rejection_reason: Some(reason.to_string()),
            };
        }

        let breakdown = Breakdown {
            remote_match: self.remote_match(l.location),
            ai_ml_relevance: self.ai_ml_relevance(l),
            seniority_match: self.seniority_match(l),
            salary_match: self.salary_match(l.salary_range.as_ref()),
            fintech_bonus: self.fintech_bonus(l),
        };
        let score = round1(breakdown.weighted(&weights).clamp(0.0, 100.0));

        counter!("scoring_listings_total", "outcome" => "accepted").increment(1);
        tracing::debug!(target: "scoring", listing_id = %l.listing_id, score, ?breakdown, "scored");
        ScoredListing {
            listing_id: l.listing_id.clone(),
            score,
            breakdown,
            weights,
            rejected: false,
            rejection_reason: None,
        }
    }

    /// Order-preserving; listings are scored independently.
    pub fn score_batch(&self, listings: &[CanonicalListing]) -> Vec<ScoredListing> {
        listings.iter().map(|l| self.score(l)).collect()
    }

    fn hard_filter(&self, l: &CanonicalListing) -> Option<&'static str> {
        let hf = &self.cfg.hard_filters;
        if hf.require_remote && l.location != LocationType::Remote {
            return Some(REJECT_NOT_REMOTE);
        }
        if hf.salary_floor > 0.0 {
            let lower = l
                .salary_range
                .as_ref()
                .and_then(|s| self.to_reference(s, s.lower()));
            if lower.is_some_and(|v| v < hf.salary_floor) {
                return Some(REJECT_BELOW_SALARY_FLOOR);
            }
        }
        None
    }

    /// Convert an amount in `s.currency` to the reference currency.
    /// `None` when there is no amount or no rate for the currency.
    fn to_reference(&self, s: &SalaryRange, amount: Option<f64>) -> Option<f64> {
        let amount = amount?;
        let sal = &self.cfg.salary;
        let from = sal.rate(s.currency)?;
        let to = sal.rate(sal.reference_currency)?;
        Some(amount * from / to)
    }

    fn remote_match(&self, loc: LocationType) -> f64 {
        match loc {
            LocationType::Remote => 100.0,
            LocationType::Hybrid => self.cfg.remote.hybrid_credit,
            LocationType::Onsite => 0.0,
        }
    }

    fn ai_ml_relevance(&self, l: &CanonicalListing) -> f64 {
        let text = format!("{} {} {}", l.role, l.description, l.tech_stack.join(" "));
        let ai = &self.cfg.ai_ml;
        let points = self.ai_high.count(&text) as f64 * ai.high_points
            + self.ai_medium.count(&text) as f64 * ai.medium_points
            + self.ai_low.count(&text) as f64 * ai.low_points;
        points.min(100.0)
    }

    fn seniority_match(&self, l: &CanonicalListing) -> f64 {
        let level = match l.seniority {
            Seniority::Unknown => Seniority::infer(&l.role),
            s => s,
        };
        self.cfg.seniority.lookup(level)
    }

    fn salary_match(&self, range: Option<&SalaryRange>) -> f64 {
        let upper = range.and_then(|s| self.to_reference(s, s.upper()));
        let Some(upper) = upper else {
            return self.cfg.salary.neutral_score;
        };
        self.bands
            .iter()
            .find(|(min, _)| upper >= *min)
            .map(|(_, score)| *score)
            .unwrap_or(self.cfg.salary.below_bands_score)
    }

    fn fintech_bonus(&self, l: &CanonicalListing) -> f64 {
        let text = format!("{} {} {}", l.company, l.role, l.description);
        let n = self.fintech.count(&text);
        if n == 0 {
            return 0.0;
        }
        let tiers = &self.cfg.fintech.tier_points;
        let idx = n.min(tiers.len()).saturating_sub(1);
        tiers.get(idx).copied().unwrap_or_default().min(FINTECH_BONUS_CAP)
    }
}

/* ----------------------------
Thread-safe handle + hot reload
---------------------------- */

/// Shared engine that can be swapped while in use.
#[derive(Clone)]
pub struct ScoringHandle {
    inner: Arc<RwLock<ScoringEngine>>,
}

impl ScoringHandle {
    pub fn new(engine: ScoringEngine) -> Self {
        Self {
            inner: Arc::new(RwLock::new(engine)),
        }
    }

    /// Score under one read lock, so a batch never mixes configs.
    pub fn score_batch(&self, listings: &[CanonicalListing]) -> anyhow::Result<Vec<ScoredListing>> {
        let eng = self
            .inner
            .read()
            .map_err(|_| anyhow::anyhow!("scoring engine lock poisoned"))?;
        Ok(eng.score_batch(listings))
    }

    pub fn weights(&self) -> Option<Weights> {
        self.inner.read().ok().map(|e| e.config().weights)
    }

    /// Load `path` and swap it in. On any error the current engine stays.
    pub fn reload_from(&self, path: &std::path::Path) -> Result<(), ConfigValidationError> {
        let engine = ScoringEngine::new(config::load_from(path)?)?;
        match self.inner.write() {
            Ok(mut guard) => {
                *guard = engine;
                Ok(())
            }
            Err(_) => Err(ConfigValidationError::single("scoring engine lock poisoned")),
        }
    }
}

fn hot_reload_enabled() -> bool {
    std::env::var(ENV_SCORING_HOT_RELOAD).ok().as_deref() == Some("1")
}

/// Poll `path` mtime every 2s and reload on change. Enabled with SCORING_HOT_RELOAD=1.
pub fn start_hot_reload_thread(handle: ScoringHandle, path: PathBuf) {
    if !hot_reload_enabled() {
        return;
    }
    tracing::info!(target: "scoring", path = %path.display(), "scoring config hot reload on");

    thread::spawn(move || {
        let poll = Duration::from_secs(2);
        let mut last_mtime: Option<SystemTime> = None;

        loop {
            if let Ok(mtime) = fs::metadata(&path).and_then(|m| m.modified()) {
                let changed = match last_mtime {
                    None => {
                        last_mtime = Some(mtime);
                        false
                    }
                    Some(prev) => mtime > prev,
                };
                if changed {
                    match handle.reload_from(&path) {
                        Ok(()) => tracing::info!(target: "scoring", path = %path.display(), "scoring config reloaded"),
                        Err(e) => tracing::warn!(target: "scoring", error = %e, "invalid scoring config, keeping previous"),
                    }
                    last_mtime = Some(mtime);
                }
            }
            thread::sleep(poll);
        }
    });
}
