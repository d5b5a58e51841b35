// src/scoring/config.rs
//! Scoring configuration: file format, defaults and validation.

use crate::error::ConfigValidationError;
use crate::listing::{Currency, Seniority};
use crate::scoring::{keywords, FINTECH_BONUS_CAP};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

pub const ENV_SCORING_CONFIG_PATH: &str = "SCORING_CONFIG_PATH";
pub const DEFAULT_SCORING_CONFIG_PATH: &str = "config/scoring.toml";

pub const DIMENSIONS: [&str; 5] = [
    "remote_match",
    "ai_ml_relevance",
    "seniority_match",
    "salary_match",
    "fintech_bonus",
];

const WEIGHT_SUM_TOLERANCE: f64 = 1e-6;

/// Per-dimension weights. Always sums to 1.0 once validated.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Weights {
    pub remote_match: f64,
    pub ai_ml_relevance: f64,
    pub seniority_match: f64,
    pub salary_match: f64,
    pub fintech_bonus: f64,
}

impl Default for Weights {
    fn default() -> Self {
        Self {
            remote_match: 0.40,
            ai_ml_relevance: 0.30,
            seniority_match: 0.15,
            salary_match: 0.10,
            fintech_bonus: 0.05,
        }
    }
}

impl Weights {
    pub fn get(&self, dimension: &str) -> Option<f64> {
        match dimension {
            "remote_match" => Some(self.remote_match),
            "ai_ml_relevance" => Some(self.ai_ml_relevance),
            "seniority_match" => Some(self.seniority_match),
            "salary_match" => Some(self.salary_match),
            "fintech_bonus" => Some(self.fintech_bonus),
            _ => None,
        }
    }

    pub fn sum(&self) -> f64 {
        self.remote_match + self.ai_ml_relevance + self.seniority_match + self.salary_match + self.fintech_bonus
    }

    /// Build from a `dimension -> weight` table, collecting every problem.
    pub fn from_map(map: &BTreeMap<String, f64>, problems: &mut Vec<String>) -> Self {
        for key in map.keys() {
            if !DIMENSIONS.contains(&key.as_str()) {
                problems.push(format!("unknown dimension `{key}`"));
            }
        }
        let mut get = |dim: &str| match map.get(dim) {
            Some(v) => *v,
            None => {
                problems.push(format!("missing weight for `{dim}`"));
                0.0
            }
        };
        Self {
            remote_match: get("remote_match"),
            ai_ml_relevance: get("ai_ml_relevance"),
            seniority_match: get("seniority_match"),
            salary_match: get("salary_match"),
            fintech_bonus: get("fintech_bonus"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct HardFilters {
    pub require_remote: bool,
    /// In the reference currency; 0 disables the floor.
    pub salary_floor: f64,
}

impl Default for HardFilters {
    fn default() -> Self {
        Self {
            require_remote: true,
            salary_floor: 120_000.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RemoteScoring {
    pub hybrid_credit: f64,
}

impl Default for RemoteScoring {
    fn default() -> Self {
        Self { hybrid_credit: 30.0 }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AiMlLexicon {
    pub high_points: f64,
    pub medium_points: f64,
    pub low_points: f64,
    pub high: Vec<String>,
    pub medium: Vec<String>,
    pub low: Vec<String>,
}

impl Default for AiMlLexicon {
    fn default() -> Self {
        Self {
            high_points: 30.0,
            medium_points: 15.0,
            low_points: 5.0,
            high: keywords::owned(keywords::AI_ML_HIGH),
            medium: keywords::owned(keywords::AI_ML_MEDIUM),
            low: keywords::owned(keywords::AI_ML_LOW),
        }
    }
}

impl AiMlLexicon {
    /// Non-blank keywords across all tiers.
    pub fn keyword_count(&self) -> usize {
        [&self.high, &self.medium, &self.low]
            .into_iter()
            .flatten()
            .filter(|k| !k.trim().is_empty())
            .count()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SeniorityTable {
    pub junior: f64,
    pub mid: f64,
    pub senior: f64,
    pub staff: f64,
    pub principal: f64,
    /// Used when the level cannot be inferred from the title either.
    pub unknown: f64,
}

impl Default for SeniorityTable {
    fn default() -> Self {
        Self {
            junior: 20.0,
            mid: 50.0,
            senior: 90.0,
            staff: 100.0,
            principal: 100.0,
            unknown: 60.0,
        }
    }
}

impl SeniorityTable {
    pub fn lookup(&self, s: Seniority) -> f64 {
        match s {
            Seniority::Junior => self.junior,
            Seniority::Mid => self.mid,
            Seniority::Senior => self.senior,
            Seniority::Staff => self.staff,
            Seniority::Principal => self.principal,
            Seniority::Unknown => self.unknown,
        }
    }

    fn entries(&self) -> [(&'static str, f64); 6] {
        [
            ("junior", self.junior),
            ("mid", self.mid),
            ("senior", self.senior),
            ("staff", self.staff),
            ("principal", self.principal),
            ("unknown", self.unknown),
        ]
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SalaryBand {
    /// Inclusive lower bound in the reference currency.
    pub min: f64,
    pub score: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SalaryScoring {
    pub reference_currency: Currency,
    /// Value of one unit of each currency (by ISO code) in the reference currency.
    pub rates: BTreeMap<String, f64>,
    /// Score when no salary is given.
    pub neutral_score: f64,
    /// Matched against the range maximum, highest band first.
    pub bands: Vec<SalaryBand>,
    pub below_bands_score: f64,
}

impl Default for SalaryScoring {
    fn default() -> Self {
        Self {
            reference_currency: Currency::Eur,
            rates: BTreeMap::from([
                ("EUR".to_string(), 1.0),
                ("USD".to_string(), 0.92),
                ("GBP".to_string(), 1.15),
                ("PLN".to_string(), 0.23),
            ]),
            neutral_score: 60.0,
            bands: vec![
                SalaryBand {
                    min: 150_000.0,
                    score: 100.0,
                },
                SalaryBand {
                    min: 130_000.0,
                    score: 85.0,
                },
                SalaryBand {
                    min: 120_000.0,
                    score: 70.0,
                },
            ],
            below_bands_score: 50.0,
        }
    }
}

impl SalaryScoring {
    pub fn rate(&self, c: Currency) -> Option<f64> {
        self.rates.get(c.code()).copied()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FintechLexicon {
    /// Points for 1, 2, 3+ distinct matches; the last entry applies to anything above.
    pub tier_points: Vec<f64>,
    pub keywords: Vec<String>,
}

impl Default for FintechLexicon {
    fn default() -> Self {
        Self {
            tier_points: vec![10.0, 15.0, 20.0],
            keywords: keywords::owned(keywords::FINTECH),
        }
    }
}

/// Validated scoring configuration.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScoringConfig {
    pub weights: Weights,
    pub hard_filters: HardFilters,
    pub remote: RemoteScoring,
    pub ai_ml: AiMlLexicon,
    pub seniority: SeniorityTable,
    pub salary: SalaryScoring,
    pub fintech: FintechLexicon,
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            weights: Weights::default(),
            hard_filters: HardFilters::default(),
            remote: RemoteScoring::default(),
            ai_ml: AiMlLexicon::default(),
            seniority: SeniorityTable::default(),
            salary: SalaryScoring::default(),
            fintech: FintechLexicon::default(),
        }
    }
}

/// On-disk shape. Weights stay a free-form table so that unknown and
/// missing dimensions can be reported by name.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct ScoringFile {
    #[serde(default)]
    weights: BTreeMap<String, f64>,
    #[serde(default)]
    hard_filters: HardFilters,
    #[serde(default)]
    remote: RemoteScoring,
    #[serde(default)]
    ai_ml: AiMlLexicon,
    #[serde(default)]
    seniority: SeniorityTable,
    #[serde(default)]
    salary: SalaryScoring,
    #[serde(default)]
    fintech: FintechLexicon,
}

fn bad_number(v: f64) -> bool {
    !v.is_finite() || v < 0.0
}

impl ScoringConfig {
    /// Every check runs; the error carries all problems found.
    pub fn validate(&self) -> Result<(), ConfigValidationError> {
        let mut problems = Vec::new();
        self.collect_problems(&mut problems);
        if problems.is_empty() {
            Ok(())
        } else {
            Err(ConfigValidationError { problems })
        }
    }

    fn collect_problems(&self, problems: &mut Vec<String>) {
        for dim in DIMENSIONS {
            let w = self.weights.get(dim).unwrap_or_default();
            if bad_number(w) {
                problems.push(format!("weight `{dim}` must be finite and non-negative (got {w})"));
            }
        }
        let sum = self.weights.sum();
        if !sum.is_finite() || (sum - 1.0).abs() > WEIGHT_SUM_TOLERANCE {
            problems.push(format!("weights must sum to 1.0 (got {sum:.6})"));
        }

        if bad_number(self.hard_filters.salary_floor) {
            problems.push("hard_filters.salary_floor must be finite and non-negative".into());
        }
        if bad_number(self.remote.hybrid_credit) || self.remote.hybrid_credit > 100.0 {
            problems.push("remote.hybrid_credit must be within 0..=100".into());
        }

        let ai = &self.ai_ml;
        for (name, p) in [
            ("high_points", ai.high_points),
            ("medium_points", ai.medium_points),
            ("low_points", ai.low_points),
        ] {
            if bad_number(p) {
                problems.push(format!("ai_ml.{name} must be finite and non-negative"));
            }
        }
        if self.weights.ai_ml_relevance > 0.0 && ai.keyword_count() == 0 {
            problems.push("ai_ml lexicon is empty but ai_ml_relevance has weight".into());
        }

        for (name, v) in self.seniority.entries() {
            if bad_number(v) || v > 100.0 {
                problems.push(format!("seniority.{name} must be within 0..=100"));
            }
        }

        let sal = &self.salary;
        if sal.rate(sal.reference_currency).is_none() {
            problems.push(format!(
                "salary.rates has no rate for reference currency {}",
                sal.reference_currency
            ));
        }
        for (cur, r) in &sal.rates {
            if !["EUR", "USD", "GBP", "PLN"].contains(&cur.as_str()) {
                problems.push(format!("salary.rates has unsupported currency `{cur}`"));
            }
            if !r.is_finite() || *r <= 0.0 {
                problems.push(format!("salary.rates.{cur} must be positive"));
            }
        }
        for (name, v) in [
            ("neutral_score", sal.neutral_score),
            ("below_bands_score", sal.below_bands_score),
        ] {
            if bad_number(v) || v > 100.0 {
                problems.push(format!("salary.{name} must be within 0..=100"));
            }
        }
        for (i, b) in sal.bands.iter().enumerate() {
            if bad_number(b.min) || bad_number(b.score) || b.score > 100.0 {
                problems.push(format!("salary.bands[{i}] needs a non-negative min and a score within 0..=100"));
            }
        }

        let fin = &self.fintech;
        if fin.tier_points.is_empty() {
            problems.push("fintech.tier_points must not be empty".into());
        }
        if fin.tier_points.iter().any(|p| bad_number(*p) || *p > FINTECH_BONUS_CAP) {
            problems.push(format!("fintech.tier_points must be within 0..={FINTECH_BONUS_CAP}"));
        }
        if self.weights.fintech_bonus > 0.0 && fin.keywords.iter().all(|k| k.trim().is_empty()) {
            problems.push("fintech lexicon is empty but fintech_bonus has weight".into());
        }
    }
}

fn from_file(file: ScoringFile) -> Result<ScoringConfig, ConfigValidationError> {
    let mut problems = Vec::new();
    let weights = Weights::from_map(&file.weights, &mut problems);
    let cfg = ScoringConfig {
        weights,
        hard_filters: file.hard_filters,
        remote: file.remote,
        ai_ml: file.ai_ml,
        seniority: file.seniority,
        salary: file.salary,
        fintech: file.fintech,
    };
    // Missing/unknown dimensions make the sum meaningless; report them alone.
    if !problems.is_empty() {
        return Err(ConfigValidationError { problems });
    }
    cfg.validate()?;
    Ok(cfg)
}

pub fn parse_toml(s: &str) -> Result<ScoringConfig, ConfigValidationError> {
    let file: ScoringFile = toml::from_str(s).map_err(|e| ConfigValidationError::single(e.to_string()))?;
    from_file(file)
}

pub fn parse_json(s: &str) -> Result<ScoringConfig, ConfigValidationError> {
    let file: ScoringFile = serde_json::from_str(s).map_err(|e| ConfigValidationError::single(e.to_string()))?;
    from_file(file)
}

/// Load from an explicit path. TOML or JSON, picked by extension.
pub fn load_from(path: &Path) -> Result<ScoringConfig, ConfigValidationError> {
    let content = fs::read_to_string(path)
        .map_err(|e| ConfigValidationError::single(format!("reading {}: {e}", path.display())))?;
    let is_json = path
        .extension()
        .and_then(|s| s.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("json"));
    let parsed = if is_json {
        parse_json(&content)
    } else {
        parse_toml(&content)
    };
    parsed.map_err(|e| ConfigValidationError {
        problems: e
            .problems
            .into_iter()
            .map(|p| format!("{}: {p}", path.display()))
            .collect(),
    })
}

/// Resolve and load:
/// 1) explicit path
/// 2) $SCORING_CONFIG_PATH
/// 3) config/scoring.toml
///
/// Built-in defaults only when none of these is set and the default file is absent.
/// Returns the path actually read, for hot reload.
pub fn load(explicit: Option<&Path>) -> Result<(ScoringConfig, Option<PathBuf>), ConfigValidationError> {
    if let Some(p) = explicit {
        return Ok((load_from(p)?, Some(p.to_path_buf())));
    }
    if let Ok(p) = std::env::var(ENV_SCORING_CONFIG_PATH) {
        let pb = PathBuf::from(p);
        if !pb.exists() {
            return Err(ConfigValidationError::single(format!(
                "{ENV_SCORING_CONFIG_PATH} points to non-existent path {}",
                pb.display()
            )));
        }
        return Ok((load_from(&pb)?, Some(pb)));
    }
    let default_p = PathBuf::from(DEFAULT_SCORING_CONFIG_PATH);
    if default_p.exists() {
        return Ok((load_from(&default_p)?, Some(default_p)));
    }
    tracing::info!(target: "scoring", "no scoring config file, using built-in defaults");
    Ok((ScoringConfig::default(), None))
}

#[cfg(test)]
mod tests {
    use super::*;

    const WEIGHTS_OK: &str = r#"
[weights]
remote_match = 0.40
ai_ml_relevance = 0.30
seniority_match = 0.15
salary_match = 0.10
fintech_bonus = 0.05
"#;

    #[test]
    fn defaults_are_valid() {
        ScoringConfig::default().validate().unwrap();
        let cfg = parse_toml(WEIGHTS_OK).unwrap();
        assert_eq!(cfg, ScoringConfig::default());
    }

    #[test]
    fn weights_summing_to_095_fail() {
        let toml = WEIGHTS_OK.replace("fintech_bonus = 0.05", "fintech_bonus = 0.00");
        let err = parse_toml(&toml).unwrap_err();
        assert!(err.to_string().contains("sum to 1.0"), "{err}");
    }

    #[test]
    fn unknown_and_missing_dimensions_are_named() {
        let toml = r#"
[weights]
remote_match = 0.5
ai_ml_relevance = 0.3
seniority_match = 0.1
salary_match = 0.1
vibes = 0.0
"#;
        let err = parse_toml(toml).unwrap_err();
        assert!(err.problems.iter().any(|p| p.contains("`vibes`")));
        assert!(err.problems.iter().any(|p| p.contains("missing weight for `fintech_bonus`")));
    }

    #[test]
    fn negative_weight_and_empty_lexicon_fail() {
        let toml = format!(
            "{}\n[ai_ml]\nhigh = []\nmedium = []\nlow = []\n",
            WEIGHTS_OK
                .replace("remote_match = 0.40", "remote_match = 0.50")
                .replace("fintech_bonus = 0.05", "fintech_bonus = -0.05")
        );
        let err = parse_toml(&toml).unwrap_err();
        assert!(err.problems.iter().any(|p| p.contains("fintech_bonus")));
        assert!(err.problems.iter().any(|p| p.contains("ai_ml lexicon is empty")));
    }

    #[test]
    fn reference_currency_needs_a_rate() {
        let toml = format!("{WEIGHTS_OK}\n[salary]\nreference_currency = \"GBP\"\nrates = {{ EUR = 1.0 }}\n");
        let err = parse_toml(&toml).unwrap_err();
        assert!(err.to_string().contains("reference currency GBP"));
    }

    #[test]
    fn whitespace_only_lexicon_counts_as_empty() {
        let toml = format!("{WEIGHTS_OK}\n[ai_ml]\nhigh = [\"  \"]\nmedium = [\"\"]\nlow = [\"\\t\"]\n");
        let err = parse_toml(&toml).unwrap_err();
        assert!(err.problems.iter().any(|p| p.contains("ai_ml lexicon is empty")), "{err}");
    }

    #[test]
    fn fintech_tier_above_cap_is_rejected() {
        let toml = format!("{WEIGHTS_OK}\n[fintech]\ntier_points = [0.0, 10.0, 25.0]\n");
        let err = parse_toml(&toml).unwrap_err();
        assert!(err.problems.iter().any(|p| p.contains("fintech.tier_points")), "{err}");

        let ok = format!("{WEIGHTS_OK}\n[fintech]\ntier_points = [0.0, 10.0, 20.0]\n");
        assert_eq!(parse_toml(&ok).unwrap().fintech.tier_points, vec![0.0, 10.0, 20.0]);
    }

    #[test]
    fn json_works_too() {
        let json = r#"{"weights": {"remote_match": 0.2, "ai_ml_relevance": 0.2, "seniority_match": 0.2,
                       "salary_match": 0.2, "fintech_bonus": 0.2},
                       "hard_filters": {"require_remote": false}}"#;
        let cfg = parse_json(json).unwrap();
        assert!(!cfg.hard_filters.require_remote);
        assert_eq!(cfg.hard_filters.salary_floor, 120_000.0);
    }
}
