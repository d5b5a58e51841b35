// src/ingest/extract.rs
//! Field heuristics shared by the adapters: remote detection, salary parsing,
//! company/role splitting. Nothing here leaks past the adapters.

use crate::listing::{Currency, SalaryRange};
use once_cell::sync::OnceCell;
use regex::Regex;

pub const REMOTE_KEYWORDS: &[&str] = &["remote", "anywhere", "distributed", "work from home", "wfh"];

/// Keywords used by the boards' own AI/ML pre-filter (not the scoring lexicon).
pub const AI_ML_FILTER_KEYWORDS: &[&str] = &[
    "ai",
    "ml",
    "machine learning",
    "deep learning",
    "artificial intelligence",
    "nlp",
    "llm",
    "gpt",
    "mlops",
    "neural",
    "data science",
    "langchain",
    "model",
];

fn word_re(words: &[&str]) -> Regex {
    let alt = words
        .iter()
        .map(|w| regex::escape(w))
        .collect::<Vec<_>>()
        .join("|");
    Regex::new(&format!(r"(?i)\b(?:{alt})\b")).expect("keyword regex")
}

pub fn mentions_remote(text: &str) -> bool {
    static RE: OnceCell<Regex> = OnceCell::new();
    RE.get_or_init(|| word_re(REMOTE_KEYWORDS)).is_match(text)
}

pub fn mentions_ai_ml(text: &str) -> bool {
    static RE: OnceCell<Regex> = OnceCell::new();
    RE.get_or_init(|| word_re(AI_ML_FILTER_KEYWORDS)).is_match(text)
}

/// Parse the first salary range in free text.
///
/// Handles `£50,000 - £80,000`, `$100k-$150k`, `€90k – 120k`. Without a
/// currency symbol `default_currency` applies.
pub fn parse_salary(text: &str, default_currency: Currency) -> Option<SalaryRange> {
    static RE: OnceCell<Regex> = OnceCell::new();
    let re = RE.get_or_init(|| {
        Regex::new(r"(?i)([£$€])?\s*(\d[\d,]*(?:\.\d+)?)\s*(k)?\s*[-–—]\s*([£$€])?\s*(\d[\d,]*(?:\.\d+)?)\s*(k)?")
            .expect("salary regex")
    });
    re.captures_iter(text).find_map(|caps| salary_from_captures(&caps, default_currency))
}

fn salary_from_captures(caps: &regex::Captures<'_>, default_currency: Currency) -> Option<SalaryRange> {
    let num = |i: usize| -> Option<f64> { caps.get(i)?.as_str().replace(',', "").parse().ok() };
    let mut min = num(2)?;
    let mut max = num(5)?;

    if caps.get(3).is_some() || caps.get(6).is_some() {
        // "100-150k" means both bounds are in thousands
        min *= 1000.0;
        max *= 1000.0;
    }
    if min > max {
        std::mem::swap(&mut min, &mut max);
    }
    // Below this it is an hourly rate, years of experience or a date span.
    if max < 10_000.0 {
        return None;
    }

    let symbol = caps
        .get(1)
        .or_else(|| caps.get(4))
        .and_then(|m| m.as_str().chars().next());
    let currency = symbol
        .and_then(Currency::from_symbol)
        .unwrap_or(default_currency);

    Some(SalaryRange::new(min, max, currency))
}

/// Split "Company - Role" / "Company – Role" / "Company | Role" / "Company: Role" titles.
/// The first separator wins.
pub fn split_company_role(title: &str) -> Option<(String, String)> {
    static RE: OnceCell<Regex> = OnceCell::new();
    let re = RE.get_or_init(|| {
        Regex::new(r"^\s*([^|:]+?)(?:\s+[-–—]\s+|\s*\|\s*|\s*:\s+)(.+?)\s*$").expect("title regex")
    });
    let caps = re.captures(title)?;
    let company = caps.get(1)?.as_str().trim().to_string();
    let role = caps.get(2)?.as_str().trim().to_string();
    if company.is_empty() || role.is_empty() {
        return None;
    }
    Some((company, role))
}

/// Cap a description at `max` chars on a char boundary.
pub fn truncate_chars(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        s.chars().take(max).collect()
    }
}
