// src/ingest/providers/hn_algolia.rs
//! Hacker News "Ask HN: Who is hiring?" threads through the Algolia API.
//! One comment is one posting; only remote AI/ML comments are kept.

use async_trait::async_trait;
use once_cell::sync::OnceCell;
use regex::Regex;
use serde::Deserialize;

use crate::error::SourceError;
use crate::ingest::extract::{mentions_ai_ml, mentions_remote, parse_salary, truncate_chars};
use crate::ingest::normalize_text;
use crate::ingest::providers::get_text;
use crate::ingest::types::{SourceAdapter, SourceFetch};
use crate::listing::{Currency, LocationType, RawListing, Seniority};

pub const NAME: &str = "hn_algolia";
pub const DEFAULT_URL: &str = "https://hn.algolia.com/api/v1";

const LOOKBACK_DAYS: i64 = 60;
const MAX_THREADS: usize = 5;
const DEFAULT_ROLE: &str = "AI/ML Engineer";

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    hits: Vec<Hit>,
}

#[derive(Debug, Deserialize)]
struct Hit {
    #[serde(rename = "objectID")]
    object_id: String,
}

#[derive(Debug, Deserialize)]
struct Thread {
    #[serde(default)]
    children: Vec<Comment>,
}

#[derive(Debug, Deserialize)]
struct Comment {
    id: Option<u64>,
    text: Option<String>,
}

pub struct HnAlgoliaAdapter {
    mode: Mode,
}

enum Mode {
    /// Thread bodies (`/items/<id>` JSON), already fetched.
    Fixture(Vec<String>),
    Http {
        base_url: String,
        client: reqwest::Client,
    },
}

impl HnAlgoliaAdapter {
    pub fn from_fixture_threads(threads: Vec<String>) -> Self {
        Self {
            mode: Mode::Fixture(threads),
        }
    }

    pub fn from_url(base_url: impl Into<String>, client: reqwest::Client) -> Self {
        Self {
            mode: Mode::Http {
                base_url: base_url.into(),
                client,
            },
        }
    }

    async fn fetch_http(&self, base_url: &str, client: &reqwest::Client) -> Result<SourceFetch, SourceError> {
        let since = chrono::Utc::now().timestamp() - LOOKBACK_DAYS * 24 * 3600;
        let body = get_text(
            client,
            &format!("{base_url}/search"),
            &[
                ("query", "Ask HN: Who is hiring?".to_string()),
                ("tags", "story".to_string()),
                ("numericFilters", format!("created_at_i>{since}")),
                ("hitsPerPage", MAX_THREADS.to_string()),
            ],
        )
        .await?;
        let search: SearchResponse = serde_json::from_str(&body)?;

        let mut bodies = Vec::new();
        for hit in search.hits.iter().take(MAX_THREADS) {
            let url = format!("{base_url}/items/{}", hit.object_id);
            let body = get_text(client, &url, &[]).await;
            if let Err(e) = &body {
                tracing::warn!(target: "ingest", source = NAME, thread = %hit.object_id, error = %e, "thread fetch failed");
            }
            bodies.push(body);
        }
        fold_threads(bodies)
    }
}

/// Merge per-thread results. Any thread that worked makes the fetch a
/// (possibly partial) success; a failed thread counts as one dropped unit.
fn fold_threads(bodies: Vec<Result<String, SourceError>>) -> Result<SourceFetch, SourceError> {
    let mut listings = Vec::new();
    let mut dropped = 0usize;
    let mut threads_ok = 0usize;
    let mut last_err = None;
    for body in bodies {
        match body.and_then(|b| parse_thread(&b)) {
            Ok((mut parsed, d)) => {
                threads_ok += 1;
                dropped += d;
                listings.append(&mut parsed);
            }
            Err(e) => {
                dropped += 1;
                last_err = Some(e);
            }
        }
    }
    match last_err {
        Some(e) if threads_ok == 0 => Err(e),
        _ => Ok(SourceFetch::partial(listings, dropped)),
    }
}

#[async_trait]
impl SourceAdapter for HnAlgoliaAdapter {
    async fn fetch(&self) -> SourceFetch {
        let res = match &self.mode {
            Mode::Fixture(threads) => fold_threads(threads.iter().cloned().map(Ok).collect()),
            Mode::Http { base_url, client } => self.fetch_http(base_url, client).await,
        };
        SourceFetch::from_result(NAME, res)
    }

    fn name(&self) -> &'static str {
        NAME
    }
}

/// Parse one thread. Comments that are not remote AI/ML postings are
/// filtered, not dropped; only comments we cannot attribute count as dropped.
fn parse_thread(body: &str) -> Result<(Vec<RawListing>, usize), SourceError> {
    let thread: Thread = serde_json::from_str(body)?;
    let mut out = Vec::new();
    let mut dropped = 0;
    for c in thread.children {
        let Some(html) = c.text.as_deref().filter(|t| !t.is_empty()) else {
            continue;
        };
        match parse_comment(html, c.id) {
            Parsed::Listing(l) => out.push(*l),
            Parsed::Filtered => {}
            Parsed::Unattributed => dropped += 1,
        }
    }
    Ok((out, dropped))
}

enum Parsed {
    Listing(Box<RawListing>),
    Filtered,
    Unattributed,
}

fn parse_comment(html: &str, id: Option<u64>) -> Parsed {
    let text = normalize_text(html);
    if !mentions_ai_ml(&text) || !mentions_remote(&text) {
        return Parsed::Filtered;
    }
    let Some(company) = extract_company(html) else {
        return Parsed::Unattributed;
    };

    let role = extract_role(html).unwrap_or_else(|| DEFAULT_ROLE.to_string());
    let mut l = RawListing::new(NAME, company, role);
    l.seniority = Seniority::infer(&l.role);
    if l.seniority == Seniority::Unknown {
        l.seniority = Seniority::infer(&text);
    }
    l.salary = parse_salary(&text, Currency::Usd);
    l.location = LocationType::Remote;
    l.url = extract_url(html).unwrap_or_else(|| match id {
        Some(id) => format!("https://news.ycombinator.com/item?id={id}"),
        None => String::new(),
    });
    l.description = truncate_chars(&text, 500);
    Parsed::Listing(Box::new(l))
}

/// First line of a comment, before the first paragraph break.
fn header_line(html: &str) -> String {
    let first = html.split("<p>").next().unwrap_or(html);
    normalize_text(first)
}

fn extract_company(html: &str) -> Option<String> {
    // "Company | Role | Remote | ..."
    let header = header_line(html);
    if let Some((company, _)) = header.split_once('|') {
        let company = company.trim();
        if !company.is_empty() && company.len() <= 80 {
            return Some(company.to_string());
        }
    }

    // <b>Company</b>
    static RE_BOLD: OnceCell<Regex> = OnceCell::new();
    let re_bold = RE_BOLD.get_or_init(|| Regex::new(r"(?i)<b>([^<]+)</b>").unwrap());
    if let Some(c) = re_bold.captures(html).and_then(|c| c.get(1)) {
        let c = normalize_text(c.as_str());
        if !c.is_empty() {
            return Some(c);
        }
    }

    // Leading capitalized words
    static RE_CAPS: OnceCell<Regex> = OnceCell::new();
    let re_caps = RE_CAPS.get_or_init(|| Regex::new(r"^([A-Z][A-Za-z0-9]+(?:\s+[A-Z][A-Za-z0-9]+){0,3})").unwrap());
    re_caps
        .captures(&header)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().to_string())
}

fn extract_role(html: &str) -> Option<String> {
    // Header segment that looks like a job title wins.
    let header = header_line(html);
    static RE_TITLE: OnceCell<Regex> = OnceCell::new();
    let re_title = RE_TITLE.get_or_init(|| {
        Regex::new(r"(?i)\b(engineer|scientist|researcher|developer|architect|lead)\b").unwrap()
    });
    if let Some(seg) = header
        .split('|')
        .skip(1)
        .map(str::trim)
        .find(|s| re_title.is_match(s))
    {
        return Some(seg.to_string());
    }

    let text = normalize_text(html);
    static RE_LABEL: OnceCell<Regex> = OnceCell::new();
    let re_label = RE_LABEL.get_or_init(|| Regex::new(r"(?i)\b(?:role|position|title):\s*([^|.;]+)").unwrap());
    if let Some(m) = re_label.captures(&text).and_then(|c| c.get(1)) {
        return Some(m.as_str().trim().to_string());
    }

    static RE_ML: OnceCell<Regex> = OnceCell::new();
    let re_ml = RE_ML.get_or_init(|| {
        Regex::new(r"(?i)\b(?:(?:senior|staff|principal|lead)\s+)?(?:ml|ai|machine learning|data science|mlops)\s+engineer\b")
            .unwrap()
    });
    re_ml.find(&text).map(|m| m.as_str().to_string())
}

fn extract_url(html: &str) -> Option<String> {
    static RE_URL: OnceCell<Regex> = OnceCell::new();
    let re = RE_URL.get_or_init(|| Regex::new(r#"https?://[^\s<>"]+"#).unwrap());
    let decoded = html_escape::decode_html_entities(html);
    re.find(&decoded).map(|m| m.as_str().to_string())
}
