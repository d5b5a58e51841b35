// src/ingest/providers/aijobs_uk.rs
//! AIJobs.co.uk through its WordPress REST API. UK board, so salaries
//! without a symbol are GBP.

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;

use crate::error::SourceError;
use crate::ingest::extract::{mentions_remote, parse_salary, split_company_role, truncate_chars};
use crate::ingest::normalize_text;
use crate::ingest::providers::get_text;
use crate::ingest::types::{SourceAdapter, SourceFetch};
use crate::listing::{Currency, LocationType, RawListing, Seniority};

pub const NAME: &str = "aijobs_uk";
pub const DEFAULT_URL: &str = "https://aijobs.co.uk/wp-json/wp/v2/job-listings";

#[derive(Debug, Deserialize)]
struct Rendered {
    #[serde(default)]
    rendered: String,
}

#[derive(Debug, Default, Deserialize)]
struct Fields {
    company: Option<String>,
    company_name: Option<String>,
    location: Option<String>,
    salary: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Post {
    title: Rendered,
    #[serde(default)]
    content: Option<Rendered>,
    #[serde(default)]
    link: String,
    // WordPress returns `[]` instead of `{}` for empty meta, hence Value.
    #[serde(default)]
    meta: Value,
    #[serde(default)]
    acf: Value,
}

pub struct AiJobsUkAdapter {
    mode: Mode,
}

enum Mode {
    Fixture(String),
    Http { url: String, client: reqwest::Client },
}

impl AiJobsUkAdapter {
    pub fn from_fixture_str(json: &str) -> Self {
        Self {
            mode: Mode::Fixture(json.to_string()),
        }
    }

    pub fn from_url(url: impl Into<String>, client: reqwest::Client) -> Self {
        Self {
            mode: Mode::Http {
                url: url.into(),
                client,
            },
        }
    }
}

#[async_trait]
impl SourceAdapter for AiJobsUkAdapter {
    async fn fetch(&self) -> SourceFetch {
        let res = match &self.mode {
            Mode::Fixture(json) => parse_posts(json),
            Mode::Http { url, client } => {
                let query = [
                    ("per_page", "100".to_string()),
                    ("orderby", "date".to_string()),
                    ("order", "desc".to_string()),
                ];
                match get_text(client, url, &query).await {
                    Ok(body) => parse_posts(&body),
                    Err(e) => Err(e),
                }
            }
        };
        SourceFetch::from_result(NAME, res)
    }

    fn name(&self) -> &'static str {
        NAME
    }
}

/// The envelope must be a JSON array; individual posts that don't match the
/// expected shape are dropped and counted.
fn parse_posts(body: &str) -> Result<SourceFetch, SourceError> {
    let items: Vec<Value> = serde_json::from_str(body)?;
    let mut out = Vec::new();
    let mut dropped = 0usize;
    for item in items {
        match serde_json::from_value::<Post>(item) {
            Ok(post) => {
                if let Some(l) = parse_post(post) {
                    out.push(l);
                }
            }
            Err(e) => {
                tracing::debug!(target: "ingest", source = NAME, error = %e, "skipping malformed post");
                dropped += 1;
            }
        }
    }
    Ok(SourceFetch::partial(out, dropped))
}

fn fields(v: &Value) -> Fields {
    serde_json::from_value(v.clone()).unwrap_or_default()
}

fn parse_post(post: Post) -> Option<RawListing> {
    let title = normalize_text(&post.title.rendered);
    if title.is_empty() {
        return None;
    }
    let content_html = post.content.map(|c| c.rendered).unwrap_or_default();
    let description = normalize_text(&content_html);

    let meta = fields(&post.meta);
    let acf = fields(&post.acf);

    let split = split_company_role(&title);
    let company = meta
        .company
        .or(acf.company)
        .or(acf.company_name)
        .filter(|c| !c.trim().is_empty())
        .or_else(|| split.as_ref().map(|(c, _)| c.clone()))
        .unwrap_or_else(|| "AI Company".to_string());
    let role = split.map(|(_, r)| r).unwrap_or_else(|| title.clone());

    let location_text = meta
        .location
        .or(acf.location)
        .unwrap_or_else(|| description.clone());
    // Remote-only feed: anything else is filtered here.
    if !mentions_remote(&location_text) {
        return None;
    }

    let salary_text = [
        meta.salary.unwrap_or_default(),
        acf.salary.unwrap_or_default(),
        description.clone(),
    ]
    .join(" ");

    let mut l = RawListing::new(NAME, company.trim(), role);
    l.location = LocationType::Remote;
    l.seniority = Seniority::infer(&title);
    if l.seniority == Seniority::Unknown {
        l.seniority = Seniority::infer(&description);
    }
    l.salary = parse_salary(&salary_text, Currency::Gbp);
    l.description = truncate_chars(&description, 500);
    l.url = post.link;
    Some(l)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_posts_and_counts_malformed() {
        let body = r#"[
          {"title": {"rendered": "Staff Research Engineer"},
           "content": {"rendered": "<p>Remote within the UK. £90,000 - £120,000.</p>"},
           "link": "https://aijobs.co.uk/job/1",
           "meta": [],
           "acf": {"company_name": "Brightloop"}},
          {"title": {"rendered": "Acme | NLP Engineer"},
           "content": {"rendered": "<p>Office based in Leeds.</p>"},
           "link": "https://aijobs.co.uk/job/2"},
          {"title": "not an object"}
        ]"#;
        let fetch = parse_posts(body).unwrap();
        assert_eq!(
            fetch.outcome,
            crate::ingest::types::FetchOutcome::Success { dropped: 1 }
        );
        assert_eq!(fetch.listings.len(), 1);
        let l = &fetch.listings[0];
        assert_eq!(l.company, "Brightloop");
        assert_eq!(l.seniority, Seniority::Staff);
        let s = l.salary.unwrap();
        assert_eq!(s.currency, Currency::Gbp);
        assert_eq!(s.max, Some(120_000.0));
    }

    #[test]
    fn non_array_body_is_a_parse_error() {
        assert!(matches!(
            parse_posts(r#"{"code": "rest_no_route"}"#),
            Err(SourceError::Parse(_))
        ));
    }
}
