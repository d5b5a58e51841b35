// src/ingest/providers/working_nomads.rs
//! Working Nomads job board (HTML). The board is remote-only.

use async_trait::async_trait;
use scraper::{ElementRef, Html, Selector};

use crate::error::SourceError;
use crate::ingest::extract::{mentions_ai_ml, parse_salary, truncate_chars};
use crate::ingest::normalize_text;
use crate::ingest::providers::get_text;
use crate::ingest::types::{SourceAdapter, SourceFetch};
use crate::listing::{Currency, LocationType, RawListing, Seniority};

pub const NAME: &str = "working_nomads";
pub const DEFAULT_URL: &str = "https://www.workingnomads.com/jobs";
const SITE_ROOT: &str = "https://www.workingnomads.com";

pub struct WorkingNomadsAdapter {
    mode: Mode,
}

enum Mode {
    Fixture(String),
    Http { url: String, client: reqwest::Client },
}

impl WorkingNomadsAdapter {
    pub fn from_fixture_str(html: &str) -> Self {
        Self {
            mode: Mode::Fixture(html.to_string()),
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
impl SourceAdapter for WorkingNomadsAdapter {
    async fn fetch(&self) -> SourceFetch {
        let res = match &self.mode {
            Mode::Fixture(html) => parse_page(html),
            Mode::Http { url, client } => {
                match get_text(client, url, &[("category", "development".to_string())]).await {
                    Ok(body) => parse_page(&body),
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

struct Selectors {
    card: Selector,
    title: Selector,
    company: Selector,
    description: Selector,
    link: Selector,
    salary: Selector,
    tags: Selector,
}

impl Selectors {
    fn new() -> Result<Self, SourceError> {
        let parse = |s: &str| Selector::parse(s).map_err(|e| SourceError::Parse(format!("selector `{s}`: {e}")));
        Ok(Self {
            card: parse(".job-list > li, article.job")?,
            title: parse("h3, .job-title, a.job-link")?,
            company: parse(".company, .company-name, h4")?,
            description: parse(".description, .job-description, p")?,
            link: parse("a")?,
            salary: parse(".salary, .compensation")?,
            tags: parse(".tag, .tags li")?,
        })
    }
}

/// Parse a listing page. Cards without a title are dropped, non-AI/ML roles filtered.
fn parse_page(html: &str) -> Result<SourceFetch, SourceError> {
    let sel = Selectors::new()?;
    let doc = Html::parse_document(html);

    let mut out = Vec::new();
    let mut dropped = 0usize;
    let mut cards = 0usize;
    for card in doc.select(&sel.card) {
        cards += 1;
        match parse_card(card, &sel) {
            Some(Some(l)) => out.push(l),
            Some(None) => {}
            None => dropped += 1,
        }
    }
    if cards == 0 {
        // The board always lists something; zero cards means the markup changed.
        return Err(SourceError::Parse("no job cards found".into()));
    }
    Ok(SourceFetch::partial(out, dropped))
}

fn text_of(el: ElementRef<'_>) -> String {
    normalize_text(&el.text().collect::<String>())
}

/// `None` = unparseable card, `Some(None)` = filtered out.
fn parse_card(card: ElementRef<'_>, sel: &Selectors) -> Option<Option<RawListing>> {
    let role = card.select(&sel.title).next().map(text_of).filter(|t| !t.is_empty())?;
    if !mentions_ai_ml(&role) {
        return Some(None);
    }

    let company = card
        .select(&sel.company)
        .next()
        .map(text_of)
        .filter(|t| !t.is_empty())
        .unwrap_or_else(|| "Unknown Company".to_string());

    let mut l = RawListing::new(NAME, company, role);
    l.location = LocationType::Remote;
    l.seniority = Seniority::infer(&l.role);
    l.description = card
        .select(&sel.description)
        .next()
        .map(text_of)
        .map(|d| truncate_chars(&d, 500))
        .unwrap_or_default();
    l.url = card
        .select(&sel.link)
        .next()
        .and_then(|a| a.value().attr("href"))
        .map(|href| {
            if href.starts_with("http") {
                href.to_string()
            } else {
                format!("{SITE_ROOT}{href}")
            }
        })
        .unwrap_or_default();
    l.salary = card
        .select(&sel.salary)
        .next()
        .map(text_of)
        .and_then(|s| parse_salary(&s, Currency::Usd));
    l.tech_tags = card
        .select(&sel.tags)
        .map(text_of)
        .filter(|t| !t.is_empty())
        .collect();
    Some(Some(l))
}
