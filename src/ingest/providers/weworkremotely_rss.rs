// src/ingest/providers/weworkremotely_rss.rs
//! We Work Remotely category RSS feed. Item titles read "Company: Role".

use async_trait::async_trait;
use quick_xml::de::from_str;
use serde::Deserialize;
use time::{format_description::well_known::Rfc2822, OffsetDateTime};

use crate::error::SourceError;
use crate::ingest::extract::{mentions_ai_ml, parse_salary, split_company_role, truncate_chars};
use crate::ingest::normalize_text;
use crate::ingest::providers::get_text;
use crate::ingest::types::{SourceAdapter, SourceFetch};
use crate::listing::{Currency, LocationType, RawListing, Seniority};

pub const NAME: &str = "weworkremotely_rss";
pub const DEFAULT_URL: &str = "https://weworkremotely.com/categories/remote-programming-jobs.rss";

const MAX_AGE_DAYS: i64 = 60;

#[derive(Debug, Deserialize)]
struct Rss {
    channel: Channel,
}

#[derive(Debug, Deserialize)]
struct Channel {
    #[serde(rename = "item", default)]
    item: Vec<Item>,
}

#[derive(Debug, Deserialize)]
struct Item {
    title: Option<String>,
    link: Option<String>,
    #[serde(rename = "pubDate")]
    pub_date: Option<String>,
    description: Option<String>,
}

fn parse_rfc2822(ts: &str) -> Option<OffsetDateTime> {
    OffsetDateTime::parse(ts.trim(), &Rfc2822).ok()
}

pub struct WeWorkRemotelyAdapter {
    mode: Mode,
}

enum Mode {
    Fixture(String),
    Http { url: String, client: reqwest::Client },
}

impl WeWorkRemotelyAdapter {
    pub fn from_fixture_str(xml: &str) -> Self {
        Self {
            mode: Mode::Fixture(xml.to_string()),
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
impl SourceAdapter for WeWorkRemotelyAdapter {
    async fn fetch(&self) -> SourceFetch {
        let now = OffsetDateTime::now_utc();
        let res = match &self.mode {
            Mode::Fixture(xml) => parse_feed(xml, now),
            Mode::Http { url, client } => match get_text(client, url, &[]).await {
                Ok(body) => parse_feed(&body, now),
                Err(e) => Err(e),
            },
        };
        SourceFetch::from_result(NAME, res)
    }

    fn name(&self) -> &'static str {
        NAME
    }
}

/// Items older than `MAX_AGE_DAYS` are skipped; items without a usable
/// "Company: Role" title are dropped and counted.
fn parse_feed(xml: &str, now: OffsetDateTime) -> Result<SourceFetch, SourceError> {
    let xml_clean = scrub_html_entities_for_xml(xml);
    let rss: Rss = from_str(&xml_clean)?;
    let cutoff = now - time::Duration::days(MAX_AGE_DAYS);

    let mut out = Vec::with_capacity(rss.channel.item.len());
    let mut dropped = 0usize;
    for it in rss.channel.item {
        let published = it.pub_date.as_deref().and_then(parse_rfc2822);
        if published.is_some_and(|p| p < cutoff) {
            continue;
        }

        let title = normalize_text(it.title.as_deref().unwrap_or_default());
        let Some((company, role)) = split_company_role(&title) else {
            dropped += 1;
            continue;
        };
        if !mentions_ai_ml(&role) {
            continue;
        }

        let description = normalize_text(it.description.as_deref().unwrap_or_default());
        let mut l = RawListing::new(NAME, company, role);
        l.location = LocationType::Remote;
        l.seniority = Seniority::infer(&l.role);
        if l.seniority == Seniority::Unknown {
            l.seniority = Seniority::infer(&description);
        }
        l.salary = parse_salary(&description, Currency::Usd);
        l.description = truncate_chars(&description, 500);
        l.url = it.link.unwrap_or_default();
        out.push(l);
    }
    Ok(SourceFetch::partial(out, dropped))
}

// XML knows only five named entities; feeds ship HTML ones anyway.
fn scrub_html_entities_for_xml(s: &str) -> String {
    s.replace("&nbsp;", " ")
        .replace("&ndash;", "-")
        .replace("&mdash;", "-")
        .replace("&ldquo;", "\"")
        .replace("&rdquo;", "\"")
        .replace("&lsquo;", "'")
        .replace("&rsquo;", "'")
}

#[cfg(test)]
mod tests {
    use super::*;

    const FEED: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<rss version="2.0">
<channel>
  <title>We Work Remotely: Remote Programming Jobs</title>
  <item>
    <title>Ledgerly: Senior ML Engineer</title>
    <link>https://weworkremotely.com/remote-jobs/ledgerly-senior-ml-engineer</link>
    <pubDate>Mon, 05 Oct 2026 10:00:00 +0000</pubDate>
    <description>&lt;p&gt;Payments risk models. $140k - $170k&nbsp;USD.&lt;/p&gt;</description>
  </item>
  <item>
    <title>Pixelworks: Frontend Developer</title>
    <link>https://weworkremotely.com/remote-jobs/pixelworks-frontend</link>
    <pubDate>Mon, 05 Oct 2026 10:00:00 +0000</pubDate>
    <description>React and CSS.</description>
  </item>
  <item>
    <title>Old Co: Machine Learning Engineer</title>
    <pubDate>Wed, 01 Jan 2025 10:00:00 +0000</pubDate>
  </item>
  <item>
    <title>Untitled posting</title>
  </item>
</channel>
</rss>"#;

    fn now() -> OffsetDateTime {
        parse_rfc2822("Fri, 16 Oct 2026 12:00:00 +0000").unwrap()
    }

    #[test]
    fn parses_recent_ai_items() {
        let fetch = parse_feed(FEED, now()).unwrap();
        assert_eq!(fetch.listings.len(), 1);
        assert_eq!(
            fetch.outcome,
            crate::ingest::types::FetchOutcome::Success { dropped: 1 }
        );
        let l = &fetch.listings[0];
        assert_eq!(l.company, "Ledgerly");
        assert_eq!(l.role, "Senior ML Engineer");
        assert_eq!(l.seniority, Seniority::Senior);
        assert_eq!(l.description, "Payments risk models. $140k - $170k USD.");
        let s = l.salary.unwrap();
        assert_eq!(s.currency, Currency::Usd);
        assert_eq!(s.min, Some(140_000.0));
    }

    #[test]
    fn malformed_feed_is_a_parse_error() {
        let err = parse_feed("<rss><channel><item>", now()).unwrap_err();
        assert!(matches!(err, SourceError::Parse(_)));
    }
}
