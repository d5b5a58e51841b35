// src/ingest/providers/mod.rs
//! Source registry. A new source is one file here, one arm in
//! `build_adapters` and one `[sources.<name>]` entry in the config.

pub mod aijobs_uk;
pub mod hn_algolia;
pub mod weworkremotely_rss;
pub mod working_nomads;

use crate::error::SourceError;
use crate::ingest::config::SourcesConfig;
use crate::ingest::types::SourceAdapter;
use std::time::Duration;

pub const KNOWN_SOURCES: &[&str] = &[
    aijobs_uk::NAME,
    hn_algolia::NAME,
    weworkremotely_rss::NAME,
    working_nomads::NAME,
];

/// Shared HTTP client for all adapters.
pub fn http_client() -> anyhow::Result<reqwest::Client> {
    let client = reqwest::Client::builder()
        .timeout(Duration::from_secs(30))
        .user_agent(concat!("opportunity-scout/", env!("CARGO_PKG_VERSION")))
        .build()?;
    Ok(client)
}

/// Build adapters for every enabled source, in config order.
pub fn build_adapters(cfg: &SourcesConfig, client: &reqwest::Client) -> Vec<Box<dyn SourceAdapter>> {
    let mut out: Vec<Box<dyn SourceAdapter>> = Vec::new();
    for (name, entry) in cfg.enabled() {
        let url = entry.url.clone();
        let adapter: Box<dyn SourceAdapter> = match name {
            aijobs_uk::NAME => Box::new(aijobs_uk::AiJobsUkAdapter::from_url(
                url.unwrap_or_else(|| aijobs_uk::DEFAULT_URL.to_string()),
                client.clone(),
            )),
            hn_algolia::NAME => Box::new(hn_algolia::HnAlgoliaAdapter::from_url(
                url.unwrap_or_else(|| hn_algolia::DEFAULT_URL.to_string()),
                client.clone(),
            )),
            weworkremotely_rss::NAME => Box::new(weworkremotely_rss::WeWorkRemotelyAdapter::from_url(
                url.unwrap_or_else(|| weworkremotely_rss::DEFAULT_URL.to_string()),
                client.clone(),
            )),
            working_nomads::NAME => Box::new(working_nomads::WorkingNomadsAdapter::from_url(
                url.unwrap_or_else(|| working_nomads::DEFAULT_URL.to_string()),
                client.clone(),
            )),
            other => {
                tracing::warn!(target: "ingest", source = other, "source enabled but not implemented");
                continue;
            }
        };
        tracing::info!(target: "ingest", source = name, "source enabled");
        out.push(adapter);
    }
    out
}

/// GET a URL as text, mapping HTTP failures (rate limits included) to `SourceError::Fetch`.
pub(crate) async fn get_text(
    client: &reqwest::Client,
    url: &str,
    query: &[(&str, String)],
) -> Result<String, SourceError> {
    let resp = client.get(url).query(query).send().await?;
    let status = resp.status();
    if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
        return Err(SourceError::Fetch(format!("rate limited (HTTP 429) by {url}")));
    }
    if !status.is_success() {
        return Err(SourceError::Fetch(format!("HTTP {status} for {url}")));
    }
    Ok(resp.text().await?)
}
