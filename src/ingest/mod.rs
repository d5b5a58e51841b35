// src/ingest/mod.rs
pub mod config;
pub mod extract;
pub mod providers;
pub mod types;

use crate::error::ScanError;
use crate::ingest::types::{FetchOutcome, SourceAdapter, SourceFetch};
use crate::listing::RawListing;
use futures::stream::{self, StreamExt};
use futures::FutureExt;
use metrics::{counter, describe_counter, describe_gauge, describe_histogram, gauge, histogram};
use once_cell::sync::OnceCell;
use serde::Serialize;
use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;

/// One-time metrics registration (so series show up in the exposition).
fn ensure_metrics_described() {
    static ONCE: OnceCell<()> = OnceCell::new();
    ONCE.get_or_init(|| {
        describe_counter!("scan_listings_total", "Raw listings returned by adapters.");
        describe_counter!(
            "scan_dropped_total",
            "Items adapters saw but could not parse or reach."
        );
        describe_counter!(
            "scan_source_errors_total",
            "Adapter failures, timeouts included."
        );
        describe_histogram!("scan_fetch_ms", "Adapter fetch time in milliseconds.");
        describe_gauge!("scan_last_run_ts", "Unix ts when the scanner last ran.");
    });
}

/// Normalize text: decode entities, strip tags, collapse whitespace.
pub fn normalize_text(s: &str) -> String {
    // 1) HTML entity decode
    let mut out = html_escape::decode_html_entities(s).to_string();

    // 2) Strip HTML tags (<p> and <br> become spaces so words don't glue)
    static RE_TAGS: OnceCell<regex::Regex> = OnceCell::new();
    let re_tags = RE_TAGS.get_or_init(|| regex::Regex::new(r"(?is)</?[^>]+>").unwrap());
    out = re_tags.replace_all(&out, " ").to_string();

    // 3) Normalize “ ” ‘ ’ « » to ASCII quotes
    out = out
        .replace(['\u{201C}', '\u{201D}', '\u{00AB}', '\u{00BB}'], "\"")
        .replace(['\u{2018}', '\u{2019}'], "'");

    // 4) Collapse whitespace
    static RE_WS: OnceCell<regex::Regex> = OnceCell::new();
    let re_ws = RE_WS.get_or_init(|| regex::Regex::new(r"\s+").unwrap());
    out = re_ws.replace_all(&out, " ").to_string();
    out.trim().to_string()
}

/// Per-source line of the scan report.
#[derive(Debug, Clone, Serialize)]
pub struct SourceReport {
    pub source: String,
    pub outcome: FetchOutcome,
    pub listings: usize,
    pub elapsed_ms: u64,
}

/// `{source: outcome}` for observability, in scan order.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ScanReport {
    pub sources: Vec<SourceReport>,
}

impl ScanReport {
    pub fn succeeded(&self) -> usize {
        self.sources.iter().filter(|s| s.outcome.is_success()).count()
    }

    pub fn failed(&self) -> usize {
        self.sources.len() - self.succeeded()
    }

    /// No adapter produced a usable result.
    pub fn is_degraded(&self) -> bool {
        self.succeeded() == 0
    }

    pub fn outcome_of(&self, source: &str) -> Option<&FetchOutcome> {
        self.sources
            .iter()
            .find(|s| s.source == source)
            .map(|s| &s.outcome)
    }
}

#[derive(Debug, Clone, Default)]
pub struct ScanBatch {
    pub listings: Vec<RawListing>,
    pub report: ScanReport,
}

/// Runs the enabled adapters with bounded fan-out and a timeout per adapter.
pub struct Scanner {
    adapters: Vec<Box<dyn SourceAdapter>>,
    max_concurrency: usize,
    timeout: Duration,
}

impl Scanner {
    pub fn new(adapters: Vec<Box<dyn SourceAdapter>>) -> Self {
        let defaults = config::ScanSettings::default();
        Self {
            adapters,
            max_concurrency: defaults.max_concurrency,
            timeout: defaults.timeout(),
        }
    }

    pub fn with_settings(mut self, settings: &config::ScanSettings) -> Self {
        self.max_concurrency = settings.max_concurrency.max(1);
        self.timeout = settings.timeout();
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_max_concurrency(mut self, n: usize) -> Self {
        self.max_concurrency = n.max(1);
        self
    }

    pub fn source_names(&self) -> Vec<&'static str> {
        self.adapters.iter().map(|a| a.name()).collect()
    }

    /// Scan every adapter. One adapter failing or timing out never affects the others.
    pub async fn scan(&self) -> ScanBatch {
        ensure_metrics_described();

        // `buffered` keeps adapter order in the output, so merge precedence
        // does not depend on which source answered first.
        let results: Vec<(&'static str, SourceFetch, u64)> = stream::iter(self.adapters.iter())
            .map(|adapter| self.fetch_one(adapter.as_ref()))
            .buffered(self.max_concurrency)
            .collect()
            .await;

        let mut batch = ScanBatch::default();
        for (source, fetch, elapsed_ms) in results {
            match &fetch.outcome {
                FetchOutcome::Success { dropped } => {
                    tracing::info!(
                        target: "ingest",
                        source,
                        listings = fetch.listings.len(),
                        dropped,
                        elapsed_ms,
                        "source ok"
                    );
                    counter!("scan_listings_total").increment(fetch.listings.len() as u64);
                    counter!("scan_dropped_total").increment(*dropped as u64);
                }
                FetchOutcome::Failure { reason } => {
                    tracing::warn!(target: "ingest", source, %reason, elapsed_ms, "source failed");
                    counter!("scan_source_errors_total").increment(1);
                }
            }
            batch.report.sources.push(SourceReport {
                source: source.to_string(),
                outcome: fetch.outcome,
                listings: fetch.listings.len(),
                elapsed_ms,
            });
            batch.listings.extend(fetch.listings);
        }

        if batch.report.is_degraded() {
            tracing::warn!(
                target: "ingest",
                sources = batch.report.sources.len(),
                "degraded scan: no source succeeded, continuing with an empty batch"
            );
        }

        let now = chrono::Utc::now().timestamp().max(0);
        gauge!("scan_last_run_ts").set(now as f64);
        batch
    }

    /// Like `scan`, but returns `Cancelled` as soon as the token fires.
    /// Nothing has been merged or published at that point.
    pub async fn scan_with_cancel(&self, cancel: &CancellationToken) -> Result<ScanBatch, ScanError> {
        tokio::select! {
            batch = self.scan() => Ok(batch),
            _ = cancel.cancelled() => {
                tracing::warn!(target: "ingest", "scan cancelled");
                Err(ScanError::Cancelled)
            }
        }
    }

    async fn fetch_one(&self, adapter: &dyn SourceAdapter) -> (&'static str, SourceFetch, u64) {
        let name = adapter.name();
        let t0 = Instant::now();
        // A panicking adapter counts as one failed source, not a failed scan.
        let guarded = AssertUnwindSafe(adapter.fetch()).catch_unwind();
        let fetch = match tokio::time::timeout(self.timeout, guarded).await {
            Ok(Ok(f)) => f,
            Ok(Err(panic)) => SourceFetch::failure(format!("adapter panicked: {}", panic_message(&*panic))),
            Err(_) => SourceFetch::failure(format!(
                "timed out after {}s",
                self.timeout.as_secs_f64()
            )),
        };
        let ms = t0.elapsed().as_secs_f64() * 1_000.0;
        histogram!("scan_fetch_ms").record(ms);
        (name, fetch, ms as u64)
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> &str {
    if let Some(s) = panic.downcast_ref::<&str>() {
        s
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.as_str()
    } else {
        "unknown panic"
    }
}
