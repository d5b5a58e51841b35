// src/discovery.rs
//! One discovery run: scan, merge, publish what is new, remember it.

use crate::dedup::{self, SeenStore};
use crate::error::ScanError;
use crate::ingest::{ScanReport, Scanner};
use crate::publish::DiscoveryPublisher;
use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;

#[derive(Debug, Clone, Serialize)]
pub struct DiscoverySummary {
    pub timestamp: DateTime<Utc>,
    pub report: ScanReport,
    pub total_fetched: usize,
    pub after_dedup: usize,
    pub new_listings: usize,
    pub events_published: usize,
    pub anomalies: usize,
}

/// Owns the seen-set. `run` holds it for the whole run, so concurrent runs
/// serialize instead of publishing the same listing twice.
pub struct Discovery {
    scanner: Scanner,
    seen: Mutex<Box<dyn SeenStore>>,
    publisher: DiscoveryPublisher,
}

impl Discovery {
    pub fn new(scanner: Scanner, seen: Box<dyn SeenStore>, publisher: DiscoveryPublisher) -> Self {
        Self {
            scanner,
            seen: Mutex::new(seen),
            publisher,
        }
    }

    pub async fn seen_count(&self) -> usize {
        self.seen.lock().await.len()
    }

    /// Cancellation before publication returns `ScanError::Cancelled` and leaves
    /// the seen-set as it was. A failed publish also leaves it untouched.
    pub async fn run(&self, cancel: &CancellationToken) -> Result<DiscoverySummary> {
        let mut seen = self.seen.lock().await;

        let batch = self.scanner.scan_with_cancel(cancel).await?;
        let total_fetched = batch.listings.len();

        let (merged, dedup_report) = dedup::merge(batch.listings);
        let after_dedup = merged.len();

        let fresh: Vec<_> = merged
            .into_iter()
            .filter(|l| !seen.contains(&l.listing_id))
            .collect();

        if cancel.is_cancelled() {
            return Err(ScanError::Cancelled.into());
        }
        let events_published = self.publisher.publish(&fresh)?;

        for l in &fresh {
            seen.insert(&l.listing_id);
        }
        seen.persist()?;

        let summary = DiscoverySummary {
            timestamp: Utc::now(),
            total_fetched,
            after_dedup,
            new_listings: fresh.len(),
            events_published,
            anomalies: dedup_report.anomalies.len(),
            report: batch.report,
        };
        tracing::info!(
            target: "ingest",
            sources_ok = summary.report.succeeded(),
            sources_failed = summary.report.failed(),
            fetched = total_fetched,
            after_dedup,
            new = summary.new_listings,
            published = events_published,
            "discovery run done"
        );
        Ok(summary)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dedup::MemorySeenStore;
    use crate::events::MemoryEventLog;
    use crate::ingest::types::{SourceAdapter, SourceFetch};
    use crate::listing::RawListing;
    use std::sync::Arc;

    struct Fixed(Vec<RawListing>);

    #[async_trait::async_trait]
    impl SourceAdapter for Fixed {
        async fn fetch(&self) -> SourceFetch {
            SourceFetch::success(self.0.clone())
        }
        fn name(&self) -> &'static str {
            "fixed"
        }
    }

    fn discovery(log: Arc<MemoryEventLog>) -> Discovery {
        let adapters: Vec<Box<dyn SourceAdapter>> = vec![Box::new(Fixed(vec![
            RawListing::new("fixed", "Acme", "ML Engineer"),
            RawListing::new("fixed", "Beta", "AI Engineer"),
        ]))];
        Discovery::new(
            Scanner::new(adapters),
            Box::new(MemorySeenStore::new()),
            DiscoveryPublisher::new(log),
        )
    }

    #[tokio::test]
    async fn second_run_publishes_nothing() {
        let log = Arc::new(MemoryEventLog::new());
        let d = discovery(log.clone());
        let token = CancellationToken::new();

        let first = d.run(&token).await.unwrap();
        assert_eq!(first.events_published, 2);
        let second = d.run(&token).await.unwrap();
        assert_eq!(second.after_dedup, 2);
        assert_eq!(second.events_published, 0);
        assert_eq!(log.len(), 2);
        assert_eq!(d.seen_count().await, 2);
    }

    #[tokio::test]
    async fn cancelled_run_leaves_seen_set_alone() {
        let log = Arc::new(MemoryEventLog::new());
        let d = discovery(log.clone());
        let token = CancellationToken::new();
        token.cancel();

        let err = d.run(&token).await.unwrap_err();
        assert!(matches!(err.downcast_ref::<ScanError>(), Some(ScanError::Cancelled)));
        assert_eq!(d.seen_count().await, 0);
        assert!(log.is_empty());
    }
}
