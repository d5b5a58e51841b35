// tests/scanner.rs
use async_trait::async_trait;
use opportunity_scout::error::ScanError;
use opportunity_scout::ingest::types::{FetchOutcome, SourceAdapter, SourceFetch};
use opportunity_scout::ingest::Scanner;
use opportunity_scout::listing::RawListing;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Sleeps, then returns one listing or a failure.
struct Scripted {
    name: &'static str,
    delay: Duration,
    fail: bool,
}

#[async_trait]
impl SourceAdapter for Scripted {
    async fn fetch(&self) -> SourceFetch {
        tokio::time::sleep(self.delay).await;
        if self.fail {
            SourceFetch::failure("HTTP 503 Service Unavailable")
        } else {
            SourceFetch::success(vec![RawListing::new(self.name, self.name, "ML Engineer")])
        }
    }
    fn name(&self) -> &'static str {
        self.name
    }
}

fn scripted(name: &'static str, delay_ms: u64, fail: bool) -> Box<dyn SourceAdapter> {
    Box::new(Scripted {
        name,
        delay: Duration::from_millis(delay_ms),
        fail,
    })
}

#[tokio::test(start_paused = true)]
async fn one_failing_source_does_not_stop_the_others() {
    let scanner = Scanner::new(vec![
        scripted("alpha", 10, false),
        scripted("beta", 10, true),
        scripted("gamma", 10, false),
    ]);
    let batch = scanner.scan().await;

    assert_eq!(batch.listings.len(), 2);
    assert_eq!(batch.report.succeeded(), 2);
    assert_eq!(batch.report.failed(), 1);
    assert!(matches!(
        batch.report.outcome_of("beta"),
        Some(FetchOutcome::Failure { reason }) if reason.contains("503")
    ));
    assert!(!batch.report.is_degraded());
}

#[tokio::test(start_paused = true)]
async fn slow_source_times_out() {
    let scanner = Scanner::new(vec![scripted("slow", 120_000, false), scripted("fast", 5, false)])
        .with_timeout(Duration::from_secs(30));
    let batch = scanner.scan().await;

    assert_eq!(batch.listings.len(), 1);
    assert_eq!(batch.listings[0].source, "fast");
    assert!(matches!(
        batch.report.outcome_of("slow"),
        Some(FetchOutcome::Failure { reason }) if reason.contains("timed out")
    ));
}

#[tokio::test(start_paused = true)]
async fn output_follows_adapter_order_not_finish_order() {
    let scanner = Scanner::new(vec![
        scripted("first", 300, false),
        scripted("second", 100, false),
        scripted("third", 1, false),
    ])
    .with_max_concurrency(3);
    let batch = scanner.scan().await;

    let sources: Vec<_> = batch.listings.iter().map(|l| l.source.as_str()).collect();
    assert_eq!(sources, vec!["first", "second", "third"]);
    let reported: Vec<_> = batch.report.sources.iter().map(|s| s.source.as_str()).collect();
    assert_eq!(reported, vec!["first", "second", "third"]);
}

#[tokio::test(start_paused = true)]
async fn all_sources_failing_is_a_degraded_empty_batch() {
    let scanner = Scanner::new(vec![scripted("a", 1, true), scripted("b", 1, true)]);
    let batch = scanner.scan().await;

    assert!(batch.listings.is_empty());
    assert!(batch.report.is_degraded());
    assert_eq!(batch.report.failed(), 2);
}

#[tokio::test]
async fn empty_scanner_is_degraded_too() {
    let batch = Scanner::new(Vec::new()).scan().await;
    assert!(batch.listings.is_empty());
    assert!(batch.report.is_degraded());
}

#[tokio::test(start_paused = true)]
async fn cancellation_interrupts_a_running_scan() {
    let scanner = Scanner::new(vec![scripted("slow", 10_000, false)]);
    let token = CancellationToken::new();
    let trigger = token.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(50)).await;
        trigger.cancel();
    });

    let res = scanner.scan_with_cancel(&token).await;
    assert!(matches!(res, Err(ScanError::Cancelled)));
}

/// Tracks how many fetches are running at once.
struct Gauged {
    name: &'static str,
    in_flight: Arc<AtomicUsize>,
    peak: Arc<AtomicUsize>,
}

#[async_trait]
impl SourceAdapter for Gauged {
    async fn fetch(&self) -> SourceFetch {
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
        tokio::time::sleep(Duration::from_millis(100)).await;
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        SourceFetch::success(vec![RawListing::new(self.name, self.name, "ML Engineer")])
    }
    fn name(&self) -> &'static str {
        self.name
    }
}

#[tokio::test(start_paused = true)]
async fn fetches_never_exceed_max_concurrency() {
    let in_flight = Arc::new(AtomicUsize::new(0));
    let peak = Arc::new(AtomicUsize::new(0));
    let adapters: Vec<Box<dyn SourceAdapter>> = ["a", "b", "c", "d", "e"]
        .into_iter()
        .map(|name| {
            Box::new(Gauged {
                name,
                in_flight: in_flight.clone(),
                peak: peak.clone(),
            }) as Box<dyn SourceAdapter>
        })
        .collect();

    let batch = Scanner::new(adapters).with_max_concurrency(2).scan().await;

    assert_eq!(batch.listings.len(), 5);
    assert_eq!(peak.load(Ordering::SeqCst), 2);
    assert_eq!(in_flight.load(Ordering::SeqCst), 0);
}

struct Panicky;

#[async_trait]
impl SourceAdapter for Panicky {
    async fn fetch(&self) -> SourceFetch {
        panic!("selector table missing");
    }
    fn name(&self) -> &'static str {
        "panicky"
    }
}

#[tokio::test(start_paused = true)]
async fn panicking_adapter_is_one_failed_source() {
    let scanner = Scanner::new(vec![
        scripted("alpha", 10, false),
        Box::new(Panicky) as Box<dyn SourceAdapter>,
        scripted("gamma", 10, false),
    ]);
    let batch = scanner.scan().await;

    assert_eq!(batch.listings.len(), 2);
    assert_eq!(batch.report.failed(), 1);
    assert!(matches!(
        batch.report.outcome_of("panicky"),
        Some(FetchOutcome::Failure { reason }) if reason.contains("selector table missing")
    ));
}
