// src/publish.rs
//! Event publishers. Each call is a single append, so a batch lands whole or not at all
//! (as far as the log implementation allows).

use crate::events::{self, EventLog, RawEvent};
use crate::listing::CanonicalListing;
use crate::scoring::{ScoredListing, ScoringHandle};
use anyhow::{Context, Result};
use metrics::{counter, describe_counter};
use once_cell::sync::OnceCell;
use std::sync::Arc;

fn ensure_metrics_described() {
    static ONCE: OnceCell<()> = OnceCell::new();
    ONCE.get_or_init(|| {
        describe_counter!("events_published_total", "Events appended, labelled by event_type.");
    });
}

/// Emits one `OpportunityDiscovered` per listing handed to it.
#[derive(Clone)]
pub struct DiscoveryPublisher {
    log: Arc<dyn EventLog>,
}

impl DiscoveryPublisher {
    pub fn new(log: Arc<dyn EventLog>) -> Self {
        Self { log }
    }

    pub fn publish(&self, listings: &[CanonicalListing]) -> Result<usize> {
        let events = listings
            .iter()
            .cloned()
            .map(|l| events::opportunity_discovered(l).into_raw())
            .collect::<Result<Vec<RawEvent>>>()?;
        append(self.log.as_ref(), events::OPPORTUNITY_DISCOVERED, &events)
    }
}

/// Emits one `OpportunityScored` per scored listing.
#[derive(Clone)]
pub struct ScorePublisher {
    log: Arc<dyn EventLog>,
}

impl ScorePublisher {
    pub fn new(log: Arc<dyn EventLog>) -> Self {
        Self { log }
    }

    pub fn publish(&self, scored: &[ScoredListing]) -> Result<usize> {
        let events = scored
            .iter()
            .cloned()
            .map(|s| events::opportunity_scored(s).into_raw())
            .collect::<Result<Vec<RawEvent>>>()?;
        append(self.log.as_ref(), events::OPPORTUNITY_SCORED, &events)
    }
}

/// Outcome of scoring the pending part of a discovery stream.
#[derive(Debug, Default)]
pub struct ScoreRun {
    pub results: Vec<(CanonicalListing, ScoredListing)>,
    /// Discovered events that could not be decoded.
    pub skipped: usize,
    /// Cursor to resume from next time.
    pub cursor: usize,
}

impl ScoreRun {
    pub fn accepted(&self) -> usize {
        self.results.iter().filter(|(_, s)| !s.rejected).count()
    }

    pub fn rejected(&self) -> usize {
        self.results.iter().filter(|(_, s)| s.rejected).count()
    }

    pub fn total(&self) -> usize {
        self.results.len()
    }
}

/// Score every `OpportunityDiscovered` after `cursor` in `input` and publish
/// the results. Other event types are skipped silently.
pub fn score_pending(
    input: &dyn EventLog,
    cursor: usize,
    engine: &ScoringHandle,
    publisher: &ScorePublisher,
) -> Result<ScoreRun> {
    let (evs, next) = input.read_since(cursor)?;
    let mut run = ScoreRun {
        cursor: next,
        ..Default::default()
    };

    let mut listings = Vec::new();
    for ev in evs.iter().filter(|e| e.is(events::OPPORTUNITY_DISCOVERED)) {
        match ev.decode::<CanonicalListing>() {
            Ok(l) => listings.push(l),
            Err(e) => {
                tracing::warn!(target: "scoring", error = %e, "skipping undecodable event");
                run.skipped += 1;
            }
        }
    }

    let scored = engine.score_batch(&listings)?;
    publisher.publish(&scored)?;
    run.results = listings.into_iter().zip(scored).collect();
    tracing::info!(
        target: "scoring",
        accepted = run.accepted(),
        rejected = run.rejected(),
        skipped = run.skipped,
        "scoring run done"
    );
    Ok(run)
}

fn append(log: &dyn EventLog, event_type: &'static str, events: &[RawEvent]) -> Result<usize> {
    ensure_metrics_described();
    if events.is_empty() {
        return Ok(0);
    }
    log.append(events)
        .with_context(|| format!("publishing {} {event_type} events", events.len()))?;
    counter!("events_published_total", "event_type" => event_type).increment(events.len() as u64);
    tracing::info!(event_type, count = events.len(), "events published");
    Ok(events.len())
}
