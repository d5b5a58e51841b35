// src/lib.rs
// Public library surface for the binary and integration tests.

pub mod dedup;
pub mod discovery;
pub mod error;
pub mod events;
pub mod ingest;
pub mod listing;
pub mod metrics;
pub mod publish;
pub mod scoring;

pub use crate::discovery::{Discovery, DiscoverySummary};
pub use crate::listing::{CanonicalListing, RawListing};
pub use crate::scoring::{ScoredListing, ScoringEngine, ScoringHandle};
