// src/events.rs
//! Versioned event envelopes and the append-only logs they are written to.

use anyhow::{anyhow, Context, Result};
use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use crate::listing::CanonicalListing;
use crate::scoring::ScoredListing;

pub const EVENT_VERSION: &str = "v1";
pub const EVENT_CONTEXT: &str = "DISC";

pub const OPPORTUNITY_DISCOVERED: &str = "OpportunityDiscovered";
pub const OPPORTUNITY_SCORED: &str = "OpportunityScored";

/// `{event_type, version, timestamp, context, payload}`. Logs store the
/// untyped form (`RawEvent`); producers build typed ones.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope<P = Value> {
    pub event_type: String,
    pub version: String,
    pub timestamp: DateTime<Utc>,
    pub context: String,
    pub payload: P,
}

pub type RawEvent = Envelope<Value>;

impl<P> Envelope<P> {
    fn v1(event_type: &str, payload: P) -> Self {
        Self {
            event_type: event_type.to_string(),
            version: EVENT_VERSION.to_string(),
            timestamp: Utc::now(),
            context: EVENT_CONTEXT.to_string(),
            payload,
        }
    }
}

impl<P: Serialize> Envelope<P> {
    pub fn into_raw(self) -> Result<RawEvent> {
        Ok(Envelope {
            event_type: self.event_type,
            version: self.version,
            timestamp: self.timestamp,
            context: self.context,
            payload: serde_json::to_value(self.payload)?,
        })
    }
}

impl RawEvent {
    pub fn is(&self, event_type: &str) -> bool {
        self.event_type == event_type
    }

    /// Decode the payload of a v1 event.
    pub fn decode<P: DeserializeOwned>(&self) -> Result<P> {
        if self.version != EVENT_VERSION {
            return Err(anyhow!(
                "unsupported {} version {:?}",
                self.event_type,
                self.version
            ));
        }
        serde_json::from_value(self.payload.clone())
            .with_context(|| format!("decoding {} payload", self.event_type))
    }
}

pub fn opportunity_discovered(listing: CanonicalListing) -> Envelope<CanonicalListing> {
    Envelope::v1(OPPORTUNITY_DISCOVERED, listing)
}

pub fn opportunity_scored(scored: ScoredListing) -> Envelope<ScoredListing> {
    Envelope::v1(OPPORTUNITY_SCORED, scored)
}

/// Append-only event stream. The cursor is the number of records consumed.
pub trait EventLog: Send + Sync {
    /// Append all events in one write.
    fn append(&self, events: &[RawEvent]) -> Result<()>;
    /// Events after `cursor`, and the cursor to pass next time.
    fn read_since(&self, cursor: usize) -> Result<(Vec<RawEvent>, usize)>;
}

/// One JSON object per line.
#[derive(Debug, Clone)]
pub struct JsonlEventLog {
    path: PathBuf,
}

impl JsonlEventLog {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl EventLog for JsonlEventLog {
    fn append(&self, events: &[RawEvent]) -> Result<()> {
        if events.is_empty() {
            return Ok(());
        }
        if let Some(dir) = self.path.parent().filter(|d| !d.as_os_str().is_empty()) {
            fs::create_dir_all(dir).with_context(|| format!("creating {}", dir.display()))?;
        }
        let mut buf = String::new();
        for ev in events {
            buf.push_str(&serde_json::to_string(ev)?);
            buf.push('\n');
        }
        let mut f = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .with_context(|| format!("opening {}", self.path.display()))?;
        f.write_all(buf.as_bytes())
            .with_context(|| format!("appending to {}", self.path.display()))?;
        Ok(())
    }

    /// Blank lines are not records. Unparseable lines are skipped with a
    /// warning but still count towards the cursor.
    fn read_since(&self, cursor: usize) -> Result<(Vec<RawEvent>, usize)> {
        let content = match fs::read_to_string(&self.path) {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok((Vec::new(), cursor)),
            Err(e) => return Err(e).with_context(|| format!("reading {}", self.path.display())),
        };

        let mut out = Vec::new();
        let mut records = 0usize;
        for (lineno, line) in content.lines().enumerate() {
            if line.trim().is_empty() {
                continue;
            }
            records += 1;
            if records <= cursor {
                continue;
            }
            match serde_json::from_str::<RawEvent>(line) {
                Ok(ev) => out.push(ev),
                Err(e) => tracing::warn!(
                    path = %self.path.display(),
                    line = lineno + 1,
                    error = %e,
                    "skipping unparseable event"
                ),
            }
        }
        Ok((out, records.max(cursor)))
    }
}

#[derive(Debug, Default)]
pub struct MemoryEventLog {
    inner: Mutex<Vec<RawEvent>>,
}

impl MemoryEventLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.inner.lock().map(|v| v.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn snapshot(&self) -> Vec<RawEvent> {
        self.inner.lock().map(|v| v.clone()).unwrap_or_default()
    }
}

impl EventLog for MemoryEventLog {
    fn append(&self, events: &[RawEvent]) -> Result<()> {
        let mut v = self
            .inner
            .lock()
            .map_err(|_| anyhow!("event log mutex poisoned"))?;
        v.extend_from_slice(events);
        Ok(())
    }

    fn read_since(&self, cursor: usize) -> Result<(Vec<RawEvent>, usize)> {
        let v = self
            .inner
            .lock()
            .map_err(|_| anyhow!("event log mutex poisoned"))?;
        let start = cursor.min(v.len());
        Ok((v[start..].to_vec(), v.len().max(cursor)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn listing(company: &str) -> CanonicalListing {
        let l = crate::listing::RawListing::new("test", company, "ML Engineer");
        let (mut out, _) = crate::dedup::merge(vec![l]);
        out.remove(0)
    }

    #[test]
    fn envelope_has_v1_shape() {
        let ev = opportunity_discovered(listing("Acme")).into_raw().unwrap();
        let v = serde_json::to_value(&ev).unwrap();
        assert_eq!(v["event_type"], "OpportunityDiscovered");
        assert_eq!(v["version"], "v1");
        assert_eq!(v["context"], "DISC");
        assert_eq!(v["payload"]["company"], "Acme");
        assert_eq!(v["payload"]["sources"][0], "test");
        assert!(v["payload"]["salary_range"].is_null());

        let back: CanonicalListing = ev.decode().unwrap();
        assert_eq!(back.company, "Acme");
    }

    #[test]
    fn jsonl_cursor_skips_bad_lines_but_counts_them() {
        let dir = tempfile::tempdir().unwrap();
        let log = JsonlEventLog::new(dir.path().join("events.jsonl"));

        let (none, c0) = log.read_since(0).unwrap();
        assert!(none.is_empty());
        assert_eq!(c0, 0);

        log.append(&[opportunity_discovered(listing("A")).into_raw().unwrap()])
            .unwrap();
        {
            let mut f = OpenOptions::new().append(true).open(log.path()).unwrap();
            writeln!(f, "{{not json").unwrap();
        }
        log.append(&[opportunity_discovered(listing("B")).into_raw().unwrap()])
            .unwrap();

        let (all, c1) = log.read_since(0).unwrap();
        assert_eq!(all.len(), 2);
        assert_eq!(c1, 3);

        let (tail, c2) = log.read_since(1).unwrap();
        assert_eq!(tail.len(), 1);
        assert_eq!(tail[0].payload["company"], "B");
        assert_eq!(c2, 3);

        let (nothing, c3) = log.read_since(c2).unwrap();
        assert!(nothing.is_empty());
        assert_eq!(c3, 3);
    }

    #[test]
    fn memory_log_cursor() {
        let log = MemoryEventLog::new();
        log.append(&[opportunity_discovered(listing("A")).into_raw().unwrap()])
            .unwrap();
        let (evs, c) = log.read_since(0).unwrap();
        assert_eq!((evs.len(), c), (1, 1));
        let (evs, c) = log.read_since(c).unwrap();
        assert_eq!((evs.len(), c), (0, 1));
    }
}
