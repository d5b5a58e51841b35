// src/dedup.rs
//! Cross-source deduplication: fingerprinting, field merge and the
//! cross-run seen-set.

use crate::error::DeduplicationAnomaly;
use crate::listing::{CanonicalListing, LocationType, RawListing, SalaryRange, Seniority};
use anyhow::{Context, Result};
use fs2::FileExt;
use metrics::{counter, describe_counter};
use once_cell::sync::OnceCell;
use sha2::{Digest, Sha256};
use std::collections::{BTreeSet, HashMap, HashSet};
use std::fs;
use std::path::{Path, PathBuf};

fn ensure_metrics_described() {
    static ONCE: OnceCell<()> = OnceCell::new();
    ONCE.get_or_init(|| {
        describe_counter!("dedup_merged_total", "Raw listings folded into an existing canonical listing.");
        describe_counter!("dedup_anomalies_total", "Conflicting field values seen during merge.");
    });
}

/// Case-fold, turn punctuation into spaces, collapse whitespace, trim.
pub fn normalize_key_part(s: &str) -> String {
    let folded: String = s
        .to_lowercase()
        .chars()
        .map(|c| if c.is_alphanumeric() { c } else { ' ' })
        .collect();
    folded.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// `"{company}::{role}"` over the normalized parts.
pub fn fingerprint(company: &str, role: &str) -> String {
    format!("{}::{}", normalize_key_part(company), normalize_key_part(role))
}

/// First 16 bytes of SHA-256 over the fingerprint key, hex encoded.
pub fn listing_id(company: &str, role: &str) -> String {
    let digest = Sha256::digest(fingerprint(company, role).as_bytes());
    let mut out = String::with_capacity(32);
    for b in digest.iter().take(16) {
        use std::fmt::Write as _;
        let _ = write!(&mut out, "{:02x}", b);
    }
    out
}

#[derive(Debug, Clone, Default)]
pub struct DedupReport {
    /// Raw listings in.
    pub input: usize,
    /// Canonical listings out.
    pub unique: usize,
    pub anomalies: Vec<DeduplicationAnomaly>,
}

/// Merge a raw batch into canonical listings, in first-arrival order.
pub fn merge(raw: Vec<RawListing>) -> (Vec<CanonicalListing>, DedupReport) {
    ensure_metrics_described();
    let mut report = DedupReport {
        input: raw.len(),
        ..Default::default()
    };

    let mut by_id: HashMap<String, usize> = HashMap::new();
    let mut out: Vec<CanonicalListing> = Vec::new();
    for r in raw {
        let id = listing_id(&r.company, &r.role);
        match by_id.get(&id) {
            Some(&idx) => {
                counter!("dedup_merged_total").increment(1);
                merge_into(&mut out[idx], r, &mut report.anomalies);
            }
            None => {
                by_id.insert(id.clone(), out.len());
                out.push(canonical_from(id, r));
            }
        }
    }

    for a in &report.anomalies {
        tracing::warn!(
            target: "dedup",
            listing_id = %a.listing_id,
            field = a.field,
            kept = %a.kept,
            incoming = %a.incoming,
            source = %a.source_name,
            "conflicting value, keeping the first"
        );
    }
    counter!("dedup_anomalies_total").increment(report.anomalies.len() as u64);

    report.unique = out.len();
    tracing::info!(
        target: "dedup",
        input = report.input,
        unique = report.unique,
        anomalies = report.anomalies.len(),
        "merge done"
    );
    (out, report)
}

fn canonical_from(listing_id: String, r: RawListing) -> CanonicalListing {
    let mut tech_stack = Vec::new();
    push_tags(&mut tech_stack, r.tech_tags);
    CanonicalListing {
        listing_id,
        company: r.company.trim().to_string(),
        role: r.role.trim().to_string(),
        description: r.description,
        location: r.location,
        salary_range: r.salary.filter(|s| !s.is_empty()),
        tech_stack,
        seniority: r.seniority,
        sources: vec![r.source],
        discovered_at: r.fetched_at,
        url: r.url,
    }
}

/// Case-insensitive set union that keeps the first spelling.
fn push_tags(into: &mut Vec<String>, tags: Vec<String>) {
    let mut seen: HashSet<String> = into.iter().map(|t| t.to_lowercase()).collect();
    for t in tags {
        let t = t.trim().to_string();
        if !t.is_empty() && seen.insert(t.to_lowercase()) {
            into.push(t);
        }
    }
}

fn merge_into(c: &mut CanonicalListing, r: RawListing, anomalies: &mut Vec<DeduplicationAnomaly>) {
    let id = c.listing_id.clone();
    let source = r.source.clone();
    let mut conflict = |field: &'static str, kept: String, incoming: String| {
        anomalies.push(DeduplicationAnomaly {
            listing_id: id.clone(),
            field,
            kept,
            incoming,
            source_name: source.clone(),
        });
    };

    // Descriptions vary between boards; fill only, never flag.
    if c.description.is_empty() {
        c.description = r.description.clone();
    }

    if c.url.is_empty() {
        c.url = r.url.clone();
    } else if !r.url.is_empty() && r.url != c.url {
        conflict("url", c.url.clone(), r.url.clone());
    }

    if c.seniority == Seniority::Unknown {
        c.seniority = r.seniority;
    } else if r.seniority != Seniority::Unknown && r.seniority != c.seniority {
        conflict("seniority", format!("{:?}", c.seniority), format!("{:?}", r.seniority));
    }

    if r.location != c.location {
        conflict("location", location_str(c.location), location_str(r.location));
    }

    match (c.salary_range, r.salary.filter(|s| !s.is_empty())) {
        (None, incoming) => c.salary_range = incoming,
        (Some(kept), Some(incoming)) if kept != incoming => {
            conflict("salary_range", salary_str(&kept), salary_str(&incoming));
        }
        _ => {}
    }

    if r.fetched_at < c.discovered_at {
        c.discovered_at = r.fetched_at;
    }
    push_tags(&mut c.tech_stack, r.tech_tags.clone());
    if !c.sources.contains(&r.source) {
        c.sources.push(r.source.clone());
    }
}

fn location_str(l: LocationType) -> String {
    match l {
        LocationType::Remote => "remote",
        LocationType::Hybrid => "hybrid",
        LocationType::Onsite => "onsite",
    }
    .to_string()
}

fn salary_str(s: &SalaryRange) -> String {
    let fmt = |v: Option<f64>| v.map(|v| format!("{v:.0}")).unwrap_or_else(|| "?".into());
    format!("{}-{} {}", fmt(s.min), fmt(s.max), s.currency)
}

/* ----------------------------
Seen-set
---------------------------- */

/// Ids already published by an earlier run.
pub trait SeenStore: Send + Sync {
    fn contains(&self, listing_id: &str) -> bool;
    fn insert(&mut self, listing_id: &str);
    /// Make inserts durable. No-op for in-memory stores.
    fn persist(&mut self) -> Result<()>;
    fn len(&self) -> usize;
    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[derive(Debug, Default)]
pub struct MemorySeenStore {
    ids: BTreeSet<String>,
}

impl MemorySeenStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl SeenStore for MemorySeenStore {
    fn contains(&self, listing_id: &str) -> bool {
        self.ids.contains(listing_id)
    }
    fn insert(&mut self, listing_id: &str) {
        self.ids.insert(listing_id.to_string());
    }
    fn persist(&mut self) -> Result<()> {
        Ok(())
    }
    fn len(&self) -> usize {
        self.ids.len()
    }
}

/// Seen-set stored as a JSON array of ids. Holds an exclusive advisory lock on
/// `<path>.lock` while open, so a second process on the same file fails fast
/// instead of racing. The OS drops the lock when the holder exits, however it exits.
#[derive(Debug)]
pub struct JsonFileSeenStore {
    path: PathBuf,
    ids: BTreeSet<String>,
    dirty: bool,
    _lock: fs::File,
}

impl JsonFileSeenStore {
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
            fs::create_dir_all(dir).with_context(|| format!("creating {}", dir.display()))?;
        }
        let lock_path = with_suffix(&path, ".lock");
        let lock = fs::OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(&lock_path)
            .with_context(|| format!("opening {}", lock_path.display()))?;
        lock.try_lock_exclusive().with_context(|| {
            format!("seen-set {} is locked by another run ({})", path.display(), lock_path.display())
        })?;

        let ids = match fs::read_to_string(&path) {
            Ok(s) if s.trim().is_empty() => BTreeSet::new(),
            Ok(s) => serde_json::from_str::<Vec<String>>(&s)
                .with_context(|| format!("parsing seen-set {}", path.display()))?
                .into_iter()
                .collect(),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => BTreeSet::new(),
            Err(e) => return Err(e).with_context(|| format!("reading seen-set {}", path.display())),
        };
        tracing::debug!(target: "dedup", path = %path.display(), ids = ids.len(), "seen-set loaded");
        Ok(Self {
            path,
            ids,
            dirty: false,
            _lock: lock,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

fn with_suffix(path: &Path, suffix: &str) -> PathBuf {
    let mut s = path.as_os_str().to_owned();
    s.push(suffix);
    PathBuf::from(s)
}

impl SeenStore for JsonFileSeenStore {
    fn contains(&self, listing_id: &str) -> bool {
        self.ids.contains(listing_id)
    }

    fn insert(&mut self, listing_id: &str) {
        if self.ids.insert(listing_id.to_string()) {
            self.dirty = true;
        }
    }

    /// Write to a temp file next to the target, then rename over it.
    fn persist(&mut self) -> Result<()> {
        if !self.dirty && self.path.exists() {
            return Ok(());
        }
        let tmp = with_suffix(&self.path, ".tmp");
        let body = serde_json::to_string_pretty(&self.ids)?;
        fs::write(&tmp, body).with_context(|| format!("writing {}", tmp.display()))?;
        fs::rename(&tmp, &self.path).with_context(|| format!("replacing {}", self.path.display()))?;
        self.dirty = false;
        Ok(())
    }

    fn len(&self) -> usize {
        self.ids.len()
    }
}
