// src/ingest/config.rs
use anyhow::{anyhow, Context, Result};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const ENV_SOURCES_CONFIG_PATH: &str = "SOURCES_CONFIG_PATH";
pub const DEFAULT_SOURCES_CONFIG_PATH: &str = "config/sources.toml";

/// Per-source switch. Unknown source names are kept so the registry can warn about them.
#[derive(Debug, Clone, Default, Deserialize, PartialEq, Eq)]
pub struct SourceEntry {
    #[serde(default)]
    pub enabled: bool,
    /// Override of the adapter's default endpoint.
    #[serde(default)]
    pub url: Option<String>,
}

#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct ScanSettings {
    #[serde(default = "default_max_concurrency")]
    pub max_concurrency: usize,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_max_concurrency() -> usize {
    4
}
fn default_timeout_secs() -> u64 {
    30
}

impl Default for ScanSettings {
    fn default() -> Self {
        Self {
            max_concurrency: default_max_concurrency(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

impl ScanSettings {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs.max(1))
    }
}

#[derive(Debug, Clone, Default, Deserialize, PartialEq, Eq)]
pub struct SourcesConfig {
    #[serde(default)]
    pub scan: ScanSettings,
    /// Ordered by name; scan order (and merge precedence) follows this order.
    #[serde(default)]
    pub sources: BTreeMap<String, SourceEntry>,
}

impl SourcesConfig {
    pub fn enabled(&self) -> impl Iterator<Item = (&str, &SourceEntry)> {
        self.sources
            .iter()
            .filter(|(_, e)| e.enabled)
            .map(|(k, e)| (k.as_str(), e))
    }
}

/// Load from an explicit path. TOML or JSON, picked by extension.
pub fn load_sources_from(path: &Path) -> Result<SourcesConfig> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("reading sources config from {}", path.display()))?;
    let ext = path
        .extension()
        .and_then(|s| s.to_str())
        .unwrap_or_default()
        .to_ascii_lowercase();
    parse_sources(&content, &ext).with_context(|| format!("parsing {}", path.display()))
}

/// Load using env var + fallbacks:
/// 1) $SOURCES_CONFIG_PATH
/// 2) config/sources.toml
/// 3) config/sources.json
///
/// With nothing found, every known source is enabled with default settings.
pub fn load_sources_default() -> Result<SourcesConfig> {
    if let Ok(p) = std::env::var(ENV_SOURCES_CONFIG_PATH) {
        let pb = PathBuf::from(p);
        if pb.exists() {
            return load_sources_from(&pb);
        } else {
            return Err(anyhow!("SOURCES_CONFIG_PATH points to non-existent path"));
        }
    }
    let toml_p = PathBuf::from(DEFAULT_SOURCES_CONFIG_PATH);
    if toml_p.exists() {
        return load_sources_from(&toml_p);
    }
    let json_p = PathBuf::from("config/sources.json");
    if json_p.exists() {
        return load_sources_from(&json_p);
    }
    Ok(all_enabled())
}

fn all_enabled() -> SourcesConfig {
    let sources = crate::ingest::providers::KNOWN_SOURCES
        .iter()
        .map(|name| {
            (
                name.to_string(),
                SourceEntry {
                    enabled: true,
                    url: None,
                },
            )
        })
        .collect();
    SourcesConfig {
        scan: ScanSettings::default(),
        sources,
    }
}

fn parse_sources(s: &str, hint_ext: &str) -> Result<SourcesConfig> {
    let cfg: SourcesConfig = if hint_ext == "json" {
        serde_json::from_str(s)?
    } else {
        toml::from_str(s)?
    };
    if cfg.scan.max_concurrency == 0 {
        return Err(anyhow!("scan.max_concurrency must be at least 1"));
    }
    Ok(cfg)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::{env, fs};

    #[test]
    fn toml_and_json_formats_work() {
        let toml = r#"
[scan]
max_concurrency = 2

[sources.hn_algolia]
enabled = true

[sources.aijobs_uk]
enabled = false
"#;
        let cfg = parse_sources(toml, "toml").unwrap();
        assert_eq!(cfg.scan.max_concurrency, 2);
        assert_eq!(cfg.scan.timeout_secs, 30);
        let on: Vec<_> = cfg.enabled().map(|(n, _)| n).collect();
        assert_eq!(on, vec!["hn_algolia"]);

        let json = r#"{"sources": {"working_nomads": {"enabled": true, "url": "http://x"}}}"#;
        let cfg = parse_sources(json, "json").unwrap();
        assert_eq!(
            cfg.sources["working_nomads"].url.as_deref(),
            Some("http://x")
        );
    }

    #[test]
    fn zero_concurrency_is_rejected() {
        let err = parse_sources("[scan]\nmax_concurrency = 0\n", "toml").unwrap_err();
        assert!(err.to_string().contains("max_concurrency"));
    }

    #[serial_test::serial]
    #[test]
    fn default_uses_env_then_fallbacks() {
        // Isolate CWD so the repo's own config/ is not read
        let old = env::current_dir().unwrap();
        let tmp = tempfile::tempdir().unwrap();
        env::set_current_dir(tmp.path()).unwrap();

        env::remove_var(ENV_SOURCES_CONFIG_PATH);

        // No files -> every known source enabled
        let v = load_sources_default().unwrap();
        assert_eq!(
            v.enabled().count(),
            crate::ingest::providers::KNOWN_SOURCES.len()
        );

        // Env wins
        let p = tmp.path().join("sources.toml");
        fs::write(&p, "[sources.hn_algolia]\nenabled = true\n").unwrap();
        env::set_var(ENV_SOURCES_CONFIG_PATH, p.display().to_string());
        let v2 = load_sources_default().unwrap();
        assert_eq!(v2.enabled().count(), 1);
        env::remove_var(ENV_SOURCES_CONFIG_PATH);

        env::set_current_dir(&old).unwrap();
    }
}
