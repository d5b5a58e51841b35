// tests/ingest_config.rs
use opportunity_scout::ingest::config::{
    load_sources_default, load_sources_from, ENV_SOURCES_CONFIG_PATH,
};
use opportunity_scout::ingest::providers::{build_adapters, KNOWN_SOURCES};
use opportunity_scout::scoring::config::{load_from, ScoringConfig};
use std::path::Path;
use std::{env, fs};

#[test]
fn shipped_configs_load() {
    let root = Path::new(env!("CARGO_MANIFEST_DIR"));

    let sources = load_sources_from(&root.join("config/sources.toml")).unwrap();
    let enabled: Vec<_> = sources.enabled().map(|(n, _)| n).collect();
    let mut known = KNOWN_SOURCES.to_vec();
    known.sort_unstable();
    assert_eq!(enabled, known);

    let adapters = build_adapters(&sources, &reqwest::Client::new());
    assert_eq!(adapters.len(), KNOWN_SOURCES.len());

    // config/scoring.toml spells out the built-in defaults
    let scoring = load_from(&root.join("config/scoring.toml")).unwrap();
    assert_eq!(scoring, ScoringConfig::default());
}

#[test]
fn json_sources_file_with_url_override() {
    let dir = tempfile::tempdir().unwrap();
    let p = dir.path().join("sources.json");
    fs::write(
        &p,
        r#"{"scan": {"timeout_secs": 5},
            "sources": {"weworkremotely_rss": {"enabled": true, "url": "http://localhost:9/feed.rss"},
                        "hn_algolia": {"enabled": false}}}"#,
    )
    .unwrap();
    let cfg = load_sources_from(&p).unwrap();
    assert_eq!(cfg.scan.timeout_secs, 5);
    assert_eq!(cfg.scan.max_concurrency, 4);
    let enabled: Vec<_> = cfg.enabled().map(|(n, e)| (n, e.url.as_deref())).collect();
    assert_eq!(enabled, vec![("weworkremotely_rss", Some("http://localhost:9/feed.rss"))]);
}

#[serial_test::serial]
#[test]
fn env_path_must_exist() {
    env::set_var(ENV_SOURCES_CONFIG_PATH, "/nonexistent/sources.toml");
    let err = load_sources_default().unwrap_err();
    env::remove_var(ENV_SOURCES_CONFIG_PATH);
    assert!(err.to_string().contains(ENV_SOURCES_CONFIG_PATH));
}
