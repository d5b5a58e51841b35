// tests/scoring_config.rs
//
// Config resolution and hot reload touch process-wide state (CWD, env),
// so every test here is serial.

use opportunity_scout::scoring::config::{
    self, ENV_SCORING_CONFIG_PATH, DEFAULT_SCORING_CONFIG_PATH,
};
use opportunity_scout::scoring::{start_hot_reload_thread, ENV_SCORING_HOT_RELOAD};
use opportunity_scout::{ScoringEngine, ScoringHandle};
use serial_test::serial;
use std::path::Path;
use std::time::Duration;
use std::{env, fs};

fn weights_toml(remote: f64, fintech: f64) -> String {
    format!(
        "[weights]\nremote_match = {remote}\nai_ml_relevance = 0.30\nseniority_match = 0.15\nsalary_match = 0.10\nfintech_bonus = {fintech}\n"
    )
}

/// Run `f` with the CWD set to a fresh temp dir.
fn in_temp_cwd(f: impl FnOnce(&Path)) {
    let old = env::current_dir().unwrap();
    let tmp = tempfile::tempdir().unwrap();
    env::set_current_dir(tmp.path()).unwrap();
    f(tmp.path());
    env::set_current_dir(old).unwrap();
}

#[test]
#[serial]
fn resolution_order_explicit_env_default_builtin() {
    in_temp_cwd(|dir| {
        env::remove_var(ENV_SCORING_CONFIG_PATH);

        // nothing anywhere -> built-in defaults
        let (cfg, path) = config::load(None).unwrap();
        assert!(path.is_none());
        assert_eq!(cfg.weights.remote_match, 0.40);

        // default file
        fs::create_dir_all(dir.join("config")).unwrap();
        fs::write(DEFAULT_SCORING_CONFIG_PATH, weights_toml(0.35, 0.10)).unwrap();
        let (cfg, path) = config::load(None).unwrap();
        assert_eq!(path.as_deref(), Some(Path::new(DEFAULT_SCORING_CONFIG_PATH)));
        assert_eq!(cfg.weights.remote_match, 0.35);

        // env beats the default file
        let env_path = dir.join("from_env.json");
        fs::write(
            &env_path,
            r#"{"weights": {"remote_match": 0.30, "ai_ml_relevance": 0.30, "seniority_match": 0.15,
                            "salary_match": 0.10, "fintech_bonus": 0.15}}"#,
        )
        .unwrap();
        env::set_var(ENV_SCORING_CONFIG_PATH, &env_path);
        let (cfg, _) = config::load(None).unwrap();
        assert_eq!(cfg.weights.fintech_bonus, 0.15);

        // explicit beats env
        let explicit = dir.join("explicit.toml");
        fs::write(&explicit, weights_toml(0.25, 0.20)).unwrap();
        let (cfg, path) = config::load(Some(&explicit)).unwrap();
        assert_eq!(path.as_deref(), Some(explicit.as_path()));
        assert_eq!(cfg.weights.remote_match, 0.25);

        // env pointing nowhere is an error, not a silent fallback
        env::set_var(ENV_SCORING_CONFIG_PATH, dir.join("missing.toml"));
        let err = config::load(None).unwrap_err();
        assert!(err.to_string().contains(ENV_SCORING_CONFIG_PATH));

        env::remove_var(ENV_SCORING_CONFIG_PATH);
    });
}

#[test]
#[serial]
fn invalid_file_reports_its_path() {
    in_temp_cwd(|dir| {
        let bad = dir.join("bad.toml");
        fs::write(&bad, weights_toml(0.40, 0.0)).unwrap();
        let err = config::load(Some(&bad)).unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("bad.toml"), "{msg}");
        assert!(msg.contains("sum to 1.0"), "{msg}");
    });
}

#[test]
#[serial]
fn hot_reload_swaps_weights_and_survives_bad_edits() {
    let tmp = tempfile::tempdir().unwrap();
    let path = tmp.path().join("scoring.toml");
    fs::write(&path, weights_toml(0.40, 0.05)).unwrap();

    let engine = ScoringEngine::new(config::load_from(&path).unwrap()).unwrap();
    let handle = ScoringHandle::new(engine);

    env::set_var(ENV_SCORING_HOT_RELOAD, "1");
    start_hot_reload_thread(handle.clone(), path.clone());
    env::remove_var(ENV_SCORING_HOT_RELOAD);

    // let the watcher record the initial mtime
    std::thread::sleep(Duration::from_millis(2500));
    fs::write(&path, weights_toml(0.35, 0.10)).unwrap();
    std::thread::sleep(Duration::from_millis(3000));
    let w = handle.weights().unwrap();
    assert_eq!(w.remote_match, 0.35);
    assert_eq!(w.fintech_bonus, 0.10);

    // an invalid edit keeps the last good config
    fs::write(&path, weights_toml(0.90, 0.10)).unwrap();
    std::thread::sleep(Duration::from_millis(3000));
    assert_eq!(handle.weights().unwrap().remote_match, 0.35);
}

#[test]
#[serial]
fn hot_reload_is_off_by_default() {
    let tmp = tempfile::tempdir().unwrap();
    let path = tmp.path().join("scoring.toml");
    fs::write(&path, weights_toml(0.40, 0.05)).unwrap();
    let handle = ScoringHandle::new(ScoringEngine::new(config::load_from(&path).unwrap()).unwrap());

    env::remove_var(ENV_SCORING_HOT_RELOAD);
    start_hot_reload_thread(handle.clone(), path.clone());
    std::thread::sleep(Duration::from_millis(100));
    fs::write(&path, weights_toml(0.35, 0.10)).unwrap();
    std::thread::sleep(Duration::from_millis(2500));
    assert_eq!(handle.weights().unwrap().remote_match, 0.40);
}
