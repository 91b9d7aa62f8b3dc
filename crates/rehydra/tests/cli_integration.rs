//! CLI integration tests for the rehydra command-line interface.
//!
//! Every test runs the binary in a scratch directory with an empty user
//! config directory, so no config from the host machine leaks in.

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

/// A rehydra command isolated from the host's config.
fn rehydra(dir: &TempDir) -> Command {
    let mut cmd = Command::cargo_bin("rehydra").unwrap();
    cmd.current_dir(dir.path())
        .env("REHYDRA_CONFIG_DIR", dir.path().join("user"))
        .env_remove("REHYDRA_CONFIG")
        .env_remove("REHYDRA_LOG_DIR")
        .env_remove("REHYDRA_TTL_MS")
        .env_remove("REHYDRA_SWEEP_EVERY_MS");
    cmd
}

fn simulate_json(dir: &TempDir, args: &[&str]) -> serde_json::Value {
    let output = rehydra(dir)
        .arg("--json")
        .arg("simulate")
        .args(args)
        .output()
        .unwrap();
    assert!(output.status.success(), "simulate failed: {output:?}");
    serde_json::from_slice(&output.stdout).unwrap()
}

fn outcomes(report: &serde_json::Value, pass: usize) -> Vec<String> {
    report["passes"][pass]["fetches"]
        .as_array()
        .unwrap()
        .iter()
        .map(|f| f["outcome"].as_str().unwrap().to_string())
        .collect()
}

// ─────────────────────────────────────────────────────────────────────────────
// Help and Version Tests
// ─────────────────────────────────────────────────────────────────────────────

#[test]
fn test_help_lists_subcommands() {
    let dir = TempDir::new().unwrap();
    rehydra(&dir)
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("simulate"))
        .stdout(predicate::str::contains("config"));
}

#[test]
fn test_version_displays() {
    let dir = TempDir::new().unwrap();
    rehydra(&dir)
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("rehydra"));
}

// ─────────────────────────────────────────────────────────────────────────────
// Simulate Tests
// ─────────────────────────────────────────────────────────────────────────────

#[test]
fn test_simulate_rehydrates_everything() {
    let dir = TempDir::new().unwrap();
    let report = simulate_json(&dir, &["--names", "users,posts,tags"]);

    assert_eq!(report["token_issued"], true);
    assert_eq!(report["cached_entries"], 3);
    assert_eq!(report["passes"][0]["rehydrated"], 3);
    assert_eq!(outcomes(&report, 0), vec!["hit", "hit", "hit"]);
}

#[test]
fn test_simulate_text_output() {
    let dir = TempDir::new().unwrap();
    rehydra(&dir)
        .args(["simulate", "--names", "users"])
        .assert()
        .success()
        .stdout(predicate::str::contains("users"))
        .stdout(predicate::str::contains("hit"));
}

#[test]
fn test_simulate_replay_misses() {
    let dir = TempDir::new().unwrap();
    let report = simulate_json(&dir, &["--names", "users", "--replay"]);

    assert_eq!(outcomes(&report, 0), vec!["hit"]);
    assert_eq!(outcomes(&report, 1), vec!["miss"]);
}

#[test]
fn test_simulate_scope_mismatch_misses() {
    let dir = TempDir::new().unwrap();
    let report = simulate_json(
        &dir,
        &["--names", "post", "--scope", "42", "--connect-scope", "99"],
    );
    assert_eq!(outcomes(&report, 0), vec!["miss"]);
}

#[test]
fn test_simulate_session_mismatch_misses() {
    let dir = TempDir::new().unwrap();
    let report = simulate_json(
        &dir,
        &["--names", "inbox", "--session", "alice", "--connect-session", "bob"],
    );
    assert_eq!(outcomes(&report, 0), vec!["miss"]);
}

#[test]
fn test_simulate_expired_misses() {
    let dir = TempDir::new().unwrap();
    let report = simulate_json(
        &dir,
        &[
            "--names",
            "users",
            "--ttl-ms",
            "50",
            "--sweep-every-ms",
            "10000",
            "--delay-ms",
            "150",
        ],
    );
    assert_eq!(outcomes(&report, 0), vec!["miss"]);
}

#[test]
fn test_simulate_disabled_cache() {
    let dir = TempDir::new().unwrap();
    let report = simulate_json(&dir, &["--names", "users", "--ttl-ms", "0"]);

    assert_eq!(report["token_issued"], false);
    assert_eq!(report["cached_entries"], 0);
    assert_eq!(outcomes(&report, 0), vec!["miss"]);
}

#[test]
fn test_simulate_missing_transport_tolerated() {
    let dir = TempDir::new().unwrap();
    let report = simulate_json(&dir, &["--names", "users", "--no-transport"]);

    assert!(report["passes"][0]["error"].is_string());
    assert_eq!(outcomes(&report, 0), vec!["miss"]);
}

#[test]
fn test_simulate_missing_transport_strict_fails() {
    let dir = TempDir::new().unwrap();
    rehydra(&dir)
        .args(["simulate", "--no-transport", "--strict"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("token"));
}

#[test]
fn test_simulate_ttl_from_env() {
    let dir = TempDir::new().unwrap();
    let output = rehydra(&dir)
        .env("REHYDRA_TTL_MS", "0")
        .args(["--json", "simulate", "--names", "users"])
        .output()
        .unwrap();
    assert!(output.status.success());
    let report: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(report["ttl_ms"], 0);
}

#[test]
fn test_simulate_invalid_session_rejected() {
    let dir = TempDir::new().unwrap();
    rehydra(&dir)
        .args(["simulate", "--session", "not valid!"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Invalid session id"));
}

// ─────────────────────────────────────────────────────────────────────────────
// Config Tests
// ─────────────────────────────────────────────────────────────────────────────

#[test]
fn test_config_init_local_then_show() {
    let dir = TempDir::new().unwrap();
    rehydra(&dir)
        .args(["config", "init", "--local"])
        .assert()
        .success()
        .stdout(predicate::str::contains("rehydra.toml"));
    assert!(dir.path().join("rehydra.toml").is_file());

    rehydra(&dir)
        .args(["config", "show"])
        .assert()
        .success()
        .stdout(predicate::str::contains("ttl_ms = 5000"))
        .stdout(predicate::str::contains("loaded from"));
}

#[test]
fn test_config_init_refuses_overwrite() {
    let dir = TempDir::new().unwrap();
    rehydra(&dir).args(["config", "init", "--local"]).assert().success();
    rehydra(&dir)
        .args(["config", "init", "--local"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("already exists"));
}

#[test]
fn test_project_config_drives_simulate() {
    let dir = TempDir::new().unwrap();
    std::fs::write(dir.path().join("rehydra.toml"), "[cache]\nttl_ms = 0\n").unwrap();

    let report = simulate_json(&dir, &["--names", "users"]);
    assert_eq!(report["ttl_ms"], 0);
    assert_eq!(report["token_issued"], false);
}

#[test]
fn test_explicit_config_file() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("custom.toml");
    std::fs::write(&path, "[cache]\nttl_ms = 1234\n").unwrap();

    rehydra(&dir)
        .arg("--config")
        .arg(&path)
        .args(["--json", "config", "show"])
        .assert()
        .success()
        .stdout(predicate::str::contains("1234"));
}

#[test]
fn test_invalid_config_rejected() {
    let dir = TempDir::new().unwrap();
    std::fs::write(dir.path().join("rehydra.toml"), "[cache]\nsweep_every_ms = 0\n").unwrap();

    rehydra(&dir)
        .args(["config", "show"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("sweep_every_ms"));
}
