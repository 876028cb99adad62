use std::fs;
use std::path::{Path, PathBuf};

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::tempdir;

fn write_config(root: &Path, prediction: i64) -> PathBuf {
    let yaml = format!(
        r#"
instance: "cli"
channels:
  source: -1001
  prediction: {prediction}
storage:
  snapshot: "{snapshot}"
outbox:
  path: "{outbox}"
"#,
        snapshot = root.join("engine.json").display(),
        outbox = root.join("outbox.jsonl").display(),
    );
    let path = root.join("relay.yaml");
    fs::write(&path, yaml).expect("config written");
    path
}

fn suitcast(config: &Path) -> Command {
    let mut cmd = Command::cargo_bin("suitcast").expect("binary built");
    cmd.arg("--config").arg(config);
    cmd
}

#[test]
fn validate_reports_resolved_paths() {
    let dir = tempdir().expect("temp dir");
    let config = write_config(dir.path(), -1002);
    suitcast(&config)
        .arg("validate")
        .assert()
        .success()
        .stdout(predicate::str::contains("Configuration is valid."))
        .stdout(predicate::str::contains("engine.json"));
}

#[test]
fn invalid_config_fails() {
    let dir = tempdir().expect("temp dir");
    let config = write_config(dir.path(), -1001);
    suitcast(&config)
        .arg("validate")
        .assert()
        .failure()
        .stderr(predicate::str::contains("channels.prediction"));
}

#[test]
fn simulate_then_replay() {
    let dir = tempdir().expect("temp dir");
    let config = write_config(dir.path(), -1002);
    let feed = dir.path().join("feed.jsonl");

    suitcast(&config)
        .args(["simulate", "--games", "40", "--seed", "7", "--out"])
        .arg(&feed)
        .assert()
        .success()
        .stdout(predicate::str::contains("for 40 games"));

    suitcast(&config)
        .arg("replay")
        .arg("--feed")
        .arg(&feed)
        .assert()
        .success()
        .stdout(predicate::str::contains("Replayed"))
        .stdout(predicate::str::contains("0 foreign"));

    assert!(dir.path().join("engine.json").exists());
    suitcast(&config)
        .arg("status")
        .assert()
        .success()
        .stdout(predicate::str::contains("Ledger:"));
}

#[test]
fn inter_switch_persists_between_runs() {
    let dir = tempdir().expect("temp dir");
    let config = write_config(dir.path(), -1002);

    suitcast(&config)
        .args(["inter", "activate"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Regime: STATIC -> INTER"));

    suitcast(&config)
        .arg("status")
        .assert()
        .success()
        .stdout(predicate::str::contains("Regime: INTER"));

    suitcast(&config)
        .args(["inter", "default"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Regime: INTER -> STATIC"));
}

fn write_manual_rules(root: &Path) -> PathBuf {
    let rules = root.join("manual.yaml");
    fs::write(
        &rules,
        r#"
- { trigger: "A♥", suit: "♥", weight: 3 }
- { trigger: "K♦", suit: "♥" }
- { trigger: "K♠", suit: "♠" }
- { trigger: "Q♠", suit: "♠" }
- { trigger: "Q♦", suit: "♦" }
- { trigger: "J♦", suit: "♦" }
- { trigger: "Q♣", suit: "♣" }
- { trigger: "J♣", suit: "♣" }
"#,
    )
    .expect("rules written");
    rules
}

#[test]
fn manual_batch_is_merged() {
    let dir = tempdir().expect("temp dir");
    let config = write_config(dir.path(), -1002);
    let rules = write_manual_rules(dir.path());

    suitcast(&config)
        .arg("manual")
        .arg("--rules")
        .arg(&rules)
        .assert()
        .success()
        .stdout(predicate::str::contains("Merged"))
        .stdout(predicate::str::contains("Regime: INTER"));

    suitcast(&config)
        .arg("status")
        .assert()
        .success()
        .stdout(predicate::str::contains("Manual rules: 8"));
}

#[test]
fn inter_default_survives_restart_with_manual_rules() {
    let dir = tempdir().expect("temp dir");
    let config = write_config(dir.path(), -1002);
    let rules = write_manual_rules(dir.path());

    suitcast(&config)
        .arg("manual")
        .arg("--rules")
        .arg(&rules)
        .assert()
        .success();

    suitcast(&config)
        .args(["inter", "default"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Regime: INTER -> STATIC"));

    suitcast(&config)
        .arg("status")
        .assert()
        .success()
        .stdout(predicate::str::contains("Regime: STATIC"))
        .stdout(predicate::str::contains("Manual rules: 8"));
}

#[test]
fn short_manual_batch_is_rejected() {
    let dir = tempdir().expect("temp dir");
    let config = write_config(dir.path(), -1002);
    let rules = dir.path().join("manual.yaml");
    fs::write(&rules, "- { trigger: \"A♥\", suit: \"♥\" }\n").expect("rules written");

    suitcast(&config)
        .arg("manual")
        .arg("--rules")
        .arg(&rules)
        .assert()
        .failure()
        .stderr(predicate::str::contains("manual batch rejected"));
}

#[test]
fn reset_stock_clears_predictions() {
    let dir = tempdir().expect("temp dir");
    let config = write_config(dir.path(), -1002);
    suitcast(&config)
        .arg("reset-stock")
        .assert()
        .success()
        .stdout(predicate::str::contains("Cleared 0 predictions"));
}
