//! Integration tests for the convoy binary.
// The cargo_bin function is marked deprecated in favor of cargo_bin! macro,
// but both work correctly. Suppressing until assert_cmd stabilizes the new API.
#![allow(deprecated)]

use assert_cmd::cargo::cargo_bin;
use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;
use tempfile::TempDir;

fn setup_project(hosts: &str) -> TempDir {
    let temp = TempDir::new().unwrap();
    let config = format!(
        "app_name: shop\nsettings:\n  transport: local\n  history_dir: runs\n  retry_delay: 0\nhosts:\n{}",
        hosts
    );
    fs::write(temp.path().join("convoy.yml"), config).unwrap();
    temp
}

fn convoy(temp: &TempDir) -> Command {
    let mut cmd = Command::new(cargo_bin("convoy"));
    cmd.current_dir(temp.path()).env("NO_COLOR", "1");
    cmd
}

const HEALTHY: &str = r#"  web1:
    - name: hello
      forward: "echo hello from ${host}"
  web2:
    - name: hello
      forward: "echo hello from ${host}"
"#;

const ONE_BROKEN: &str = r#"  web1:
    - name: hello
      forward: "echo hello"
  web2:
    - name: prepare
      forward: "echo prepared"
      undo: "echo undone"
    - name: start
      forward: "exit 1"
      critical: true
"#;

#[test]
fn cli_shows_help() -> Result<(), Box<dyn std::error::Error>> {
    let mut cmd = Command::new(cargo_bin("convoy"));
    cmd.arg("--help");
    cmd.assert()
        .success()
        .stdout(predicate::str::contains("per-host rollback"));
    Ok(())
}

#[test]
fn cli_shows_version() -> Result<(), Box<dyn std::error::Error>> {
    let mut cmd = Command::new(cargo_bin("convoy"));
    cmd.arg("--version");
    cmd.assert()
        .success()
        .stdout(predicate::str::contains(env!("CARGO_PKG_VERSION")));
    Ok(())
}

#[test]
fn run_succeeds_on_healthy_hosts() -> Result<(), Box<dyn std::error::Error>> {
    let temp = setup_project(HEALTHY);
    convoy(&temp)
        .arg("run")
        .assert()
        .success()
        .stdout(predicate::str::contains("Outcome: succeeded"));
    Ok(())
}

#[test]
fn no_subcommand_runs() -> Result<(), Box<dyn std::error::Error>> {
    let temp = setup_project(HEALTHY);
    convoy(&temp)
        .assert()
        .success()
        .stdout(predicate::str::contains("Deploying shop to 2 host(s)"));
    Ok(())
}

#[test]
fn partial_failure_exits_one() -> Result<(), Box<dyn std::error::Error>> {
    let temp = setup_project(ONE_BROKEN);
    convoy(&temp)
        .arg("run")
        .assert()
        .code(1)
        .stdout(predicate::str::contains("Outcome: partial"))
        .stdout(predicate::str::contains("rolled back"));
    Ok(())
}

#[test]
fn run_json_reports_every_host() -> Result<(), Box<dyn std::error::Error>> {
    let temp = setup_project(ONE_BROKEN);
    let output = convoy(&temp).args(["run", "--json"]).output()?;
    assert_eq!(output.status.code(), Some(1));

    let json: serde_json::Value = serde_json::from_slice(&output.stdout)?;
    assert_eq!(json["outcome"], "partial");
    assert_eq!(json["hosts"]["web1"]["state"], "succeeded");
    assert_eq!(json["hosts"]["web2"]["state"], "rolled_back");

    let results = json["hosts"]["web2"]["results"].as_array().unwrap();
    let last = results.last().unwrap();
    assert_eq!(last["phase"], "undo");
    assert_eq!(last["step"], "prepare");
    Ok(())
}

#[test]
fn last_shows_recorded_run() -> Result<(), Box<dyn std::error::Error>> {
    let temp = setup_project(ONE_BROKEN);
    convoy(&temp).arg("run").assert().code(1);

    convoy(&temp)
        .arg("last")
        .assert()
        .success()
        .stdout(predicate::str::contains("web2"))
        .stdout(predicate::str::contains("Outcome: partial"));

    convoy(&temp)
        .arg("history")
        .assert()
        .success()
        .stdout(predicate::str::contains("partial"));
    Ok(())
}

#[test]
fn rerun_failed_targets_failed_hosts() -> Result<(), Box<dyn std::error::Error>> {
    let temp = setup_project(ONE_BROKEN);
    convoy(&temp).arg("run").assert().code(1);

    let output = convoy(&temp)
        .args(["run", "--rerun-failed", "--json", "--no-history"])
        .output()?;
    let json: serde_json::Value = serde_json::from_slice(&output.stdout)?;
    let hosts = json["hosts"].as_object().unwrap();
    assert_eq!(hosts.len(), 1);
    assert!(hosts.contains_key("web2"));
    Ok(())
}

#[test]
fn json_survives_history_write_failure() -> Result<(), Box<dyn std::error::Error>> {
    let temp = setup_project(HEALTHY);
    fs::write(temp.path().join("runs"), "not a directory")?;

    let output = convoy(&temp).args(["run", "--json"]).output()?;
    assert!(output.status.success());

    let json: serde_json::Value = serde_json::from_slice(&output.stdout)?;
    assert_eq!(json["outcome"], "succeeded");
    assert!(String::from_utf8(output.stderr)?.contains("Could not record run"));
    Ok(())
}

#[test]
fn rerun_json_without_history_is_empty() -> Result<(), Box<dyn std::error::Error>> {
    let temp = setup_project(HEALTHY);

    let output = convoy(&temp)
        .args(["run", "--rerun-failed", "--json"])
        .output()?;
    assert!(output.status.success());

    let json: serde_json::Value = serde_json::from_slice(&output.stdout)?;
    assert_eq!(json["outcome"], "succeeded");
    assert!(json["hosts"].as_object().unwrap().is_empty());
    assert!(!temp.path().join("runs").exists());
    Ok(())
}

#[test]
fn silent_run_prints_nothing_on_success() -> Result<(), Box<dyn std::error::Error>> {
    let temp = setup_project(HEALTHY);
    convoy(&temp)
        .args(["run", "--silent"])
        .assert()
        .success()
        .stdout(predicate::str::is_empty());
    Ok(())
}

#[test]
fn dry_run_executes_nothing() -> Result<(), Box<dyn std::error::Error>> {
    let temp = setup_project(
        r#"  web1:
    - name: touch
      forward: "touch marker"
"#,
    );
    convoy(&temp)
        .args(["run", "--dry-run"])
        .assert()
        .success()
        .stdout(predicate::str::contains("(dry run)"));
    assert!(!temp.path().join("marker").exists());
    assert!(!temp.path().join("runs").exists());
    Ok(())
}

#[test]
fn plan_shows_resolved_commands() -> Result<(), Box<dyn std::error::Error>> {
    let temp = setup_project(HEALTHY);
    convoy(&temp)
        .args(["plan", "--hosts", "web2"])
        .assert()
        .success()
        .stdout(predicate::str::contains("echo hello from web2"))
        .stdout(predicate::str::contains("web1").not());
    Ok(())
}

#[test]
fn missing_config_exits_two() -> Result<(), Box<dyn std::error::Error>> {
    let temp = TempDir::new()?;
    convoy(&temp)
        .arg("run")
        .assert()
        .code(2)
        .stdout(predicate::str::contains("Configuration not found"));
    Ok(())
}

#[test]
fn unresolved_placeholder_exits_two() -> Result<(), Box<dyn std::error::Error>> {
    let temp = setup_project(
        r#"  web1:
    - name: pull
      forward: "docker pull ${image}"
"#,
    );
    convoy(&temp)
        .arg("run")
        .assert()
        .code(2)
        .stdout(predicate::str::contains("${image}"));
    Ok(())
}

#[test]
fn check_reports_validation_errors() -> Result<(), Box<dyn std::error::Error>> {
    let temp = setup_project(
        r#"  web1:
    plan: missing
"#,
    );
    convoy(&temp)
        .arg("check")
        .assert()
        .code(2)
        .stdout(predicate::str::contains("missing"));
    Ok(())
}

#[test]
fn check_connect_with_local_transport() -> Result<(), Box<dyn std::error::Error>> {
    let temp = setup_project(HEALTHY);
    convoy(&temp)
        .args(["check", "--connect"])
        .assert()
        .success()
        .stdout(predicate::str::contains("web1 reachable"));
    Ok(())
}

#[test]
fn init_then_check() -> Result<(), Box<dyn std::error::Error>> {
    let temp = TempDir::new()?;
    convoy(&temp)
        .args(["init", "--image", "dockertest", "--account", "whazzmaster"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Created convoy.yml"));

    convoy(&temp).arg("check").assert().success();

    convoy(&temp)
        .arg("plan")
        .assert()
        .success()
        .stdout(predicate::str::contains(
            "docker pull whazzmaster/dockertest:latest",
        ));

    convoy(&temp).arg("init").assert().code(1);
    Ok(())
}

#[test]
fn explicit_config_path() -> Result<(), Box<dyn std::error::Error>> {
    let temp = setup_project(HEALTHY);
    fs::write(
        temp.path().join("staging.yml"),
        "settings:\n  transport: local\n  history: false\nhosts:\n  staging1:\n    - name: hi\n      forward: \"echo hi\"\n",
    )?;
    convoy(&temp)
        .args(["plan", "--config", "staging.yml"])
        .assert()
        .success()
        .stdout(predicate::str::contains("staging1"));
    Ok(())
}
