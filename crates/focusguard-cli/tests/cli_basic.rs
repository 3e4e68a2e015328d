//! Basic CLI E2E tests.
//!
//! Tests invoke the built binary with HOME pointed at a scratch directory so
//! the store, config and rule file live there.

use std::path::Path;
use std::process::Command;

/// Run a CLI command and return (code, stdout, stderr).
fn run_cli(home: &Path, args: &[&str]) -> (i32, String, String) {
    let output = Command::new(env!("CARGO_BIN_EXE_focusguard"))
        .args(args)
        .env("HOME", home)
        .env_remove("FOCUSGUARD_ENV")
        .env_remove("FOCUSGUARD_LOG")
        .env_remove("RUST_LOG")
        .output()
        .expect("Failed to execute CLI command");

    let stdout = String::from_utf8_lossy(&output.stdout).to_string();
    let stderr = String::from_utf8_lossy(&output.stderr).to_string();
    let code = output.status.code().unwrap_or(-1);

    (code, stdout, stderr)
}

fn data_dir(home: &Path) -> std::path::PathBuf {
    home.join(".config").join("focusguard")
}

#[test]
fn test_status_starts_idle() {
    let home = tempfile::tempdir().unwrap();
    let (code, stdout, _) = run_cli(home.path(), &["status", "--json"]);
    assert_eq!(code, 0);
    let view: serde_json::Value = serde_json::from_str(&stdout).unwrap();
    assert_eq!(view["phase"], "IDLE");
    assert_eq!(view["title"], "Ready");
}

#[test]
fn test_start_writes_rules_and_stop_clears_them() {
    let home = tempfile::tempdir().unwrap();
    let (code, stdout, _) = run_cli(home.path(), &["sites", "block", "add", "https://www.Example.com/x"]);
    assert_eq!(code, 0);
    assert!(stdout.contains("added example.com"));

    let (code, _, _) = run_cli(home.path(), &["start"]);
    assert_eq!(code, 0);

    let rules_file = data_dir(home.path()).join("dynamic_rules.json");
    let rules: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(&rules_file).unwrap()).unwrap();
    assert_eq!(rules[0]["condition"]["urlFilter"], "||example.com/");

    let (_, stdout, _) = run_cli(home.path(), &["status", "--json"]);
    let view: serde_json::Value = serde_json::from_str(&stdout).unwrap();
    assert_eq!(view["phase"], "WORK");

    let (code, _, _) = run_cli(home.path(), &["stop"]);
    assert_eq!(code, 0);
    let rules: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(&rules_file).unwrap()).unwrap();
    assert_eq!(rules, serde_json::json!([]));
}

#[test]
fn test_invalid_site_fails() {
    let home = tempfile::tempdir().unwrap();
    let (code, _, stderr) = run_cli(home.path(), &["sites", "block", "add", "not a host"]);
    assert_ne!(code, 0);
    assert!(stderr.contains("Invalid hostname"));
}

#[test]
fn test_task_lifecycle() {
    let home = tempfile::tempdir().unwrap();
    let (code, stdout, _) = run_cli(home.path(), &["task", "add", "Write", "report"]);
    assert_eq!(code, 0);
    assert!(stdout.contains("Task created:"));

    let (_, stdout, _) = run_cli(home.path(), &["task", "list", "--json"]);
    let tasks: serde_json::Value = serde_json::from_str(&stdout).unwrap();
    assert_eq!(tasks[0]["text"], "Write report");
    let id = tasks[0]["id"].as_u64().unwrap().to_string();

    let (code, stdout, _) = run_cli(home.path(), &["task", "done", &id]);
    assert_eq!(code, 0);
    assert!(stdout.contains("completed"));

    let (code, _, _) = run_cli(home.path(), &["task", "rm", &id]);
    assert_eq!(code, 0);
    let (code, _, _) = run_cli(home.path(), &["task", "rm", &id]);
    assert_ne!(code, 0);
}

#[test]
fn test_config_set_and_get() {
    let home = tempfile::tempdir().unwrap();
    let (code, _, _) = run_cli(home.path(), &["config", "set", "daemon.tick_ms", "500"]);
    assert_eq!(code, 0);
    let (_, stdout, _) = run_cli(home.path(), &["config", "get", "daemon.tick_ms"]);
    assert_eq!(stdout.trim(), "500");

    let (code, _, _) = run_cli(home.path(), &["config", "get", "daemon.nope"]);
    assert_ne!(code, 0);
}

#[test]
fn test_settings_reject_zero() {
    let home = tempfile::tempdir().unwrap();
    let (code, _, _) = run_cli(home.path(), &["settings", "set", "workDuration", "0"]);
    assert_ne!(code, 0);
    let (code, _, _) = run_cli(home.path(), &["settings", "set", "workDuration", "45"]);
    assert_eq!(code, 0);
    let (_, stdout, _) = run_cli(home.path(), &["settings", "show", "--json"]);
    let settings: serde_json::Value = serde_json::from_str(&stdout).unwrap();
    assert_eq!(settings["workDuration"], 45);
}
