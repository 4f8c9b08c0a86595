//! End-to-end tests for the stackflow binary.
//!
//! Successful runs use `--dry-run`, so no engine or git binary is needed.

use std::fs;
use std::path::Path;
use std::process::{Command, Output};

use tempfile::TempDir;

const CONFIG: &str = r#"
region: us-west-2
organization: acme
stackName: dev
baseProject:
  location: ./base
  name: base
platformProject:
  location: ./platform
  name: platform
  nickname: Platform
dataProject:
  location: ./data
  name: data
appProject:
  location: ./app
  name: app
"#;

fn stackflow(dir: &Path, args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_stackflow"))
        .args(args)
        .current_dir(dir)
        .env_remove("STACKFLOW_CONFIG")
        .env_remove("RUST_LOG")
        .output()
        .unwrap()
}

fn workspace(config: &str) -> TempDir {
    let dir = TempDir::new().unwrap();
    fs::write(dir.path().join("config.yaml"), config).unwrap();
    dir
}

fn stdout(output: &Output) -> String {
    String::from_utf8_lossy(&output.stdout).to_string()
}

fn stderr(output: &Output) -> String {
    String::from_utf8_lossy(&output.stderr).to_string()
}

fn position(haystack: &str, needle: &str) -> usize {
    haystack
        .find(needle)
        .unwrap_or_else(|| panic!("missing {:?} in output:\n{}", needle, haystack))
}

#[test]
fn test_missing_config_fails() {
    let dir = TempDir::new().unwrap();
    let output = stackflow(dir.path(), &["--dry-run"]);

    assert_eq!(output.status.code(), Some(1));
    let err = stderr(&output);
    assert!(err.contains("Error reading configuration file"));
    assert_eq!(err.matches("(os error 2)").count(), 1, "stderr: {}", err);
    assert!(!stdout(&output).contains("stack"));
}

#[test]
fn test_malformed_config_fails() {
    let dir = workspace("region: [unterminated\n");
    let output = stackflow(dir.path(), &["--dry-run"]);

    assert_eq!(output.status.code(), Some(1));
    assert!(stderr(&output).contains("Error parsing configuration information"));
}

#[test]
fn test_missing_stack_name_fails_before_any_stack_operation() {
    let dir = workspace(&CONFIG.replace("stackName: dev\n", ""));
    let output = stackflow(dir.path(), &["--dry-run"]);

    assert_eq!(output.status.code(), Some(1));
    assert!(stderr(&output).contains("stackName"));
    assert!(!stdout(&output).contains("Successfully created/selected"));
}

#[test]
fn test_apply_dry_run_orders_stacks() {
    let dir = workspace(CONFIG);
    let logs = dir.path().join("logs");
    let output = stackflow(
        dir.path(),
        &["--dry-run", "--log-dir", logs.to_str().unwrap()],
    );

    assert_eq!(output.status.code(), Some(0), "stderr: {}", stderr(&output));
    let out = stdout(&output);

    let setup_app = position(&out, "Successfully created/selected app stack");
    let first_refresh = position(&out, "Starting refresh of base stack");
    assert!(position(&out, "Successfully created/selected base stack") < setup_app);
    assert!(setup_app < first_refresh);
    assert!(position(&out, "Successfully updated base stack")
        < position(&out, "Starting refresh of Platform stack"));
    assert!(position(&out, "Successfully updated data stack")
        < position(&out, "Starting refresh of app stack"));
    assert!(stderr(&output).contains("config set aws:region us-west-2 --stack acme/base/dev"));
    assert!(out.contains("up --yes --skip-preview --non-interactive --stack acme/app/dev"));
    assert!(!out.contains("Destroying"));

    assert_eq!(fs::read_dir(&logs).unwrap().count(), 8);
}

#[test]
fn test_destroy_dry_run_reverses_order_and_writes_report() {
    let dir = workspace(CONFIG);
    let output = stackflow(
        dir.path(),
        &["destroy", "--dry-run", "--report", "out/report.json"],
    );

    assert_eq!(output.status.code(), Some(0), "stderr: {}", stderr(&output));
    let out = stdout(&output);

    assert!(position(&out, "Destroying app stack") < position(&out, "Destroying data stack"));
    assert!(position(&out, "Destroying data stack") < position(&out, "Destroying Platform stack"));
    assert!(position(&out, "Destroying Platform stack") < position(&out, "Destroying base stack"));
    assert!(!out.contains("Starting refresh"));
    assert!(!out.contains("Starting update"));

    let report: serde_json::Value = serde_json::from_str(
        &fs::read_to_string(dir.path().join("out/report.json")).unwrap(),
    )
    .unwrap();
    assert_eq!(report["mode"], "destroy");
    let destroyed: Vec<&str> = report["operations"]
        .as_array()
        .unwrap()
        .iter()
        .filter(|op| op["operation"] == "destroy")
        .map(|op| op["nickname"].as_str().unwrap())
        .collect();
    assert_eq!(destroyed, vec!["app", "data", "Platform", "base"]);
}

#[test]
fn test_config_path_from_environment() {
    let dir = TempDir::new().unwrap();
    let envs = dir.path().join("envs");
    fs::create_dir(&envs).unwrap();
    fs::write(envs.join("dev.yaml"), CONFIG).unwrap();

    let output = Command::new(env!("CARGO_BIN_EXE_stackflow"))
        .arg("--dry-run")
        .current_dir(dir.path())
        .env("STACKFLOW_CONFIG", envs.join("dev.yaml"))
        .env_remove("RUST_LOG")
        .output()
        .unwrap();

    assert_eq!(output.status.code(), Some(0), "stderr: {}", stderr(&output));
    assert!(stdout(&output).contains("Successfully updated app stack"));
}

#[test]
fn test_unknown_mode_applies() {
    let dir = workspace(CONFIG);
    let output = stackflow(dir.path(), &["up", "--dry-run"]);

    assert_eq!(output.status.code(), Some(0));
    assert!(stdout(&output).contains("Successfully refreshed app stack"));
    assert!(!stdout(&output).contains("Destroying"));
}
