//! Integration tests for CLI commands.
//!
//! Every test runs in its own temporary project directory so that no
//! polsat.toml or summary log leaks between tests.

#![allow(deprecated)] // Command::cargo_bin is deprecated but replacement requires newer assert_cmd

use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;
use tempfile::TempDir;

fn polsat(project: &TempDir) -> Command {
    let mut cmd = Command::cargo_bin("polsat").unwrap();
    cmd.current_dir(project.path())
        .env("RUST_LOG", "error")
        .args(["--no-color", "--project"])
        .arg(project.path());
    cmd
}

const CONFLICT: &str = r#"<?xml version="1.0" encoding="utf-8"?>
<policyFile>
  <policy>
    <rule min="-200" max="200">comparator</rule>
    <desc>in degrees Celsius</desc>
    <attributes>
      <type>temperature</type>
      <vendor>Google</vendor>
      <time>2006-07-16T23:30:30</time>
      <user>user1,user2,user3</user>
    </attributes>
  </policy>
  <policy>
    <rule min="-199" max="199">comparator</rule>
    <desc>in degrees Celsius</desc>
    <attributes>
      <type>temperature</type>
      <vendor>Google</vendor>
      <time>2006-07-23T23:30:30</time>
      <user>user2,user3,user4</user>
    </attributes>
  </policy>
</policyFile>
"#;

// ============================================================================
// Basic Commands
// ============================================================================

#[test]
fn version_command_succeeds() {
    let project = TempDir::new().unwrap();
    polsat(&project)
        .arg("version")
        .assert()
        .success()
        .stdout(predicate::str::contains("polsat"));
}

#[test]
fn help_lists_subcommands() {
    Command::cargo_bin("polsat")
        .unwrap()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("analyze"))
        .stdout(predicate::str::contains("generate"))
        .stdout(predicate::str::contains("config"));
}

#[test]
fn analyze_rejects_unknown_format() {
    let project = TempDir::new().unwrap();
    polsat(&project)
        .args(["analyze", "--format", "yaml"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("invalid value"));
}

// ============================================================================
// Analyze
// ============================================================================

#[test]
fn analyze_reports_resolved_ranges_and_identities() {
    let project = TempDir::new().unwrap();
    let doc = project.path().join("outputPolicy2.xml");
    fs::write(&doc, CONFLICT).unwrap();

    polsat(&project)
        .arg("analyze")
        .arg(&doc)
        .assert()
        .success()
        .stdout(predicate::str::contains("resolvable"))
        .stdout(predicate::str::contains("[-198, 198]"))
        .stdout(predicate::str::contains("{user2, user3}"))
        .stdout(predicate::str::contains("2006-07-23T23:30:31"));

    let summary = fs::read_to_string(project.path().join("summary.csv")).unwrap();
    assert_eq!(summary.lines().count(), 1);
    assert!(summary.trim_end().ends_with(",2"));
}

#[test]
fn analyze_json_output_is_parseable() {
    let project = TempDir::new().unwrap();
    let doc = project.path().join("p1.xml");
    fs::write(&doc, CONFLICT).unwrap();

    let output = polsat(&project)
        .args(["analyze", "--no-summary", "--format", "json"])
        .arg(&doc)
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();

    let json: serde_json::Value = serde_json::from_slice(&output).unwrap();
    let group = &json["files"][0]["groups"][0];
    assert_eq!(json["files"][0]["status"], "analyzed");
    assert_eq!(group["verdict"]["verdict"], "resolvable");
    assert!(!project.path().join("summary.csv").exists());
}

#[test]
fn analyze_continues_past_malformed_documents() {
    let project = TempDir::new().unwrap();
    let dir = project.path().join("policies");
    fs::create_dir(&dir).unwrap();
    fs::write(dir.join("p1.xml"), "<policyFile><policy>").unwrap();
    fs::write(dir.join("p2.xml"), CONFLICT).unwrap();

    polsat(&project)
        .args(["analyze", "--no-summary"])
        .assert()
        .success()
        .stderr(predicate::str::contains("p1.xml"))
        .stdout(predicate::str::contains("p2.xml"));
}

#[test]
fn analyze_missing_path_fails() {
    let project = TempDir::new().unwrap();
    polsat(&project)
        .args(["analyze", "does-not-exist"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("does-not-exist"));
}

// ============================================================================
// Generate
// ============================================================================

#[test]
fn generate_then_analyze() {
    let project = TempDir::new().unwrap();

    polsat(&project)
        .args(["generate", "--from", "1", "--to", "6", "--seed", "7"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Wrote 6 policy documents"));

    let policies = project.path().join("policies");
    assert!(policies.join("outputPolicy6.xml").exists());

    polsat(&project).arg("analyze").assert().success();

    // Documents 4, 5 and 6 repeat a key
    let summary = fs::read_to_string(project.path().join("summary.csv")).unwrap();
    assert_eq!(summary.lines().count(), 3);
}

#[test]
fn generate_rejects_empty_range() {
    let project = TempDir::new().unwrap();
    polsat(&project)
        .args(["generate", "--from", "5", "--to", "2"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Empty policy count range"));
}

// ============================================================================
// Config Commands
// ============================================================================

#[test]
fn config_show_reflects_project_file() {
    let project = TempDir::new().unwrap();
    fs::write(
        project.path().join("polsat.toml"),
        "[analysis]\nfile_extension = \"pol\"\n",
    )
    .unwrap();

    polsat(&project)
        .args(["config", "show", "--format", "toml"])
        .assert()
        .success()
        .stdout(predicate::str::contains("file_extension = \"pol\""));
}

#[test]
fn config_validate_accepts_defaults() {
    let project = TempDir::new().unwrap();
    polsat(&project)
        .args(["config", "validate"])
        .assert()
        .success()
        .stdout(predicate::str::contains("No polsat.toml"))
        .stdout(predicate::str::contains("Configuration is valid"));

    fs::write(project.path().join("polsat.toml"), "[analysis]\nenumeration_limit = 10\n").unwrap();
    polsat(&project)
        .args(["config", "validate"])
        .assert()
        .success()
        .stdout(predicate::str::contains("No polsat.toml").not());
}

#[test]
fn config_validate_rejects_bad_start_time() {
    let project = TempDir::new().unwrap();
    let file = project.path().join("custom.toml");
    fs::write(&file, "[generator]\nstart_time = \"last tuesday\"\n").unwrap();

    polsat(&project)
        .args(["config", "validate", "--file"])
        .arg(&file)
        .assert()
        .failure()
        .stderr(predicate::str::contains("Configuration validation failed"));
}
