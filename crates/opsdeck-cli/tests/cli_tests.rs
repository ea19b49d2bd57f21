//! End-to-end CLI tests against a temporary config, database, and object root

use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;
use tempfile::TempDir;

/// Write a complete config pointing every path into the temp dir
fn write_config(dir: &TempDir) {
    let config = format!(
        r#"
[storage]
database_path = "{db}"
object_root = "{objects}"

[backup]
backup_bucket = "database-backups"
diagram_bucket = "workflow-diagrams"
document_bucket = "generated-documents"
diagram_prefixes = ["growth_workflows", "fulfillment_workflows", "team_hierarchy"]
business_plan_prefix = "business-plan"
"#,
        db = dir.path().join("opsdeck.db").display(),
        objects = dir.path().join("objects").display(),
    );
    fs::write(dir.path().join("config.toml"), config).unwrap();
}

fn opsdeck(dir: &TempDir) -> Command {
    let mut cmd = Command::cargo_bin("opsdeck").unwrap();
    cmd.env("OPSDECK_CONFIG_DIR", dir.path());
    cmd
}

#[test]
fn test_doctor_reports_healthy_database() {
    let dir = TempDir::new().unwrap();
    write_config(&dir);

    opsdeck(&dir)
        .arg("doctor")
        .assert()
        .success()
        .stdout(predicate::str::contains("Database: ok"));
}

#[test]
fn test_config_path_points_into_config_dir() {
    let dir = TempDir::new().unwrap();
    write_config(&dir);

    opsdeck(&dir)
        .args(["config", "path"])
        .assert()
        .success()
        .stdout(predicate::str::contains("config.toml"));
}

#[test]
fn test_backup_rejects_unknown_operator() {
    let dir = TempDir::new().unwrap();
    write_config(&dir);

    opsdeck(&dir)
        .args(["backup", "--operator", "nobody"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("no profile found"));
}

#[test]
fn test_restore_requires_operator_flag() {
    let dir = TempDir::new().unwrap();
    write_config(&dir);

    opsdeck(&dir)
        .args(["restore", "2026-01-01/backup-x", "--yes"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("--operator"));
}

#[test]
fn test_audit_empty_trail() {
    let dir = TempDir::new().unwrap();
    write_config(&dir);

    opsdeck(&dir)
        .arg("audit")
        .assert()
        .success()
        .stdout(predicate::str::contains("No audit entries."));
}

#[test]
fn test_backup_json_envelope_on_failure() {
    let dir = TempDir::new().unwrap();
    write_config(&dir);

    opsdeck(&dir)
        .args(["backup", "--operator", "nobody", "--format", "json"])
        .assert()
        .failure()
        .stdout(predicate::str::contains("\"success\": false"))
        .stdout(predicate::str::contains("\"kind\": \"unauthorized\""));
}
