use assert_cmd::Command;
use predicates::prelude::*;
use serde_json::Value;
use tempfile::tempdir;

fn ct(db: &std::path::Path) -> Command {
    let mut cmd = Command::cargo_bin("ct").unwrap();
    cmd.env("CT_DB_PATH", db);
    cmd.env_remove("CT_CONFIG");
    cmd
}

#[test]
fn test_cli_help() {
    let mut cmd = Command::cargo_bin("ct").unwrap();
    cmd.arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("Usage:"));
}

#[test]
fn test_cli_version() {
    let mut cmd = Command::cargo_bin("ct").unwrap();
    cmd.arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains(env!("CARGO_PKG_VERSION")));
}

#[test]
fn test_init_reports_db_path() {
    let dir = tempdir().unwrap();
    let db = dir.path().join("ct.db");
    ct(&db)
        .arg("init")
        .assert()
        .success()
        .stdout(predicate::str::contains("database ready"));
    assert!(db.exists());
}

fn seed_abc(db: &std::path::Path) {
    ct(db)
        .args(["concept", "add", "--id", "a", "--title", "Basic Vectors"])
        .assert()
        .success();
    ct(db)
        .args([
            "concept", "add", "--id", "b", "--title", "Vector Operations", "--prereq", "a",
        ])
        .assert()
        .success();
    ct(db)
        .args([
            "concept", "add", "--id", "c", "--title", "Matrix Transformations", "--prereq", "a",
            "--prereq", "b",
        ])
        .assert()
        .success();
}

#[test]
fn test_progression_flow() {
    let dir = tempdir().unwrap();
    let db = dir.path().join("ct.db");
    seed_abc(&db);

    // Fresh user: only the root is available.
    let output = ct(&db)
        .args(["--machine", "progress", "available", "--user", "alice"])
        .output()
        .unwrap();
    assert!(output.status.success());
    let json: Value = serde_json::from_slice(&output.stdout).unwrap();
    let ids: Vec<&str> = json["data"]
        .as_array()
        .unwrap()
        .iter()
        .map(|c| c["id"].as_str().unwrap())
        .collect();
    assert_eq!(ids, vec!["a"]);

    // Completing out of order is rejected with the specific code.
    let output = ct(&db)
        .args(["--machine", "progress", "complete", "c", "--user", "alice"])
        .output()
        .unwrap();
    assert!(!output.status.success());
    let json: Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(json["code"], "PREREQUISITES_UNMET");
    assert_eq!(json["numeric_code"], 202);

    ct(&db)
        .args(["progress", "complete", "a", "--user", "alice"])
        .assert()
        .success();
    ct(&db)
        .args(["progress", "start", "b", "--user", "alice"])
        .assert()
        .success();
    ct(&db)
        .args(["progress", "complete", "b", "--user", "alice"])
        .assert()
        .success();

    // Verification marker on a completed concept.
    ct(&db)
        .args([
            "progress", "verify", "a", "--marker", "quiz-17", "--user", "alice",
        ])
        .assert()
        .success();
    ct(&db)
        .args(["progress", "show", "--user", "alice"])
        .assert()
        .success()
        .stdout(predicate::str::contains("quiz-17"));

    let output = ct(&db)
        .args(["--machine", "progress", "available", "--user", "alice"])
        .output()
        .unwrap();
    let json: Value = serde_json::from_slice(&output.stdout).unwrap();
    let ids: Vec<&str> = json["data"]
        .as_array()
        .unwrap()
        .iter()
        .map(|c| c["id"].as_str().unwrap())
        .collect();
    assert_eq!(ids, vec!["c"]);
}

#[test]
fn test_delete_with_dependents_is_rejected() {
    let dir = tempdir().unwrap();
    let db = dir.path().join("ct.db");
    seed_abc(&db);

    let output = ct(&db)
        .args(["--machine", "concept", "rm", "a"])
        .output()
        .unwrap();
    assert!(!output.status.success());
    let json: Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(json["code"], "HAS_DEPENDENTS");
}

#[test]
fn test_cycle_update_is_rejected() {
    let dir = tempdir().unwrap();
    let db = dir.path().join("ct.db");
    seed_abc(&db);
    ct(&db)
        .args(["concept", "add", "--id", "d", "--title", "Eigenvalues", "--prereq", "c"])
        .assert()
        .success();

    let output = ct(&db)
        .args(["--machine", "concept", "update", "c", "--prereq", "d"])
        .output()
        .unwrap();
    assert!(!output.status.success());
    let json: Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(json["code"], "CYCLIC_PREREQUISITE");

    // Both prerequisite sets are unchanged.
    let output = ct(&db)
        .args(["--machine", "concept", "show", "c"])
        .output()
        .unwrap();
    let json: Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(json["data"]["prerequisites"], serde_json::json!(["a", "b"]));
    let output = ct(&db)
        .args(["--machine", "concept", "show", "d"])
        .output()
        .unwrap();
    let json: Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(json["data"]["prerequisites"], serde_json::json!(["c"]));
}

#[test]
fn test_snapshot_export_import_round_trip() {
    let dir = tempdir().unwrap();
    let db = dir.path().join("ct.db");
    seed_abc(&db);
    ct(&db)
        .args(["progress", "complete", "a", "--user", "alice"])
        .assert()
        .success();

    let doc_path = dir.path().join("alice.json");
    ct(&db)
        .args([
            "snapshot", "export", "--user", "alice",
            "-o", doc_path.to_str().unwrap(),
        ])
        .assert()
        .success();

    // Import into a brand-new database.
    let other_db = dir.path().join("other.db");
    ct(&other_db)
        .args([
            "snapshot", "import", doc_path.to_str().unwrap(), "--user", "alice",
        ])
        .assert()
        .success()
        .stdout(predicate::str::contains("imported 3 concepts"));

    let output = ct(&other_db)
        .args(["--machine", "progress", "available", "--user", "alice"])
        .output()
        .unwrap();
    let json: Value = serde_json::from_slice(&output.stdout).unwrap();
    let ids: Vec<&str> = json["data"]
        .as_array()
        .unwrap()
        .iter()
        .map(|c| c["id"].as_str().unwrap())
        .collect();
    assert_eq!(ids, vec!["b"]);
}

#[test]
fn test_import_rejects_tampered_document() {
    let dir = tempdir().unwrap();
    let db = dir.path().join("ct.db");
    seed_abc(&db);

    let doc_path = dir.path().join("alice.json");
    ct(&db)
        .args([
            "snapshot", "export", "--user", "alice",
            "-o", doc_path.to_str().unwrap(),
        ])
        .assert()
        .success();

    let mut doc: Value = serde_json::from_str(&std::fs::read_to_string(&doc_path).unwrap()).unwrap();
    doc["completed"] = serde_json::json!(["ghost"]);
    std::fs::write(&doc_path, serde_json::to_string(&doc).unwrap()).unwrap();

    let output = ct(&db)
        .args([
            "--machine", "snapshot", "import", doc_path.to_str().unwrap(), "--user", "alice",
        ])
        .output()
        .unwrap();
    assert!(!output.status.success());
    let json: Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(json["code"], "SNAPSHOT_INTEGRITY");

    // Nothing was applied.
    let output = ct(&db)
        .args(["--machine", "concept", "list"])
        .output()
        .unwrap();
    let json: Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(json["data"].as_array().unwrap().len(), 3);
}
