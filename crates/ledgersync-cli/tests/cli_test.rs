//! CLI integration tests using assert_cmd
//!
//! These tests run the binary end-to-end against temporary data directories.

use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;
use std::path::Path;
use tempfile::TempDir;

/// Get a command instance for the ledgersync binary, pointed at `data_dir`
fn ledgersync_cmd(data_dir: &Path) -> Command {
    let mut cmd = Command::cargo_bin("ledgersync").expect("Failed to find ledgersync binary");
    cmd.arg("--data-dir").arg(data_dir).arg("--log-level").arg("error");
    cmd
}

/// Write a store in the older export shape (no Status column, no Meta table)
fn write_export(path: &Path, transactions: i64) {
    let conn = rusqlite::Connection::open(path).unwrap();
    conn.execute_batch(
        r"
        CREATE TABLE Acc_Personal (
          AccID INTEGER NOT NULL PRIMARY KEY,
          RDate TEXT, Name TEXT, Phone TEXT, Fax TEXT, Address TEXT,
          Description TEXT, UAccName TEXT, statusg TEXT,
          UserID INTEGER, CompanyID INTEGER, WName TEXT
        );
        CREATE TABLE AccType (
          AccTypeID INTEGER NOT NULL PRIMARY KEY,
          AccTypeName TEXT, AccTypeNameu TEXT, FLAG TEXT
        );
        CREATE TABLE Transactions_P (
          VoucherNo INTEGER NOT NULL PRIMARY KEY,
          TDate TEXT, AccID INTEGER, AccTypeID INTEGER, Description TEXT,
          DrCents INTEGER, CrCents INTEGER
        );
        INSERT INTO Acc_Personal (AccID, Name) VALUES (1, 'Cash');
        INSERT INTO AccType (AccTypeID, AccTypeName) VALUES (1, 'PKR');
        ",
    )
    .unwrap();
    for i in 1..=transactions {
        conn.execute(
            "INSERT INTO Transactions_P (VoucherNo, TDate, AccID, AccTypeID, DrCents) VALUES (?1, '2024-03-01', 1, 1, ?2)",
            [i, i * 100],
        )
        .unwrap();
    }
}

#[test]
fn test_help_command() {
    let temp = TempDir::new().unwrap();
    ledgersync_cmd(temp.path())
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("atomically replace the local ledger store"));
}

#[test]
fn test_version_command() {
    let temp = TempDir::new().unwrap();
    ledgersync_cmd(temp.path())
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("ledgersync"));
}

#[test]
fn test_sync_help_lists_credentials() {
    let temp = TempDir::new().unwrap();
    ledgersync_cmd(temp.path())
        .args(["sync", "--help"])
        .assert()
        .success()
        .stdout(predicate::str::contains("--email"))
        .stdout(predicate::str::contains("--otp"));
}

#[test]
fn test_init_then_status() {
    let temp = TempDir::new().unwrap();

    ledgersync_cmd(temp.path())
        .arg("init")
        .assert()
        .success()
        .stdout(predicate::str::contains("Initialized empty store"));
    assert!(temp.path().join("live.db").exists());
    assert!(temp.path().join("assets").is_dir());

    let output = ledgersync_cmd(temp.path())
        .args(["status", "--json"])
        .output()
        .unwrap();
    assert!(output.status.success());
    let status: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(status["live"]["exists"], true);
    assert_eq!(status["live"]["counts"]["transactions"], 0);
    assert_eq!(status["live"]["counts"]["meta"], 3);
    assert_eq!(status["backup_present"], false);
}

#[test]
fn test_init_refuses_existing_store() {
    let temp = TempDir::new().unwrap();
    ledgersync_cmd(temp.path()).arg("init").assert().success();

    ledgersync_cmd(temp.path())
        .arg("init")
        .assert()
        .failure()
        .code(1)
        .stderr(predicate::str::contains("Error"));
}

#[test]
fn test_status_without_store() {
    let temp = TempDir::new().unwrap();
    ledgersync_cmd(temp.path())
        .arg("status")
        .assert()
        .success()
        .stdout(predicate::str::contains("No store yet"));
}

#[test]
fn test_import_file_installs_and_normalizes() {
    let temp = TempDir::new().unwrap();
    let data = temp.path().join("data");
    let picked = temp.path().join("export.db");
    write_export(&picked, 5);

    ledgersync_cmd(&data)
        .arg("import-file")
        .arg(&picked)
        .assert()
        .success()
        .stdout(predicate::str::contains("Transactions: 5"))
        .stdout(predicate::str::contains("Transactions_P: added Status"));

    assert!(data.join("live.db").exists());
    assert!(!data.join("incoming.db").exists());
    assert!(!data.join("backup.db").exists());
    assert!(picked.exists());

    ledgersync_cmd(&data)
        .arg("status")
        .assert()
        .success()
        .stdout(predicate::str::contains("Transactions: 5"));
}

#[test]
fn test_import_file_json_summary() {
    let temp = TempDir::new().unwrap();
    let data = temp.path().join("data");
    let picked = temp.path().join("export.db");
    write_export(&picked, 2);
    ledgersync_cmd(&data).arg("init").assert().success();

    let output = ledgersync_cmd(&data)
        .arg("import-file")
        .arg(&picked)
        .arg("--json")
        .output()
        .unwrap();
    assert!(output.status.success());
    let summary: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(summary["replaced_existing"], true);
    assert_eq!(summary["counts"]["transactions"], 2);
}

#[test]
fn test_import_invalid_file_fails_and_keeps_store() {
    let temp = TempDir::new().unwrap();
    let data = temp.path().join("data");
    ledgersync_cmd(&data).arg("init").assert().success();
    let before = fs::read(data.join("live.db")).unwrap();

    let picked = temp.path().join("broken.db");
    fs::write(&picked, vec![0x5Au8; 4096]).unwrap();

    ledgersync_cmd(&data)
        .arg("import-file")
        .arg(&picked)
        .assert()
        .failure()
        .code(1)
        .stderr(predicate::str::contains("VALIDATION_ERROR"));

    assert_eq!(fs::read(data.join("live.db")).unwrap(), before);
}

#[test]
fn test_import_asset_rejects_traversal() {
    let temp = TempDir::new().unwrap();
    ledgersync_cmd(temp.path())
        .args(["import-asset", "../outside.db"])
        .assert()
        .failure()
        .code(1)
        .stderr(predicate::str::contains("INVALID_ASSET"));
}

#[test]
fn test_import_asset_from_assets_dir() {
    let temp = TempDir::new().unwrap();
    let assets = temp.path().join("assets");
    fs::create_dir_all(&assets).unwrap();
    write_export(&assets.join("seed.db"), 3);

    ledgersync_cmd(temp.path())
        .args(["import-asset", "seed.db"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Transactions: 3"));
}

#[test]
fn test_sync_without_endpoint_fails() {
    let temp = TempDir::new().unwrap();
    ledgersync_cmd(temp.path())
        .args(["sync", "--email", "owner@example.com", "--otp", "123456"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("No sync endpoint"));
}

#[test]
fn test_check_reports_needed_normalization() {
    let temp = TempDir::new().unwrap();
    let file = temp.path().join("export.db");
    write_export(&file, 1);

    ledgersync_cmd(temp.path())
        .arg("check")
        .arg(&file)
        .assert()
        .success()
        .stdout(predicate::str::contains("valid"))
        .stdout(predicate::str::contains("Normalization needed"))
        .stdout(predicate::str::contains("Status"));
}

#[test]
fn test_check_rejects_garbage() {
    let temp = TempDir::new().unwrap();
    let file = temp.path().join("garbage.db");
    fs::write(&file, b"definitely not sqlite").unwrap();

    ledgersync_cmd(temp.path())
        .arg("check")
        .arg(&file)
        .assert()
        .failure()
        .code(1)
        .stderr(predicate::str::contains("is not a usable store"));
}

#[test]
fn test_bad_settings_file_fails() {
    let temp = TempDir::new().unwrap();
    let config = temp.path().join("settings.toml");
    fs::write(&config, "sync = 12").unwrap();

    ledgersync_cmd(temp.path())
        .arg("--config")
        .arg(&config)
        .arg("status")
        .assert()
        .failure()
        .stderr(predicate::str::contains("Failed to load settings"));
}
