mod common;

use assert_cmd::cargo_bin;
use common::write_script;
use std::process::Command;
use tempfile::tempdir;

#[test]
fn test_flat_file_persistence_recovery() {
    let dir = tempdir().unwrap();
    let data_dir = dir.path().join("data");

    // 1. First run: fund an account
    let script1 = dir.path().join("first.csv");
    write_script(&script1, &["alice,grant,,100"]);

    let output1 = Command::new(cargo_bin!("vault-economy"))
        .arg(&script1)
        .arg("--data-dir")
        .arg(&data_dir)
        .output()
        .expect("Failed to execute command");
    assert!(output1.status.success());
    assert!(String::from_utf8_lossy(&output1.stdout).contains("alice,100.00"));
    assert!(data_dir.join("balances.csv").exists());

    // 2. Second run: same data directory
    let script2 = dir.path().join("second.csv");
    write_script(&script2, &["alice,grant,,50"]);

    let output2 = Command::new(cargo_bin!("vault-economy"))
        .arg(&script2)
        .arg("--data-dir")
        .arg(&data_dir)
        .output()
        .expect("Failed to execute command");
    assert!(output2.status.success());
    assert!(String::from_utf8_lossy(&output2.stdout).contains("alice,150.00"));
}

#[test]
fn test_pending_charge_survives_restart() {
    let dir = tempdir().unwrap();
    let data_dir = dir.path().join("data");

    let script1 = dir.path().join("first.csv");
    write_script(
        &script1,
        &[
            "alice,give,vault.pay,",
            "alice,charge,bob,",
            "alice,chat,,8",
        ],
    );
    let output1 = Command::new(cargo_bin!("vault-economy"))
        .arg(&script1)
        .arg("--data-dir")
        .arg(&data_dir)
        .output()
        .unwrap();
    assert!(output1.status.success());

    let script2 = dir.path().join("second.csv");
    write_script(&script2, &["bob,join,,"]);
    let output2 = Command::new(cargo_bin!("vault-economy"))
        .arg(&script2)
        .arg("--data-dir")
        .arg(&data_dir)
        .output()
        .unwrap();
    assert!(output2.status.success());
    let stdout = String::from_utf8_lossy(&output2.stdout);
    assert!(stdout.contains("@bob: alice requests 8.00 from you. [/pay alice 8]"));
}

#[cfg(feature = "storage-rocksdb")]
#[test]
fn test_rocksdb_persistence_recovery() {
    let dir = tempdir().unwrap();
    let db_path = dir.path().join("test_db");
    let data_dir = dir.path().join("data");

    let script1 = dir.path().join("first.csv");
    write_script(&script1, &["alice,grant,,100"]);
    let output1 = Command::new(cargo_bin!("vault-economy"))
        .arg(&script1)
        .arg("--db-path")
        .arg(&db_path)
        .arg("--data-dir")
        .arg(&data_dir)
        .output()
        .unwrap();
    assert!(output1.status.success());

    let script2 = dir.path().join("second.csv");
    write_script(&script2, &["alice,grant,,50"]);
    let output2 = Command::new(cargo_bin!("vault-economy"))
        .arg(&script2)
        .arg("--db-path")
        .arg(&db_path)
        .arg("--data-dir")
        .arg(&data_dir)
        .output()
        .unwrap();
    assert!(output2.status.success());
    assert!(String::from_utf8_lossy(&output2.stdout).contains("alice,150.00"));
}
