//! Backup and Retention Tests
//!
//! Tests for guarantees:
//! - Retention keeps exactly min(N, k) artifacts, the k most recent
//! - File-name order and timestamp order agree
//! - A failed or empty dump leaves nothing behind
//!
//! All runs go through the public CLI layer against a scripted executor, so
//! no remote host is needed.

use std::fs;
use std::path::Path;

use chrono::{Duration, TimeZone, Utc};
use dbkeeper::artifact::ArtifactStore;
use dbkeeper::cli::{backup_with, list_with, CliError};
use dbkeeper::clock::SteppingClock;
use dbkeeper::config::Config;
use dbkeeper::errors::{OpsError, Stage};
use dbkeeper::interrupt::InterruptFlag;
use dbkeeper::remote::fake::{FakeExecutor, RemoteCall};
use tempfile::TempDir;

// =============================================================================
// Test Utilities
// =============================================================================

fn config_for(dir: &Path, keep_count: usize) -> Config {
    Config {
        host_alias: "db-prod".to_string(),
        database_name: "shop".to_string(),
        database_user: "shop".to_string(),
        dump_binary_path: "/usr/lib/postgresql/16/bin/pg_dump".to_string(),
        restore_binary_path: "pg_restore".to_string(),
        backup_dir: dir.to_path_buf(),
        artifact_prefix: "shop".to_string(),
        keep_count,
        remote_staging_dir: "/tmp".to_string(),
        ssh_binary: "ssh".to_string(),
        scp_binary: "scp".to_string(),
    }
}

fn nightly_clock() -> SteppingClock {
    SteppingClock::new(
        Utc.with_ymd_and_hms(2026, 3, 1, 2, 30, 0).unwrap(),
        Duration::days(1),
    )
}

fn backup_names(dir: &Path) -> Vec<String> {
    let mut names: Vec<String> = fs::read_dir(dir)
        .unwrap()
        .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
        .filter(|n| n.ends_with(".backup"))
        .collect();
    names.sort();
    names
}

// =============================================================================
// Retention
// =============================================================================

/// Ten nightly runs with keep=7 leave the seven newest; the first three go.
#[test]
fn test_ten_runs_keep_seven_newest() {
    let temp_dir = TempDir::new().unwrap();
    let config = config_for(temp_dir.path(), 7);
    let executor = FakeExecutor::new().with_dump_payload(vec![0x5a; 100]);
    let clock = nightly_clock();
    let interrupt = InterruptFlag::new();

    for _ in 0..10 {
        backup_with(&config, &executor, &clock, &interrupt).unwrap();
    }

    let names = backup_names(temp_dir.path());
    assert_eq!(names.len(), 7);
    assert_eq!(names.first().unwrap(), "shop_20260304_023000.backup");
    assert_eq!(names.last().unwrap(), "shop_20260310_023000.backup");
    for deleted in ["01", "02", "03"] {
        let name = format!("shop_202603{}_023000.backup", deleted);
        assert!(!temp_dir.path().join(&name).exists(), "{} survived", name);
        assert!(!temp_dir.path().join(format!("{}.json", name)).exists());
    }

    let store = ArtifactStore::open(temp_dir.path(), "shop").unwrap();
    let listed = store.list().unwrap();
    assert_eq!(listed.len(), 7);
    assert!(listed.iter().all(|a| a.size_bytes == 100));
    assert_eq!(listed[0].file_name(), "shop_20260310_023000.backup");
    assert_eq!(listed[6].file_name(), "shop_20260304_023000.backup");
    assert!(listed.windows(2).all(|w| w[0].timestamp > w[1].timestamp));
}

/// After each of N runs the store holds min(N, k) artifacts.
#[test]
fn test_store_size_is_min_of_runs_and_keep() {
    for keep in [1, 2, 5] {
        let temp_dir = TempDir::new().unwrap();
        let config = config_for(temp_dir.path(), keep);
        let executor = FakeExecutor::new().with_dump_payload(b"PGDMP".to_vec());
        let clock = nightly_clock();
        let interrupt = InterruptFlag::new();

        for run in 1..=7usize {
            let report = backup_with(&config, &executor, &clock, &interrupt).unwrap();
            assert_eq!(report["retained"], run.min(keep));
            assert_eq!(backup_names(temp_dir.path()).len(), run.min(keep));
        }
    }
}

/// An artifact dated in the future (clock skew) cannot push out the one a run
/// just made, even with keep=1.
#[test]
fn test_future_dated_artifact_does_not_displace_new_backup() {
    let temp_dir = TempDir::new().unwrap();
    fs::write(temp_dir.path().join("shop_20990101_000000.backup"), vec![0x5a; 100]).unwrap();
    let config = config_for(temp_dir.path(), 1);
    let executor = FakeExecutor::new().with_dump_payload(vec![0x5a; 100]);

    let report = backup_with(&config, &executor, &nightly_clock(), &InterruptFlag::new()).unwrap();

    assert_eq!(report["artifact"]["timestamp"], "20260301_023000");
    assert_eq!(report["retained"], 1);
    assert_eq!(report["pruned"][0]["timestamp"], "20990101_000000");
    assert_eq!(backup_names(temp_dir.path()), vec!["shop_20260301_023000.backup"]);
}

/// The report names the new artifact and what retention removed.
#[test]
fn test_backup_report_payload() {
    let temp_dir = TempDir::new().unwrap();
    let config = config_for(temp_dir.path(), 1);
    let executor = FakeExecutor::new().with_dump_payload(b"PGDMP".to_vec());
    let clock = nightly_clock();
    let interrupt = InterruptFlag::new();

    backup_with(&config, &executor, &clock, &interrupt).unwrap();
    let report = backup_with(&config, &executor, &clock, &interrupt).unwrap();

    assert_eq!(report["artifact"]["timestamp"], "20260302_023000");
    assert_eq!(report["artifact"]["size_bytes"], 5);
    assert_eq!(report["pruned"][0]["timestamp"], "20260301_023000");
    assert_eq!(report["sha256"].as_str().unwrap().len(), 64);
}

/// The configured dump binary is what runs remotely.
#[test]
fn test_dump_uses_configured_binary_and_target() {
    let temp_dir = TempDir::new().unwrap();
    let config = config_for(temp_dir.path(), 7);
    let executor = FakeExecutor::new().with_dump_payload(b"PGDMP".to_vec());

    backup_with(&config, &executor, &nightly_clock(), &InterruptFlag::new()).unwrap();

    match &executor.calls()[..] {
        [RemoteCall::Stream { stage, command }] => {
            assert_eq!(*stage, Stage::Dump);
            assert_eq!(command.program(), "/usr/lib/postgresql/16/bin/pg_dump");
            assert!(command.get_args().iter().any(|a| a == "shop"));
        }
        other => panic!("unexpected calls: {:?}", other),
    }
}

// =============================================================================
// Failed dumps
// =============================================================================

/// An empty dump is rejected and leaves no artifact, manifest, or partial.
#[test]
fn test_zero_byte_dump_leaves_nothing() {
    let temp_dir = TempDir::new().unwrap();
    let config = config_for(temp_dir.path(), 7);
    let executor = FakeExecutor::new();

    let err = backup_with(&config, &executor, &nightly_clock(), &InterruptFlag::new()).unwrap_err();

    match err {
        CliError::Ops(ops) => {
            assert!(matches!(ops, OpsError::BackupFailed { .. }));
            assert!(matches!(ops.root_cause(), OpsError::ValidationFailed { .. }));
            assert!(ops.artifact().is_some());
        }
        other => panic!("unexpected error: {:?}", other),
    }
    assert_eq!(fs::read_dir(temp_dir.path()).unwrap().count(), 0);
}

/// A failed dump keeps the earlier artifacts and does not prune.
#[test]
fn test_failed_dump_does_not_touch_existing_artifacts() {
    let temp_dir = TempDir::new().unwrap();
    let config = config_for(temp_dir.path(), 2);
    let clock = nightly_clock();
    let interrupt = InterruptFlag::new();

    let good = FakeExecutor::new().with_dump_payload(b"PGDMP".to_vec());
    backup_with(&config, &good, &clock, &interrupt).unwrap();
    backup_with(&config, &good, &clock, &interrupt).unwrap();
    let before = backup_names(temp_dir.path());

    let broken = FakeExecutor::new().failing(Stage::Dump, 1, "pg_dump: error: connection refused");
    let err = backup_with(&config, &broken, &clock, &interrupt).unwrap_err();

    assert_eq!(err.code_str(), "DBK_BACKUP_FAILED");
    assert!(err.message().contains("connection refused"));
    assert_eq!(backup_names(temp_dir.path()), before);
}

/// Listing shows newest first with name, timestamp and size.
#[test]
fn test_list_payload() {
    let temp_dir = TempDir::new().unwrap();
    let config = config_for(temp_dir.path(), 7);
    let executor = FakeExecutor::new().with_dump_payload(b"PGDMP".to_vec());
    let clock = nightly_clock();
    let interrupt = InterruptFlag::new();
    for _ in 0..3 {
        backup_with(&config, &executor, &clock, &interrupt).unwrap();
    }
    fs::write(temp_dir.path().join("notes.txt"), b"not an artifact").unwrap();

    let listed = list_with(&config).unwrap();
    let artifacts = listed["artifacts"].as_array().unwrap();

    assert_eq!(artifacts.len(), 3);
    assert_eq!(artifacts[0]["file_name"], "shop_20260303_023000.backup");
    assert_eq!(artifacts[0]["timestamp"], "20260303_023000");
    assert_eq!(artifacts[0]["size_bytes"], 5);
    assert_eq!(artifacts[2]["file_name"], "shop_20260301_023000.backup");
}
