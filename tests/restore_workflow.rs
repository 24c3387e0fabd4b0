//! Restore Workflow Tests
//!
//! Tests for guarantees:
//! - An unknown reference fails before any remote call
//! - Any answer but the exact token is a clean no-op
//! - The staged remote copy is removed whether the restore works or not
//! - A missing reference is a usage error that lists what is available

use std::fs;
use std::path::Path;

use chrono::{Duration, TimeZone, Utc};
use dbkeeper::cli::{backup_with, restore_with, CliError, EXIT_USAGE};
use dbkeeper::clock::SteppingClock;
use dbkeeper::config::Config;
use dbkeeper::errors::{OpsError, Stage};
use dbkeeper::interrupt::InterruptFlag;
use dbkeeper::remote::fake::{FakeExecutor, RemoteCall};
use dbkeeper::restore::{AssumeYes, FixedAnswer};
use tempfile::TempDir;

// =============================================================================
// Test Utilities
// =============================================================================

fn config_for(dir: &Path) -> Config {
    Config {
        host_alias: "db-prod".to_string(),
        database_name: "shop".to_string(),
        database_user: "shop".to_string(),
        dump_binary_path: "pg_dump".to_string(),
        restore_binary_path: "pg_restore".to_string(),
        backup_dir: dir.to_path_buf(),
        artifact_prefix: "shop".to_string(),
        keep_count: 7,
        remote_staging_dir: "/var/tmp/dbkeeper".to_string(),
        ssh_binary: "ssh".to_string(),
        scp_binary: "scp".to_string(),
    }
}

/// Store with two artifacts made by real backup runs (manifests included).
fn seeded_store() -> (TempDir, Config) {
    let temp_dir = TempDir::new().unwrap();
    let config = config_for(temp_dir.path());
    let executor = FakeExecutor::new().with_dump_payload(b"PGDMP seeded".to_vec());
    let clock = SteppingClock::new(
        Utc.with_ymd_and_hms(2026, 5, 1, 3, 0, 0).unwrap(),
        Duration::hours(12),
    );
    for _ in 0..2 {
        backup_with(&config, &executor, &clock, &InterruptFlag::new()).unwrap();
    }
    (temp_dir, config)
}

const NEWEST: &str = "shop_20260501_150000.backup";

fn ops_error(err: CliError) -> OpsError {
    match err {
        CliError::Ops(ops) => ops,
        other => panic!("expected a workflow error, got {:?}", other),
    }
}

// =============================================================================
// Resolution
// =============================================================================

/// `restore missing_file.backup` on an empty store: not found, zero remote calls.
#[test]
fn test_missing_file_on_empty_store() {
    let temp_dir = TempDir::new().unwrap();
    let config = config_for(temp_dir.path());
    let executor = FakeExecutor::new();

    let err = restore_with(
        &config,
        &executor,
        Some("missing_file.backup"),
        &mut AssumeYes,
        &InterruptFlag::new(),
    )
    .unwrap_err();

    assert_ne!(err.exit_code(), 0);
    assert_eq!(err.code_str(), "DBK_ARTIFACT_NOT_FOUND");
    assert!(matches!(ops_error(err), OpsError::ArtifactNotFound { .. }));
    assert_eq!(executor.call_count(), 0);
}

/// A miss lists what could have been meant, newest first.
#[test]
fn test_not_found_lists_available() {
    let (_dir, config) = seeded_store();
    let executor = FakeExecutor::new();

    let err = restore_with(
        &config,
        &executor,
        Some("shop_19990101_000000.backup"),
        &mut AssumeYes,
        &InterruptFlag::new(),
    )
    .unwrap_err();

    assert_eq!(
        err.available(),
        [NEWEST.to_string(), "shop_20260501_030000.backup".to_string()]
    );
    assert_eq!(executor.call_count(), 0);
}

/// No reference at all is a usage error carrying the artifact list.
#[test]
fn test_missing_reference_is_usage_error() {
    let (_dir, config) = seeded_store();
    let executor = FakeExecutor::new();

    let err = restore_with(&config, &executor, None, &mut AssumeYes, &InterruptFlag::new())
        .unwrap_err();

    assert_eq!(err.exit_code(), EXIT_USAGE);
    assert_eq!(err.code_str(), "DBK_CLI_USAGE");
    assert_eq!(err.available().len(), 2);
    assert_eq!(executor.call_count(), 0);
}

/// A literal path outside the backup directory is accepted too.
#[test]
fn test_literal_path_reference() {
    let (_dir, config) = seeded_store();
    let elsewhere = TempDir::new().unwrap();
    let hand_copied = elsewhere.path().join("prod-snapshot.dump");
    fs::write(&hand_copied, b"PGDMP hand copied").unwrap();
    let executor = FakeExecutor::new();

    let data = restore_with(
        &config,
        &executor,
        Some(hand_copied.to_str().unwrap()),
        &mut AssumeYes,
        &InterruptFlag::new(),
    )
    .unwrap();

    assert_eq!(data["outcome"], "restored");
    assert!(data["staged_path"]
        .as_str()
        .unwrap()
        .starts_with("/var/tmp/dbkeeper/prod-snapshot.dump."));
}

// =============================================================================
// Confirmation
// =============================================================================

/// Anything but "yes" leaves both sides untouched and is not an error.
#[test]
fn test_decline_is_a_no_op() {
    let (dir, config) = seeded_store();
    let count_before = fs::read_dir(dir.path()).unwrap().count();

    for answer in ["", "no", "Yes", "y", "yes please"] {
        let executor = FakeExecutor::new();
        let data = restore_with(
            &config,
            &executor,
            Some(NEWEST),
            &mut FixedAnswer(answer.to_string()),
            &InterruptFlag::new(),
        )
        .unwrap();

        assert_eq!(data["outcome"], "declined");
        assert_eq!(executor.call_count(), 0, "answer {:?} reached the host", answer);
    }
    assert_eq!(fs::read_dir(dir.path()).unwrap().count(), count_before);
}

// =============================================================================
// Staged copy cleanup
// =============================================================================

/// Success: stage, restore the staged path, then remove it.
#[test]
fn test_successful_restore_removes_staged_copy() {
    let (dir, config) = seeded_store();
    let executor = FakeExecutor::new();

    let data = restore_with(
        &config,
        &executor,
        Some(NEWEST),
        &mut FixedAnswer("yes\n".to_string()),
        &InterruptFlag::new(),
    )
    .unwrap();

    assert_eq!(data["outcome"], "restored");
    assert_eq!(data["staged_copy_removed"], true);
    let staged = data["staged_path"].as_str().unwrap().to_string();

    let calls = executor.calls();
    assert_eq!(calls.len(), 3);
    match &calls[0] {
        RemoteCall::Copy { local, remote_path } => {
            assert_eq!(local.file_name().unwrap(), NEWEST);
            assert_eq!(remote_path, &staged);
        }
        other => panic!("unexpected first call: {:?}", other),
    }
    match &calls[1] {
        RemoteCall::Run { stage, command, .. } => {
            assert_eq!(*stage, Stage::Restore);
            assert_eq!(command.program(), "pg_restore");
            assert_eq!(command.get_args().last().unwrap(), &staged);
        }
        other => panic!("unexpected second call: {:?}", other),
    }
    assert_eq!(calls[2].stage(), Stage::Cleanup);
    assert!(executor.remote_files().is_empty());

    // Restore never modifies local artifacts.
    assert!(dir.path().join(NEWEST).exists());
}

/// Failure: the staged copy is still removed and the error names it.
#[test]
fn test_failed_restore_removes_staged_copy() {
    let (_dir, config) = seeded_store();
    let executor =
        FakeExecutor::new().failing(Stage::Restore, 1, "pg_restore: error: could not execute query");

    let err = restore_with(
        &config,
        &executor,
        Some(NEWEST),
        &mut AssumeYes,
        &InterruptFlag::new(),
    )
    .unwrap_err();

    assert_eq!(err.code_str(), "DBK_RESTORE_FAILED");
    assert!(err.message().contains("could not execute query"));
    let ops = ops_error(err);
    assert!(ops.staged_path().unwrap().starts_with("/var/tmp/dbkeeper/"));
    assert!(ops.artifact().unwrap().ends_with(NEWEST));
    assert_eq!(executor.stages(), vec![Stage::Stage, Stage::Restore, Stage::Cleanup]);
    assert!(executor.remote_files().is_empty());
}

/// A tampered artifact is refused before anything is copied.
#[test]
fn test_tampered_artifact_refused() {
    let (dir, config) = seeded_store();
    fs::write(dir.path().join(NEWEST), b"PGDMP not the same").unwrap();
    let executor = FakeExecutor::new();

    let err = restore_with(&config, &executor, Some(NEWEST), &mut AssumeYes, &InterruptFlag::new())
        .unwrap_err();

    assert_eq!(err.code_str(), "DBK_VALIDATION_FAILED");
    assert_eq!(executor.call_count(), 0);
}
