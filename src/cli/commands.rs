//! CLI command implementations
//!
//! Each command loads the configuration, builds the runtime parts once and
//! hands them to a workflow. The `*_with` variants take those parts
//! explicitly and return the JSON payload instead of printing it.

use std::path::Path;

use clap::CommandFactory;
use serde_json::{json, Value};

use crate::artifact::Artifact;
use crate::backup::BackupOrchestrator;
use crate::clock::{Clock, SystemClock};
use crate::config::{Config, ConfigOverrides};
use crate::interrupt::{CtrlCWatcher, Interrupts};
use crate::observability::init_logging;
use crate::remote::RemoteExecutor;
use crate::restore::{AssumeYes, ConfirmationSource, RestoreOrchestrator};

use super::args::{Cli, Command};
use super::errors::{CliError, CliResult};
use super::io::{write_error, write_response, PromptConfirmation};

/// Parse arguments, run the command, and report the outcome on stdout.
pub fn run() -> CliResult<()> {
    let cli = Cli::parse_args();

    if let Err(e) = init_logging(cli.log_format) {
        eprintln!("warning: logging not initialized: {}", e);
    }

    let result = run_command(&cli);
    if let Err(e) = &result {
        if let Err(write_failure) = write_error(e) {
            tracing::error!(error = %write_failure, "could not write error response");
        }
    }
    result
}

/// Run the appropriate command based on CLI args
pub fn run_command(cli: &Cli) -> CliResult<()> {
    let overrides = ConfigOverrides {
        backup_dir: cli.backup_dir.clone(),
        keep_count: cli.keep,
    };

    match &cli.command {
        Command::Backup => backup(&cli.config, &overrides),
        Command::Restore { artifact, yes } => {
            restore(&cli.config, &overrides, artifact.as_deref(), *yes)
        }
        Command::List => list(&cli.config, &overrides),
    }
}

/// Dump the remote database into a new artifact and apply retention.
pub fn backup(config_path: &Path, overrides: &ConfigOverrides) -> CliResult<()> {
    let config = Config::load(config_path, overrides)?;
    let interrupt = CtrlCWatcher::new();
    let data = backup_with(&config, &config.executor(), &SystemClock, &interrupt)?;
    write_response(data)
}

pub fn backup_with(
    config: &Config,
    executor: &dyn RemoteExecutor,
    clock: &dyn Clock,
    interrupt: &dyn Interrupts,
) -> CliResult<Value> {
    let target = config.remote_target();
    let store = config.open_store()?;
    let policy = config.retention_policy()?;

    tracing::info!(
        host = %target.host_alias,
        database = %target.database_name,
        backup_dir = %store.dir().display(),
        keep = policy.keep_count(),
        "starting backup"
    );

    let report = BackupOrchestrator::new(&target, &store, policy, executor, clock)
        .with_interrupt(interrupt)
        .run()?;

    tracing::info!(
        artifact = %report.artifact.path.display(),
        size_bytes = report.artifact.size_bytes,
        pruned = report.pruned.len(),
        "backup complete"
    );
    Ok(serde_json::to_value(&report)?)
}

/// Restore one artifact after confirmation.
///
/// Without a reference, prints usage and the available artifacts and fails.
pub fn restore(
    config_path: &Path,
    overrides: &ConfigOverrides,
    reference: Option<&str>,
    assume_yes: bool,
) -> CliResult<()> {
    let config = Config::load(config_path, overrides)?;

    if reference.is_none() {
        eprintln!("{}", Cli::command().render_usage());
    }

    let interrupt = CtrlCWatcher::new();
    let data = if assume_yes {
        restore_with(&config, &config.executor(), reference, &mut AssumeYes, &interrupt)?
    } else {
        let mut prompt = PromptConfirmation::terminal();
        restore_with(&config, &config.executor(), reference, &mut prompt, &interrupt)?
    };
    write_response(data)
}

pub fn restore_with(
    config: &Config,
    executor: &dyn RemoteExecutor,
    reference: Option<&str>,
    confirmations: &mut dyn ConfirmationSource,
    interrupt: &dyn Interrupts,
) -> CliResult<Value> {
    let store = config.open_store()?;

    let reference = match reference {
        Some(reference) => reference,
        None => {
            return Err(CliError::usage(
                "restore requires exactly one artifact reference",
                store.available_names(),
            ))
        }
    };

    let target = config.remote_target();
    let outcome = RestoreOrchestrator::new(&target, &store, executor, config.staging_dir())
        .with_interrupt(interrupt)
        .run(reference, confirmations)?;

    Ok(serde_json::to_value(&outcome)?)
}

/// Print the artifacts in the store, newest first.
pub fn list(config_path: &Path, overrides: &ConfigOverrides) -> CliResult<()> {
    let config = Config::load(config_path, overrides)?;
    write_response(list_with(&config)?)
}

pub fn list_with(config: &Config) -> CliResult<Value> {
    let store = config.open_store()?;
    let artifacts = store.list()?;
    Ok(json!({
        "backup_dir": store.dir().display().to_string(),
        "artifacts": artifacts.iter().map(list_entry).collect::<Vec<_>>(),
    }))
}

fn list_entry(artifact: &Artifact) -> Value {
    json!({
        "file_name": artifact.file_name(),
        "path": artifact.path.display().to_string(),
        "timestamp": artifact.timestamp_label(),
        "size_bytes": artifact.size_bytes,
    })
}
