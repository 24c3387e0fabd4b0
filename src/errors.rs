//! Error taxonomy for backup and restore workflows
//!
//! Every error is fatal to the invocation that raised it. Nothing here is
//! retried: a dump or restore that failed half-way is reported with enough
//! context (stage, exit status, stderr excerpt, artifact path) for an operator
//! to diagnose it without re-running.

use std::fmt;
use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Remote step that a process was spawned for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stage {
    /// Remote dump streamed into a local artifact
    Dump,
    /// Copy of the artifact onto the remote host
    Stage,
    /// Remote restore against the target database
    Restore,
    /// Removal of the staged remote copy
    Cleanup,
}

impl Stage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Dump => "dump",
            Stage::Stage => "stage",
            Stage::Restore => "restore",
            Stage::Cleanup => "cleanup",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Stable error codes, printed in command output.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCode {
    Configuration,
    RemoteExecutionFailed,
    ArtifactNotFound,
    ValidationFailed,
    Io,
    BackupFailed,
    PruneIncomplete,
    RestoreFailed,
    Interrupted,
}

impl ErrorCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCode::Configuration => "DBK_CONFIG",
            ErrorCode::RemoteExecutionFailed => "DBK_REMOTE_FAILED",
            ErrorCode::ArtifactNotFound => "DBK_ARTIFACT_NOT_FOUND",
            ErrorCode::ValidationFailed => "DBK_VALIDATION_FAILED",
            ErrorCode::Io => "DBK_IO",
            ErrorCode::BackupFailed => "DBK_BACKUP_FAILED",
            ErrorCode::PruneIncomplete => "DBK_PRUNE_INCOMPLETE",
            ErrorCode::RestoreFailed => "DBK_RESTORE_FAILED",
            ErrorCode::Interrupted => "DBK_INTERRUPTED",
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Error)]
pub enum OpsError {
    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("remote {stage} failed ({}): {stderr_snippet}", describe_exit(.exit_code))]
    RemoteExecutionFailed {
        stage: Stage,
        /// `None` when the process was killed by a signal or never started
        exit_code: Option<i32>,
        stderr_snippet: String,
    },

    #[error("artifact not found: {reference}")]
    ArtifactNotFound {
        reference: String,
        /// File names currently in the store, newest first
        available: Vec<String>,
    },

    #[error("validation failed for {}: {reason}", .path.display())]
    ValidationFailed { path: PathBuf, reason: String },

    #[error("I/O error at {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("backup to {} failed: {cause}", .artifact.display())]
    BackupFailed {
        artifact: PathBuf,
        #[source]
        cause: Box<OpsError>,
    },

    #[error(
        "backup {} succeeded but {} expired artifact(s) could not be deleted",
        .artifact.display(),
        .failed.len()
    )]
    PruneIncomplete {
        artifact: PathBuf,
        failed: Vec<PathBuf>,
    },

    #[error("restore of {} failed: {cause}", .artifact.display())]
    RestoreFailed {
        artifact: PathBuf,
        /// Remote staged copy, if staging had already succeeded
        staged_path: Option<String>,
        #[source]
        cause: Box<OpsError>,
    },

    #[error("interrupted at the {stage} step")]
    Interrupted { stage: Stage },
}

fn describe_exit(code: &Option<i32>) -> String {
    match code {
        Some(code) => format!("exit status {}", code),
        None => "terminated without exit status".to_string(),
    }
}

impl OpsError {
    pub fn io(path: impl Into<PathBuf>, source: io::Error) -> Self {
        OpsError::Io {
            path: path.into(),
            source,
        }
    }

    pub fn validation(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        OpsError::ValidationFailed {
            path: path.into(),
            reason: reason.into(),
        }
    }

    pub fn code(&self) -> ErrorCode {
        match self {
            OpsError::Configuration(_) => ErrorCode::Configuration,
            OpsError::RemoteExecutionFailed { .. } => ErrorCode::RemoteExecutionFailed,
            OpsError::ArtifactNotFound { .. } => ErrorCode::ArtifactNotFound,
            OpsError::ValidationFailed { .. } => ErrorCode::ValidationFailed,
            OpsError::Io { .. } => ErrorCode::Io,
            OpsError::BackupFailed { .. } => ErrorCode::BackupFailed,
            OpsError::PruneIncomplete { .. } => ErrorCode::PruneIncomplete,
            OpsError::RestoreFailed { .. } => ErrorCode::RestoreFailed,
            OpsError::Interrupted { .. } => ErrorCode::Interrupted,
        }
    }

    /// Local artifact this failure left behind or was working on.
    pub fn artifact(&self) -> Option<&PathBuf> {
        match self {
            OpsError::BackupFailed { artifact, .. }
            | OpsError::PruneIncomplete { artifact, .. }
            | OpsError::RestoreFailed { artifact, .. } => Some(artifact),
            _ => None,
        }
    }

    /// Remote staged copy that may need manual removal.
    pub fn staged_path(&self) -> Option<&str> {
        match self {
            OpsError::RestoreFailed { staged_path, .. } => staged_path.as_deref(),
            _ => None,
        }
    }

    /// Innermost error, skipping workflow wrappers.
    pub fn root_cause(&self) -> &OpsError {
        match self {
            OpsError::BackupFailed { cause, .. } | OpsError::RestoreFailed { cause, .. } => {
                cause.root_cause()
            }
            other => other,
        }
    }
}

pub type OpsResult<T> = Result<T, OpsError>;
