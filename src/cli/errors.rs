//! CLI-specific error types
//!
//! Workflow failures arrive as `OpsError` and keep their own codes; the CLI
//! adds usage and terminal I/O failures on top.

use std::fmt;
use std::io;

use crate::errors::OpsError;

/// Exit status for bad invocations, as clap uses.
pub const EXIT_USAGE: i32 = 2;
pub const EXIT_FAILURE: i32 = 1;

/// CLI error
#[derive(Debug)]
pub enum CliError {
    /// Bad invocation; `available` lists artifacts the operator can pick
    Usage {
        message: String,
        available: Vec<String>,
    },
    /// stdin/stdout failure
    Io(String),
    /// Workflow failure
    Ops(OpsError),
}

impl CliError {
    pub fn usage(message: impl Into<String>, available: Vec<String>) -> Self {
        CliError::Usage {
            message: message.into(),
            available,
        }
    }

    /// I/O error
    pub fn io_error(msg: impl Into<String>) -> Self {
        CliError::Io(msg.into())
    }

    /// Get the error code string
    pub fn code_str(&self) -> &'static str {
        match self {
            CliError::Usage { .. } => "DBK_CLI_USAGE",
            CliError::Io(_) => "DBK_CLI_IO",
            CliError::Ops(e) => e.code().as_str(),
        }
    }

    /// Get the error message
    pub fn message(&self) -> String {
        match self {
            CliError::Usage { message, .. } => message.clone(),
            CliError::Io(message) => message.clone(),
            CliError::Ops(e) => e.to_string(),
        }
    }

    /// Artifact names worth showing next to this error.
    pub fn available(&self) -> &[String] {
        match self {
            CliError::Usage { available, .. } => available.as_slice(),
            CliError::Ops(e) => match e.root_cause() {
                OpsError::ArtifactNotFound { available, .. } => available.as_slice(),
                _ => &[],
            },
            CliError::Io(_) => &[],
        }
    }

    pub fn exit_code(&self) -> i32 {
        match self {
            CliError::Usage { .. } => EXIT_USAGE,
            _ => EXIT_FAILURE,
        }
    }
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.code_str(), self.message())
    }
}

impl std::error::Error for CliError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            CliError::Ops(e) => Some(e),
            _ => None,
        }
    }
}

impl From<OpsError> for CliError {
    fn from(e: OpsError) -> Self {
        CliError::Ops(e)
    }
}

impl From<io::Error> for CliError {
    fn from(e: io::Error) -> Self {
        Self::io_error(e.to_string())
    }
}

impl From<serde_json::Error> for CliError {
    fn from(e: serde_json::Error) -> Self {
        Self::io_error(format!("JSON error: {}", e))
    }
}

/// CLI result type
pub type CliResult<T> = Result<T, CliError>;
