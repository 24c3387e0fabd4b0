//! CLI module for dbkeeper
//!
//! Provides command-line interface for:
//! - backup: Dump the remote database and apply retention
//! - restore: Restore a chosen artifact after confirmation
//! - list: Show available artifacts

mod args;
mod commands;
mod errors;
mod io;

pub use args::{Cli, Command};
pub use commands::{backup, backup_with, list, list_with, restore, restore_with, run, run_command};
pub use errors::{CliError, CliResult, EXIT_FAILURE, EXIT_USAGE};
pub use io::{write_error, write_response, PromptConfirmation};
