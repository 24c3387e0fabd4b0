//! CLI argument definitions using clap
//!
//! Commands:
//! - dbkeeper backup
//! - dbkeeper restore <artifact> [--yes]
//! - dbkeeper list

use clap::{Parser, Subcommand};
use std::path::PathBuf;

use crate::config::DEFAULT_CONFIG_PATH;
use crate::observability::LogFormat;

/// dbkeeper - rolling dump backups and confirmed restores for one remote database
#[derive(Parser, Debug)]
#[command(name = "dbkeeper")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Path to configuration file
    #[arg(long, global = true, default_value = DEFAULT_CONFIG_PATH)]
    pub config: PathBuf,

    /// Log output format (logs go to stderr)
    #[arg(long, global = true, value_enum, default_value_t = LogFormat::Text)]
    pub log_format: LogFormat,

    /// Override the local artifact directory
    #[arg(long, global = true)]
    pub backup_dir: Option<PathBuf>,

    /// Override how many artifacts retention keeps
    #[arg(long, global = true)]
    pub keep: Option<usize>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Dump the remote database into a new artifact, then apply retention
    Backup,

    /// Restore an artifact onto the remote database
    Restore {
        /// Artifact path, or file name inside the backup directory
        artifact: Option<String>,

        /// Skip the interactive confirmation
        #[arg(long, short = 'y')]
        yes: bool,
    },

    /// List available artifacts, newest first
    List,
}

impl Cli {
    /// Parse command line arguments
    pub fn parse_args() -> Self {
        Cli::parse()
    }
}
