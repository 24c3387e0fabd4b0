//! The fixed host/database/credential tuple a run operates against

use serde::Serialize;

use super::command::RemoteCommand;

/// Remote database a backup or restore runs against.
///
/// Built once from configuration and never mutated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RemoteTarget {
    /// SSH host alias (as understood by the local ssh client config)
    pub host_alias: String,
    pub database_name: String,
    pub database_user: String,
    pub dump_binary_path: String,
    pub restore_binary_path: String,
}

impl RemoteTarget {
    /// Custom-format dump of the whole database, written to stdout.
    pub fn dump_command(&self) -> RemoteCommand {
        RemoteCommand::new(&self.dump_binary_path).args([
            "-U",
            self.database_user.as_str(),
            "-d",
            self.database_name.as_str(),
            "-Fc",
        ])
    }

    /// Restore `staged_path` over the target database, dropping existing
    /// objects first.
    pub fn restore_command(&self, staged_path: &str) -> RemoteCommand {
        RemoteCommand::new(&self.restore_binary_path).args([
            "-U",
            self.database_user.as_str(),
            "-d",
            self.database_name.as_str(),
            "--clean",
            "--if-exists",
            staged_path,
        ])
    }

    pub fn remove_command(&self, remote_path: &str) -> RemoteCommand {
        RemoteCommand::new("rm").args(["-f", "--", remote_path])
    }
}
