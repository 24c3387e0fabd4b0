//! `RemoteExecutor` over the local OpenSSH client

use std::io::{Read, Write};
use std::path::Path;
use std::process::Command;

use crate::errors::{OpsError, OpsResult, Stage};

use super::command::RemoteCommand;
use super::process::{run_captured, run_streamed};
use super::target::RemoteTarget;
use super::RemoteExecutor;

/// Exit status the OpenSSH client reserves for its own failures
/// (unresolvable host, refused connection, authentication).
const SSH_CLIENT_FAILURE: i32 = 255;

#[derive(Debug, Clone)]
pub struct SshExecutor {
    ssh_binary: String,
    scp_binary: String,
}

impl SshExecutor {
    pub fn new(ssh_binary: impl Into<String>, scp_binary: impl Into<String>) -> Self {
        Self {
            ssh_binary: ssh_binary.into(),
            scp_binary: scp_binary.into(),
        }
    }

    /// `ssh -- <host> <quoted command>`
    pub fn ssh_command(&self, target: &RemoteTarget, command: &RemoteCommand) -> Command {
        let mut cmd = Command::new(&self.ssh_binary);
        cmd.arg("--")
            .arg(&target.host_alias)
            .arg(command.to_shell_string());
        cmd
    }

    /// `scp -q -- <local> <host>:<remote_path>`
    pub fn scp_command(&self, target: &RemoteTarget, local: &Path, remote_path: &str) -> Command {
        let mut cmd = Command::new(&self.scp_binary);
        cmd.arg("-q")
            .arg("--")
            .arg(local)
            .arg(format!("{}:{}", target.host_alias, remote_path));
        cmd
    }
}

impl Default for SshExecutor {
    fn default() -> Self {
        Self::new("ssh", "scp")
    }
}

/// Messages the OpenSSH client itself prints when it never got a session.
const CONNECTION_FAILURE_MARKERS: [&str; 5] = [
    "Could not resolve hostname",
    "Permission denied (",
    "Host key verification failed",
    "Connection closed by",
    "kex_exchange_identification",
];

fn is_connection_failure(stderr: &str) -> bool {
    stderr.lines().any(|line| {
        line.starts_with("ssh: ")
            || CONNECTION_FAILURE_MARKERS
                .iter()
                .any(|marker| line.contains(marker))
    })
}

/// An unreachable host is a configuration problem, not a failed command.
///
/// A remote program may exit 255 on its own, so the status alone is not
/// enough; stderr must also come from the ssh client.
fn classify(target: &RemoteTarget, err: OpsError) -> OpsError {
    match err {
        OpsError::RemoteExecutionFailed {
            exit_code: Some(SSH_CLIENT_FAILURE),
            ref stderr_snippet,
            ..
        } if is_connection_failure(stderr_snippet) => OpsError::Configuration(format!(
            "cannot reach host '{}' (exit status {}): {}",
            target.host_alias, SSH_CLIENT_FAILURE, stderr_snippet
        )),
        other => other,
    }
}

impl RemoteExecutor for SshExecutor {
    fn run(
        &self,
        target: &RemoteTarget,
        command: &RemoteCommand,
        stage: Stage,
        input: Option<&mut (dyn Read + Send)>,
    ) -> OpsResult<Vec<u8>> {
        tracing::debug!(host = %target.host_alias, stage = stage.as_str(), command = %command, "remote run");
        run_captured(self.ssh_command(target, command), stage, input)
            .map_err(|e| classify(target, e))
    }

    fn run_streaming(
        &self,
        target: &RemoteTarget,
        command: &RemoteCommand,
        stage: Stage,
        sink: &mut dyn Write,
    ) -> OpsResult<u64> {
        tracing::debug!(host = %target.host_alias, stage = stage.as_str(), command = %command, "remote stream");
        run_streamed(self.ssh_command(target, command), stage, sink)
            .map_err(|e| classify(target, e))
    }

    fn copy_to_remote(
        &self,
        target: &RemoteTarget,
        local: &Path,
        remote_path: &str,
    ) -> OpsResult<()> {
        tracing::debug!(
            host = %target.host_alias,
            local = %local.display(),
            remote = remote_path,
            "copy to remote"
        );
        run_captured(
            self.scp_command(target, local, remote_path),
            Stage::Stage,
            None,
        )
        .map(|_| ())
        .map_err(|e| classify(target, e))
    }
}
