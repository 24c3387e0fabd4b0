//! Remote execution for dbkeeper
//!
//! Everything that touches the remote host goes through `RemoteExecutor`:
//! running a command (capturing stdout, optionally feeding stdin), streaming a
//! command's stdout into a local sink, and copying a local file to the host.
//!
//! `SshExecutor` is the production implementation over the local `ssh`/`scp`
//! clients. `fake::FakeExecutor` is a scripted in-process stand-in.

mod command;
pub mod fake;
pub mod process;
mod ssh;
mod target;

pub use command::{shell_quote, RemoteCommand};
pub use ssh::SshExecutor;
pub use target::RemoteTarget;

use std::io::{Read, Write};
use std::path::Path;

use crate::errors::{OpsResult, Stage};

/// Runs commands on, and copies files to, a remote host.
///
/// Implementations block until the remote side finishes. Failures surface as
/// `OpsError::RemoteExecutionFailed`; none are swallowed.
pub trait RemoteExecutor {
    /// Run `command` on the target host and return its stdout.
    fn run(
        &self,
        target: &RemoteTarget,
        command: &RemoteCommand,
        stage: Stage,
        input: Option<&mut (dyn Read + Send)>,
    ) -> OpsResult<Vec<u8>>;

    /// Run `command` on the target host, streaming stdout into `sink`.
    ///
    /// Returns the number of bytes written.
    fn run_streaming(
        &self,
        target: &RemoteTarget,
        command: &RemoteCommand,
        stage: Stage,
        sink: &mut dyn Write,
    ) -> OpsResult<u64>;

    /// Copy `local` to `remote_path` on the target host.
    fn copy_to_remote(
        &self,
        target: &RemoteTarget,
        local: &Path,
        remote_path: &str,
    ) -> OpsResult<()>;
}
