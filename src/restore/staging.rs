//! Ephemeral remote copy of an artifact
//!
//! A `StagedCopy` owns one remote file for the duration of a restore. Call
//! `remove` to clean up and observe the result; if the guard is dropped
//! without that (early return, panic) removal is still attempted.

use uuid::Uuid;

use crate::artifact::Artifact;
use crate::errors::{OpsResult, Stage};
use crate::remote::{RemoteExecutor, RemoteTarget};

/// Unique remote path for staging `artifact` under `staging_dir`.
///
/// The artifact's file name is reduced to `[A-Za-z0-9._-]` and suffixed with
/// a random nonce, so concurrent runs never collide and the path is safe on
/// both the ssh and scp command lines.
pub fn staging_path(staging_dir: &str, artifact: &Artifact) -> String {
    let name: String = artifact
        .file_name()
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-') {
                c
            } else {
                '_'
            }
        })
        .collect();
    let name = name.trim_start_matches(['.', '-']);
    let name = if name.is_empty() { "artifact" } else { name };

    format!(
        "{}/{}.{}.restore",
        staging_dir.trim_end_matches('/'),
        name,
        Uuid::new_v4().simple()
    )
}

pub struct StagedCopy<'a> {
    executor: &'a dyn RemoteExecutor,
    target: &'a RemoteTarget,
    remote_path: String,
    armed: bool,
}

impl<'a> StagedCopy<'a> {
    /// Reserve `remote_path` and copy `artifact` there.
    ///
    /// If the copy itself fails the guard is returned alongside the error, so
    /// a partially written remote file is still removed.
    pub fn stage(
        executor: &'a dyn RemoteExecutor,
        target: &'a RemoteTarget,
        artifact: &Artifact,
        remote_path: String,
    ) -> (Self, OpsResult<()>) {
        let guard = Self {
            executor,
            target,
            remote_path,
            armed: true,
        };
        let copied = executor.copy_to_remote(target, &artifact.path, &guard.remote_path);
        (guard, copied)
    }

    pub fn remote_path(&self) -> &str {
        &self.remote_path
    }

    /// Remove the remote file, reporting the outcome.
    pub fn remove(mut self) -> OpsResult<()> {
        self.armed = false;
        self.remove_remote()
    }

    fn remove_remote(&self) -> OpsResult<()> {
        self.executor
            .run(
                self.target,
                &self.target.remove_command(&self.remote_path),
                Stage::Cleanup,
                None,
            )
            .map(|_| ())
    }
}

impl Drop for StagedCopy<'_> {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        if let Err(e) = self.remove_remote() {
            tracing::error!(
                host = %self.target.host_alias,
                staged = %self.remote_path,
                error = %e,
                "could not remove staged copy; remove it manually"
            );
        }
    }
}
