//! Backup workflow
//!
//! Produces one new artifact from a remote dump and then applies retention.
//!
//! # States
//!
//! ```text
//! Idle -> DumpInProgress -> Verifying -> Pruning -> Done
//!                 \______________\___________\____-> Failed
//! ```
//!
//! # Algorithm
//!
//! 1. Allocate `<prefix>_<timestamp>.backup` from the current time and
//!    sweep `.partial` files a killed run left behind
//! 2. Stream the remote dump into `<artifact>.partial`, hashing as it goes
//! 3. Reject a failed or empty dump, removing the partial file
//! 4. Rename the partial file into place and write the manifest sidecar
//! 5. Confirm the artifact is listed by the store
//! 6. Delete whatever the retention policy marks as expired, never the
//!    artifact this run just wrote
//!
//! A failed run never leaves a partial or empty artifact behind.

mod sink;

pub use sink::HashingFile;

use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::artifact::{partial_path, Artifact, ArtifactManifest, ArtifactStore};
use crate::clock::Clock;
use crate::errors::{OpsError, OpsResult, Stage};
use crate::interrupt::Interrupts;
use crate::remote::{RemoteExecutor, RemoteTarget};
use crate::retention::{prune_protecting, RetentionPolicy};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackupState {
    Idle,
    DumpInProgress,
    Verifying,
    Pruning,
    Done,
    Failed,
}

impl BackupState {
    pub fn as_str(&self) -> &'static str {
        match self {
            BackupState::Idle => "idle",
            BackupState::DumpInProgress => "dump_in_progress",
            BackupState::Verifying => "verifying",
            BackupState::Pruning => "pruning",
            BackupState::Done => "done",
            BackupState::Failed => "failed",
        }
    }

    pub fn can_transition_to(&self, next: BackupState) -> bool {
        use BackupState::*;
        matches!(
            (self, next),
            (Idle, DumpInProgress)
                | (DumpInProgress, Verifying)
                | (DumpInProgress, Failed)
                | (Verifying, Pruning)
                | (Verifying, Failed)
                | (Pruning, Done)
                | (Pruning, Failed)
        )
    }

    fn advance(&mut self, next: BackupState, artifact: &Path) {
        debug_assert!(
            self.can_transition_to(next),
            "invalid backup transition {} -> {}",
            self.as_str(),
            next.as_str()
        );
        tracing::info!(
            from = self.as_str(),
            to = next.as_str(),
            artifact = %artifact.display(),
            "backup.state"
        );
        *self = next;
    }
}

/// Outcome of a successful backup run.
#[derive(Debug, Clone, Serialize)]
pub struct BackupReport {
    pub artifact: Artifact,
    pub sha256: String,
    pub manifest: PathBuf,
    /// Artifacts deleted by retention, newest first
    pub pruned: Vec<Artifact>,
    /// Artifacts left in the store
    pub retained: usize,
}

pub struct BackupOrchestrator<'a> {
    target: &'a RemoteTarget,
    store: &'a ArtifactStore,
    policy: RetentionPolicy,
    executor: &'a dyn RemoteExecutor,
    clock: &'a dyn Clock,
    interrupt: Option<&'a dyn Interrupts>,
}

impl<'a> BackupOrchestrator<'a> {
    pub fn new(
        target: &'a RemoteTarget,
        store: &'a ArtifactStore,
        policy: RetentionPolicy,
        executor: &'a dyn RemoteExecutor,
        clock: &'a dyn Clock,
    ) -> Self {
        Self {
            target,
            store,
            policy,
            executor,
            clock,
            interrupt: None,
        }
    }

    /// Arm `interrupts` for the run and report a dump that died after an
    /// interrupt as `Interrupted`.
    pub fn with_interrupt(mut self, interrupts: &'a dyn Interrupts) -> Self {
        self.interrupt = Some(interrupts);
        self
    }

    pub fn run(&self) -> OpsResult<BackupReport> {
        let mut state = BackupState::Idle;
        if let Some(interrupts) = self.interrupt {
            interrupts.arm();
        }
        let created_at = self.clock.now();
        let artifact_path = self.store.new_artifact_path(created_at);
        let failed = |cause: OpsError| OpsError::BackupFailed {
            artifact: artifact_path.clone(),
            cause: Box::new(cause),
        };

        state.advance(BackupState::DumpInProgress, &artifact_path);
        let (written, sha256, manifest) = match self.dump(&artifact_path, created_at) {
            Ok(dumped) => dumped,
            Err(cause) => {
                state.advance(BackupState::Failed, &artifact_path);
                tracing::error!(artifact = %artifact_path.display(), error = %cause, "backup failed; no artifact kept");
                if self.interrupt.map_or(false, |i| i.is_set()) {
                    return Err(failed(OpsError::Interrupted { stage: Stage::Dump }));
                }
                return Err(failed(cause));
            }
        };

        state.advance(BackupState::Verifying, &artifact_path);
        let listed = match self.verify_listed(&artifact_path, written) {
            Ok(listed) => listed,
            Err(cause) => {
                state.advance(BackupState::Failed, &artifact_path);
                discard(&[artifact_path.clone(), manifest.clone()]);
                tracing::error!(artifact = %artifact_path.display(), error = %cause, "backup verification failed; artifact removed");
                return Err(failed(cause));
            }
        };
        let artifact = listed
            .iter()
            .find(|a| a.path == artifact_path)
            .cloned()
            .ok_or_else(|| failed(OpsError::validation(&artifact_path, "artifact vanished")))?;

        state.advance(BackupState::Pruning, &artifact_path);
        if let Some(newer) = listed.first().filter(|newest| newest.path != artifact_path) {
            tracing::warn!(
                artifact = %artifact_path.display(),
                newer = %newer.path.display(),
                "store holds artifacts newer than this run (clock skew?); keeping the new artifact anyway"
            );
        }
        let doomed = prune_protecting(&listed, &self.policy, &artifact_path);

        let mut pruned = Vec::new();
        let mut undeletable = Vec::new();
        for expired in doomed {
            match self.store.delete(&expired) {
                Ok(()) => {
                    tracing::info!(artifact = %expired.path.display(), "pruned expired artifact");
                    pruned.push(expired);
                }
                Err(e) => {
                    tracing::error!(artifact = %expired.path.display(), error = %e, "failed to prune artifact");
                    undeletable.push(expired.path);
                }
            }
        }

        if !undeletable.is_empty() {
            state.advance(BackupState::Failed, &artifact_path);
            return Err(OpsError::PruneIncomplete {
                artifact: artifact_path,
                failed: undeletable,
            });
        }

        state.advance(BackupState::Done, &artifact_path);
        Ok(BackupReport {
            retained: listed.len() - pruned.len(),
            artifact,
            sha256,
            manifest,
            pruned,
        })
    }

    /// Stream the dump into place. On error nothing this call created is left
    /// on disk.
    fn dump(
        &self,
        artifact_path: &Path,
        created_at: DateTime<Utc>,
    ) -> OpsResult<(u64, String, PathBuf)> {
        if artifact_path.exists() {
            return Err(OpsError::validation(
                artifact_path,
                "an artifact with this timestamp already exists",
            ));
        }

        if let Err(e) = self.store.sweep_leftovers() {
            tracing::warn!(error = %e, "could not sweep leftovers of earlier runs");
        }

        let partial = partial_path(artifact_path);
        let mut sink = HashingFile::create_new(&partial)?;

        let streamed = self
            .executor
            .run_streaming(
                self.target,
                &self.target.dump_command(),
                Stage::Dump,
                &mut sink,
            )
            .and_then(|_| sink.finish());

        let (written, sha256) = match streamed {
            Ok((0, _)) => {
                discard(&[partial.clone()]);
                return Err(OpsError::validation(artifact_path, "dump produced no output"));
            }
            Ok(done) => done,
            Err(e) => {
                discard(&[partial.clone()]);
                return Err(e);
            }
        };

        if let Err(e) = fs::rename(&partial, artifact_path) {
            discard(&[partial.clone()]);
            return Err(OpsError::io(artifact_path, e));
        }

        let file_name = artifact_path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let manifest = ArtifactManifest::new(
            &file_name,
            created_at,
            &self.target.host_alias,
            &self.target.database_name,
            written,
            sha256.clone(),
        );
        match manifest.write_for(artifact_path) {
            Ok(manifest_path) => Ok((written, sha256, manifest_path)),
            Err(e) => {
                discard(&[artifact_path.to_path_buf()]);
                Err(e)
            }
        }
    }

    fn verify_listed(&self, artifact_path: &Path, written: u64) -> OpsResult<Vec<Artifact>> {
        let listed = self.store.list()?;
        match listed.iter().find(|a| a.path == artifact_path) {
            Some(a) if a.size_bytes == written => Ok(listed),
            Some(a) => Err(OpsError::validation(
                artifact_path,
                format!("size on disk {} differs from bytes dumped {}", a.size_bytes, written),
            )),
            None => Err(OpsError::validation(
                artifact_path,
                "artifact is not listed in the backup directory",
            )),
        }
    }
}

/// Best-effort removal of files left by a failed run.
fn discard(paths: &[PathBuf]) {
    for path in paths {
        if let Err(e) = fs::remove_file(path) {
            if e.kind() != std::io::ErrorKind::NotFound {
                tracing::error!(path = %path.display(), error = %e, "could not remove file from failed backup; remove it manually");
            }
        }
    }
}
