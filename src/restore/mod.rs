//! Restore workflow
//!
//! Puts a chosen artifact back onto the remote database.
//!
//! # States
//!
//! ```text
//! Idle -> Resolving -> AwaitingConfirmation -> Staging -> Restoring -> CleaningUp -> Done
//!             |                 |                 |                        |
//!             v                 v                 +----> CleaningUp        v
//!           Failed           Declined                                    Failed
//! ```
//!
//! # Algorithm
//!
//! 1. Resolve the reference to a local artifact; a miss ends the run before
//!    any remote call
//! 2. Reject an empty artifact, or one that no longer matches its manifest
//! 3. Ask for confirmation; anything but the exact token is a clean no-op
//! 4. Copy the artifact to a uniquely named path on the remote host
//! 5. Run the restore against the staged path, dropping existing objects
//! 6. Remove the staged path, whether or not 4 or 5 succeeded
//!
//! No step is retried. A half-applied restore is not safe to repeat
//! automatically.

mod confirm;
mod staging;

pub use confirm::{
    is_affirmative, AssumeYes, Confirmation, ConfirmationRequest, ConfirmationSource,
    FixedAnswer, CONFIRMATION_TOKEN,
};
pub use staging::{staging_path, StagedCopy};

use serde::Serialize;

use crate::artifact::{Artifact, ArtifactManifest, ArtifactStore};
use crate::errors::{OpsError, OpsResult, Stage};
use crate::interrupt::Interrupts;
use crate::remote::{RemoteExecutor, RemoteTarget};

pub const DEFAULT_STAGING_DIR: &str = "/tmp";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RestoreState {
    Idle,
    Resolving,
    AwaitingConfirmation,
    Staging,
    Restoring,
    CleaningUp,
    Done,
    Declined,
    Failed,
}

impl RestoreState {
    pub fn as_str(&self) -> &'static str {
        match self {
            RestoreState::Idle => "idle",
            RestoreState::Resolving => "resolving",
            RestoreState::AwaitingConfirmation => "awaiting_confirmation",
            RestoreState::Staging => "staging",
            RestoreState::Restoring => "restoring",
            RestoreState::CleaningUp => "cleaning_up",
            RestoreState::Done => "done",
            RestoreState::Declined => "declined",
            RestoreState::Failed => "failed",
        }
    }

    pub fn can_transition_to(&self, next: RestoreState) -> bool {
        use RestoreState::*;
        matches!(
            (self, next),
            (Idle, Resolving)
                | (Resolving, AwaitingConfirmation)
                | (Resolving, Failed)
                | (AwaitingConfirmation, Staging)
                | (AwaitingConfirmation, Declined)
                | (AwaitingConfirmation, Failed)
                | (Staging, Restoring)
                | (Staging, CleaningUp)
                | (Restoring, CleaningUp)
                | (CleaningUp, Done)
                | (CleaningUp, Failed)
        )
    }

    fn advance(&mut self, next: RestoreState) {
        debug_assert!(
            self.can_transition_to(next),
            "invalid restore transition {} -> {}",
            self.as_str(),
            next.as_str()
        );
        tracing::info!(from = self.as_str(), to = next.as_str(), "restore.state");
        *self = next;
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum RestoreOutcome {
    Restored {
        artifact: Artifact,
        staged_path: String,
        /// `false` if the staged copy could not be removed and needs manual cleanup
        staged_copy_removed: bool,
    },
    Declined {
        artifact: Artifact,
    },
}

pub struct RestoreOrchestrator<'a> {
    target: &'a RemoteTarget,
    store: &'a ArtifactStore,
    executor: &'a dyn RemoteExecutor,
    staging_dir: &'a str,
    interrupt: Option<&'a dyn Interrupts>,
}

impl<'a> RestoreOrchestrator<'a> {
    pub fn new(
        target: &'a RemoteTarget,
        store: &'a ArtifactStore,
        executor: &'a dyn RemoteExecutor,
        staging_dir: &'a str,
    ) -> Self {
        Self {
            target,
            store,
            executor,
            staging_dir,
            interrupt: None,
        }
    }

    /// Stop before the next remote step once an interrupt arrives.
    ///
    /// `interrupts` is armed only after the operator confirms, so Ctrl-C at
    /// the prompt still ends the process the usual way.
    pub fn with_interrupt(mut self, interrupts: &'a dyn Interrupts) -> Self {
        self.interrupt = Some(interrupts);
        self
    }

    pub fn run(
        &self,
        reference: &str,
        confirmations: &mut dyn ConfirmationSource,
    ) -> OpsResult<RestoreOutcome> {
        let mut state = RestoreState::Idle;

        state.advance(RestoreState::Resolving);
        let artifact = match self.store.resolve(reference).and_then(|a| self.check_artifact(a)) {
            Ok(artifact) => artifact,
            Err(e) => {
                state.advance(RestoreState::Failed);
                return Err(e);
            }
        };
        tracing::info!(artifact = %artifact.path.display(), "restore artifact resolved");

        state.advance(RestoreState::AwaitingConfirmation);
        let request = ConfirmationRequest {
            artifact: &artifact,
            target: self.target,
        };
        let confirmation = match confirmations.confirm(&request) {
            Ok(confirmation) => confirmation,
            Err(e) => {
                state.advance(RestoreState::Failed);
                return Err(e);
            }
        };
        if !confirmation.is_affirmative() {
            state.advance(RestoreState::Declined);
            tracing::info!(artifact = %artifact.path.display(), "restore declined; nothing changed");
            return Ok(RestoreOutcome::Declined { artifact });
        }

        if let Some(interrupts) = self.interrupt {
            interrupts.arm();
        }
        if let Err(e) = self.check_interrupt(Stage::Stage) {
            state.advance(RestoreState::Failed);
            return Err(OpsError::RestoreFailed {
                artifact: artifact.path,
                staged_path: None,
                cause: Box::new(e),
            });
        }

        state.advance(RestoreState::Staging);
        let remote_path = staging_path(self.staging_dir, &artifact);
        let (staged, copied) = StagedCopy::stage(self.executor, self.target, &artifact, remote_path);
        let staged_path = staged.remote_path().to_string();
        tracing::info!(host = %self.target.host_alias, staged = %staged_path, "artifact staged");

        let restored = match copied {
            Ok(()) => match self.check_interrupt(Stage::Restore) {
                Ok(()) => {
                    state.advance(RestoreState::Restoring);
                    self.executor
                        .run(
                            self.target,
                            &self.target.restore_command(&staged_path),
                            Stage::Restore,
                            None,
                        )
                        .map(|_| ())
                }
                Err(e) => Err(e),
            },
            Err(e) => Err(e),
        };

        state.advance(RestoreState::CleaningUp);
        let removed = match staged.remove() {
            Ok(()) => true,
            Err(e) => {
                tracing::error!(
                    host = %self.target.host_alias,
                    staged = %staged_path,
                    error = %e,
                    "could not remove staged copy; remove it manually"
                );
                false
            }
        };

        match restored {
            Ok(()) => {
                state.advance(RestoreState::Done);
                Ok(RestoreOutcome::Restored {
                    artifact,
                    staged_path,
                    staged_copy_removed: removed,
                })
            }
            Err(cause) => {
                state.advance(RestoreState::Failed);
                let cause = match cause {
                    OpsError::RemoteExecutionFailed { stage, .. }
                        if self.interrupt.map_or(false, |i| i.is_set()) =>
                    {
                        OpsError::Interrupted { stage }
                    }
                    other => other,
                };
                tracing::error!(
                    artifact = %artifact.path.display(),
                    staged = %staged_path,
                    staged_copy_removed = removed,
                    error = %cause,
                    "restore failed"
                );
                Err(OpsError::RestoreFailed {
                    artifact: artifact.path,
                    staged_path: Some(staged_path),
                    cause: Box::new(cause),
                })
            }
        }
    }

    fn check_artifact(&self, artifact: Artifact) -> OpsResult<Artifact> {
        if artifact.size_bytes == 0 {
            return Err(OpsError::validation(&artifact.path, "artifact is empty"));
        }
        match ArtifactManifest::read_for(&artifact.path)? {
            Some(manifest) => manifest.verify(&artifact.path)?,
            None => tracing::warn!(
                artifact = %artifact.path.display(),
                "no manifest next to artifact; integrity not verified"
            ),
        }
        Ok(artifact)
    }

    fn check_interrupt(&self, before: Stage) -> OpsResult<()> {
        match self.interrupt {
            Some(interrupts) if interrupts.is_set() => {
                Err(OpsError::Interrupted { stage: before })
            }
            _ => Ok(()),
        }
    }
}
