//! Scripted in-process executor
//!
//! Models just enough of a remote host to exercise the orchestrators: a dump
//! that emits a configured payload, a set of remote files that copies add and
//! `rm` removes, and per-stage failure injection. Every call is recorded.

use std::cell::RefCell;
use std::collections::{BTreeSet, HashMap};
use std::io::{Read, Write};
use std::path::{Path, PathBuf};

use crate::errors::{OpsError, OpsResult, Stage};

use super::command::RemoteCommand;
use super::target::RemoteTarget;
use super::RemoteExecutor;

/// One recorded call against the fake host.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RemoteCall {
    Run {
        stage: Stage,
        command: RemoteCommand,
        with_input: bool,
    },
    Stream {
        stage: Stage,
        command: RemoteCommand,
    },
    Copy {
        local: PathBuf,
        remote_path: String,
    },
}

impl RemoteCall {
    pub fn stage(&self) -> Stage {
        match self {
            RemoteCall::Run { stage, .. } | RemoteCall::Stream { stage, .. } => *stage,
            RemoteCall::Copy { .. } => Stage::Stage,
        }
    }
}

#[derive(Debug, Default)]
pub struct FakeExecutor {
    dump_payload: Vec<u8>,
    failures: HashMap<Stage, (i32, String)>,
    calls: RefCell<Vec<RemoteCall>>,
    remote_files: RefCell<BTreeSet<String>>,
}

impl FakeExecutor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bytes the remote dump writes to stdout.
    pub fn with_dump_payload(mut self, payload: impl Into<Vec<u8>>) -> Self {
        self.dump_payload = payload.into();
        self
    }

    /// Make every call for `stage` fail with `exit_code`.
    pub fn failing(mut self, stage: Stage, exit_code: i32, stderr: impl Into<String>) -> Self {
        self.failures.insert(stage, (exit_code, stderr.into()));
        self
    }

    pub fn calls(&self) -> Vec<RemoteCall> {
        self.calls.borrow().clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.borrow().len()
    }

    pub fn stages(&self) -> Vec<Stage> {
        self.calls.borrow().iter().map(RemoteCall::stage).collect()
    }

    /// Files currently present on the fake host.
    pub fn remote_files(&self) -> Vec<String> {
        self.remote_files.borrow().iter().cloned().collect()
    }

    fn check_failure(&self, stage: Stage) -> OpsResult<()> {
        match self.failures.get(&stage) {
            Some((code, stderr)) => Err(OpsError::RemoteExecutionFailed {
                stage,
                exit_code: Some(*code),
                stderr_snippet: stderr.clone(),
            }),
            None => Ok(()),
        }
    }
}

impl RemoteExecutor for FakeExecutor {
    fn run(
        &self,
        _target: &RemoteTarget,
        command: &RemoteCommand,
        stage: Stage,
        input: Option<&mut (dyn Read + Send)>,
    ) -> OpsResult<Vec<u8>> {
        self.calls.borrow_mut().push(RemoteCall::Run {
            stage,
            command: command.clone(),
            with_input: input.is_some(),
        });
        if let Some(input) = input {
            let mut sink = Vec::new();
            input
                .read_to_end(&mut sink)
                .map_err(|e| OpsError::io("<fake stdin>", e))?;
        }
        self.check_failure(stage)?;

        // The last argument of both the restore and the rm is the remote path.
        let path = command.get_args().last().cloned().unwrap_or_default();
        match stage {
            Stage::Cleanup => {
                self.remote_files.borrow_mut().remove(&path);
            }
            Stage::Restore if !self.remote_files.borrow().contains(&path) => {
                return Err(OpsError::RemoteExecutionFailed {
                    stage,
                    exit_code: Some(1),
                    stderr_snippet: format!("could not open input file \"{}\"", path),
                });
            }
            _ => {}
        }
        Ok(Vec::new())
    }

    fn run_streaming(
        &self,
        _target: &RemoteTarget,
        command: &RemoteCommand,
        stage: Stage,
        sink: &mut dyn Write,
    ) -> OpsResult<u64> {
        self.calls.borrow_mut().push(RemoteCall::Stream {
            stage,
            command: command.clone(),
        });
        self.check_failure(stage)?;
        sink.write_all(&self.dump_payload)
            .map_err(|e| OpsError::io("<fake sink>", e))?;
        Ok(self.dump_payload.len() as u64)
    }

    fn copy_to_remote(
        &self,
        _target: &RemoteTarget,
        local: &Path,
        remote_path: &str,
    ) -> OpsResult<()> {
        self.calls.borrow_mut().push(RemoteCall::Copy {
            local: local.to_path_buf(),
            remote_path: remote_path.to_string(),
        });
        self.check_failure(Stage::Stage)?;
        self.remote_files.borrow_mut().insert(remote_path.to_string());
        Ok(())
    }
}
