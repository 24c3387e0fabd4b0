//! Local process plumbing shared by every executor
//!
//! Each helper blocks until the child exits. A non-zero exit, a signal, or a
//! failure to spawn all become `RemoteExecutionFailed` for the given stage,
//! carrying the tail of the child's stderr.

use std::io::{self, Read, Write};
use std::process::{Child, Command, ExitStatus, Stdio};
use std::thread;

use crate::errors::{OpsError, OpsResult, Stage};

/// Bytes of stderr kept for error reports.
pub const STDERR_SNIPPET_BYTES: usize = 2048;

/// Run `cmd`, optionally feeding `input` to its stdin, and return its stdout.
pub fn run_captured(
    mut cmd: Command,
    stage: Stage,
    input: Option<&mut (dyn Read + Send)>,
) -> OpsResult<Vec<u8>> {
    let stdin = if input.is_some() {
        Stdio::piped()
    } else {
        Stdio::null()
    };
    cmd.stdin(stdin).stdout(Stdio::piped()).stderr(Stdio::piped());

    let mut child = spawn(&mut cmd, stage)?;
    let child_stdin = child.stdin.take();

    let (output, fed) = thread::scope(|scope| {
        let feeder = match (input, child_stdin) {
            (Some(input), Some(mut stdin)) => Some(scope.spawn(move || {
                let copied = io::copy(input, &mut stdin);
                // Dropping stdin closes the pipe so the child sees EOF.
                drop(stdin);
                copied
            })),
            _ => None,
        };
        let output = child.wait_with_output();
        let fed = feeder.map(|handle| handle.join());
        (output, fed)
    });

    let output = output.map_err(|e| wait_failed(stage, e))?;
    check_status(stage, output.status, &output.stderr)?;

    match fed {
        Some(Ok(Err(e))) => Err(OpsError::RemoteExecutionFailed {
            stage,
            exit_code: output.status.code(),
            stderr_snippet: format!("failed to write input: {}", e),
        }),
        Some(Err(_)) => Err(OpsError::RemoteExecutionFailed {
            stage,
            exit_code: output.status.code(),
            stderr_snippet: "input writer panicked".to_string(),
        }),
        _ => Ok(output.stdout),
    }
}

/// Run `cmd`, copying its stdout into `sink` as it arrives.
///
/// Returns the number of bytes written to `sink`.
pub fn run_streamed(mut cmd: Command, stage: Stage, sink: &mut dyn Write) -> OpsResult<u64> {
    cmd.stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped());

    let mut child = spawn(&mut cmd, stage)?;
    let stderr = child.stderr.take();
    let stderr_reader = thread::spawn(move || {
        let mut buf = Vec::new();
        if let Some(mut stderr) = stderr {
            let _ = stderr.read_to_end(&mut buf);
        }
        buf
    });

    let copied = match child.stdout.take() {
        Some(mut stdout) => io::copy(&mut stdout, sink),
        None => Err(io::Error::new(io::ErrorKind::Other, "stdout was not captured")),
    };

    if copied.is_err() {
        // The sink is gone; do not leave the child blocked on a full pipe.
        let _ = child.kill();
    }

    let status = child.wait().map_err(|e| wait_failed(stage, e))?;
    let stderr = stderr_reader.join().unwrap_or_default();

    let copied = copied.map_err(|e| OpsError::RemoteExecutionFailed {
        stage,
        exit_code: status.code(),
        stderr_snippet: format!("output stream interrupted: {}", e),
    })?;

    check_status(stage, status, &stderr)?;
    Ok(copied)
}

fn spawn(cmd: &mut Command, stage: Stage) -> OpsResult<Child> {
    tracing::debug!(
        stage = stage.as_str(),
        program = %cmd.get_program().to_string_lossy(),
        "spawning process"
    );
    cmd.spawn().map_err(|e| OpsError::RemoteExecutionFailed {
        stage,
        exit_code: None,
        stderr_snippet: format!(
            "failed to start {}: {}",
            cmd.get_program().to_string_lossy(),
            e
        ),
    })
}

fn wait_failed(stage: Stage, e: io::Error) -> OpsError {
    OpsError::RemoteExecutionFailed {
        stage,
        exit_code: None,
        stderr_snippet: format!("failed to wait for process: {}", e),
    }
}

fn check_status(stage: Stage, status: ExitStatus, stderr: &[u8]) -> OpsResult<()> {
    if status.success() {
        return Ok(());
    }
    Err(OpsError::RemoteExecutionFailed {
        stage,
        exit_code: status.code(),
        stderr_snippet: stderr_snippet(stderr),
    })
}

/// Last `STDERR_SNIPPET_BYTES` of `stderr`, lossily decoded and trimmed.
pub fn stderr_snippet(stderr: &[u8]) -> String {
    let start = stderr.len().saturating_sub(STDERR_SNIPPET_BYTES);
    String::from_utf8_lossy(&stderr[start..]).trim().to_string()
}
