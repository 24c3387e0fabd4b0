//! Terminal I/O for the CLI
//!
//! - Output: one JSON object on stdout per invocation
//! - Prompts: stderr, answered by one line on stdin

use std::io::{self, BufRead, Write};

use serde_json::{json, Map, Value};

use crate::errors::{OpsError, OpsResult};
use crate::restore::{Confirmation, ConfirmationRequest, ConfirmationSource};

use super::errors::{CliError, CliResult};

/// Write a success response to stdout
pub fn write_response(data: Value) -> CliResult<()> {
    let mut stdout = io::stdout();
    write_line(&mut stdout, &response_body(data))
}

/// Write an error response to stdout
pub fn write_error(error: &CliError) -> CliResult<()> {
    let mut stdout = io::stdout();
    write_line(&mut stdout, &error_body(error))
}

pub(crate) fn response_body(data: Value) -> Value {
    json!({
        "status": "ok",
        "data": data
    })
}

/// Error object, naming any artifact or staged copy left to clean up.
pub(crate) fn error_body(error: &CliError) -> Value {
    let mut body = Map::new();
    body.insert("status".to_string(), json!("error"));
    body.insert("code".to_string(), json!(error.code_str()));
    body.insert("message".to_string(), json!(error.message()));

    if let CliError::Ops(ops) = error {
        if let Some(artifact) = ops.artifact() {
            body.insert("artifact".to_string(), json!(artifact.display().to_string()));
        }
        if let Some(staged) = ops.staged_path() {
            body.insert("staged_path".to_string(), json!(staged));
        }
    }
    if !error.available().is_empty() {
        body.insert("available".to_string(), json!(error.available()));
    }

    Value::Object(body)
}

fn write_line(out: &mut dyn Write, value: &Value) -> CliResult<()> {
    serde_json::to_writer(&mut *out, value)?;
    writeln!(out)?;
    out.flush()?;
    Ok(())
}

/// Asks the operator on a terminal.
pub struct PromptConfirmation<R, W> {
    input: R,
    output: W,
}

impl<R: BufRead, W: Write> PromptConfirmation<R, W> {
    pub fn new(input: R, output: W) -> Self {
        Self { input, output }
    }
}

impl PromptConfirmation<io::StdinLock<'static>, io::Stderr> {
    /// Prompt on stderr, read the answer from stdin.
    pub fn terminal() -> Self {
        Self::new(io::stdin().lock(), io::stderr())
    }
}

impl<R: BufRead, W: Write> ConfirmationSource for PromptConfirmation<R, W> {
    fn confirm(&mut self, request: &ConfirmationRequest<'_>) -> OpsResult<Confirmation> {
        let terminal_err = |e| OpsError::io("<terminal>", e);

        write!(self.output, "{}", request.prompt()).map_err(terminal_err)?;
        self.output.flush().map_err(terminal_err)?;

        // EOF leaves the answer empty, which declines.
        let mut answer = String::new();
        self.input.read_line(&mut answer).map_err(terminal_err)?;
        Ok(Confirmation::Answer(answer))
    }
}
