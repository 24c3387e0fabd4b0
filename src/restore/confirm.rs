//! Restore confirmation
//!
//! The decision is a pure function of the answer. Where the answer comes from
//! (a terminal prompt, a `--yes` flag, a test script) is a `ConfirmationSource`.

use crate::artifact::Artifact;
use crate::errors::OpsResult;
use crate::remote::RemoteTarget;

/// The only answer that lets a restore proceed.
pub const CONFIRMATION_TOKEN: &str = "yes";

/// `true` only for the exact token, ignoring surrounding whitespace.
pub fn is_affirmative(answer: &str) -> bool {
    answer.trim() == CONFIRMATION_TOKEN
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Confirmation {
    /// Pre-approved on the command line
    Assumed,
    /// Whatever the operator typed; EOF is an empty answer
    Answer(String),
}

impl Confirmation {
    pub fn is_affirmative(&self) -> bool {
        match self {
            Confirmation::Assumed => true,
            Confirmation::Answer(answer) => is_affirmative(answer),
        }
    }
}

/// What the operator is asked to approve.
#[derive(Debug, Clone, Copy)]
pub struct ConfirmationRequest<'a> {
    pub artifact: &'a Artifact,
    pub target: &'a RemoteTarget,
}

impl ConfirmationRequest<'_> {
    pub fn prompt(&self) -> String {
        format!(
            "Restore {} onto database '{}' on host '{}'? Existing objects will be dropped. Type '{}' to continue: ",
            self.artifact.path.display(),
            self.target.database_name,
            self.target.host_alias,
            CONFIRMATION_TOKEN
        )
    }
}

pub trait ConfirmationSource {
    fn confirm(&mut self, request: &ConfirmationRequest<'_>) -> OpsResult<Confirmation>;
}

/// `--yes`: approve without asking.
#[derive(Debug, Clone, Copy, Default)]
pub struct AssumeYes;

impl ConfirmationSource for AssumeYes {
    fn confirm(&mut self, _request: &ConfirmationRequest<'_>) -> OpsResult<Confirmation> {
        Ok(Confirmation::Assumed)
    }
}

/// A fixed, already-collected answer.
#[derive(Debug, Clone)]
pub struct FixedAnswer(pub String);

impl ConfirmationSource for FixedAnswer {
    fn confirm(&mut self, _request: &ConfirmationRequest<'_>) -> OpsResult<Confirmation> {
        Ok(Confirmation::Answer(self.0.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn test_only_exact_token_is_affirmative() {
        assert!(is_affirmative("yes"));
        assert!(is_affirmative("yes\n"));
        assert!(is_affirmative("  yes  "));

        for answer in ["", "\n", "y", "Yes", "YES", "yes please", "no", "yess"] {
            assert!(!is_affirmative(answer), "{:?} must decline", answer);
        }
    }

    #[test]
    fn test_assumed_confirmation() {
        assert!(Confirmation::Assumed.is_affirmative());
        assert!(!Confirmation::Answer(String::new()).is_affirmative());
    }

    #[test]
    fn test_prompt_names_artifact_and_target() {
        let artifact = Artifact {
            path: PathBuf::from("/b/shop_20260101_000000.backup"),
            timestamp: None,
            size_bytes: 1,
        };
        let target = RemoteTarget {
            host_alias: "db-prod".to_string(),
            database_name: "shop".to_string(),
            database_user: "shop".to_string(),
            dump_binary_path: "pg_dump".to_string(),
            restore_binary_path: "pg_restore".to_string(),
        };
        let prompt = ConfirmationRequest {
            artifact: &artifact,
            target: &target,
        }
        .prompt();

        assert!(prompt.contains("/b/shop_20260101_000000.backup"));
        assert!(prompt.contains("'shop'"));
        assert!(prompt.contains("'db-prod'"));
        assert!(prompt.contains("'yes'"));
    }
}
