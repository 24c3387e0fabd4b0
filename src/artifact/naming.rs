//! Artifact file naming
//!
//! Artifacts are named `<prefix>_<YYYYMMDD_HHMMSS>.backup`. The timestamp is
//! zero-padded and most-significant-first, so lexical order of names with the
//! same prefix equals chronological order. Other tooling relies on this name
//! format; do not change it.

use chrono::{DateTime, NaiveDateTime, Utc};
use regex::Regex;

pub const ARTIFACT_EXTENSION: &str = "backup";
pub const TIMESTAMP_FORMAT: &str = "%Y%m%d_%H%M%S";

/// Formats and recognizes artifact file names for one prefix.
#[derive(Debug, Clone)]
pub struct ArtifactNaming {
    prefix: String,
    pattern: Regex,
}

impl ArtifactNaming {
    pub fn new(prefix: &str) -> Self {
        let pattern = Regex::new(&format!(
            r"^{}_(\d{{8}}_\d{{6}})\.{}$",
            regex::escape(prefix),
            ARTIFACT_EXTENSION
        ))
        .expect("escaped prefix always yields a valid pattern");

        Self {
            prefix: prefix.to_string(),
            pattern,
        }
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    pub fn file_name(&self, at: DateTime<Utc>) -> String {
        format!(
            "{}_{}.{}",
            self.prefix,
            at.format(TIMESTAMP_FORMAT),
            ARTIFACT_EXTENSION
        )
    }

    /// Timestamp embedded in `file_name`, if it follows this naming scheme.
    pub fn parse(&self, file_name: &str) -> Option<NaiveDateTime> {
        let captures = self.pattern.captures(file_name)?;
        NaiveDateTime::parse_from_str(captures.get(1)?.as_str(), TIMESTAMP_FORMAT).ok()
    }
}
