//! Backup artifacts and the local directory that holds them
//!
//! An artifact is one immutable dump file. Its identity is its path; its
//! timestamp comes from its file name, never from filesystem metadata.

mod manifest;
mod naming;
mod store;

pub use manifest::{digest_file, sidecar_path, ArtifactManifest, MANIFEST_FORMAT_VERSION};
pub use naming::{ArtifactNaming, ARTIFACT_EXTENSION, TIMESTAMP_FORMAT};
pub use store::{partial_path, ArtifactStore};

use std::cmp::Ordering;
use std::path::PathBuf;

use chrono::NaiveDateTime;
use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Artifact {
    /// Absolute local path
    pub path: PathBuf,

    /// Timestamp embedded in the file name. `None` only for files resolved by
    /// explicit path that do not follow the naming scheme.
    #[serde(serialize_with = "serialize_timestamp")]
    pub timestamp: Option<NaiveDateTime>,

    pub size_bytes: u64,
}

impl Artifact {
    pub fn file_name(&self) -> String {
        self.path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default()
    }

    /// Timestamp in the same `YYYYMMDD_HHMMSS` form used in file names.
    pub fn timestamp_label(&self) -> Option<String> {
        self.timestamp
            .map(|t| t.format(TIMESTAMP_FORMAT).to_string())
    }
}

fn serialize_timestamp<S>(ts: &Option<NaiveDateTime>, serializer: S) -> Result<S::Ok, S::Error>
where
    S: serde::Serializer,
{
    match ts {
        Some(ts) => serializer.serialize_some(&ts.format(TIMESTAMP_FORMAT).to_string()),
        None => serializer.serialize_none(),
    }
}

/// Newest first; equal timestamps fall back to reverse file-name (then full
/// path) order so the result is fully deterministic.
pub fn newest_first(a: &Artifact, b: &Artifact) -> Ordering {
    b.timestamp
        .cmp(&a.timestamp)
        .then_with(|| b.path.file_name().cmp(&a.path.file_name()))
        .then_with(|| b.path.cmp(&a.path))
}

pub fn sort_newest_first(artifacts: &mut [Artifact]) {
    artifacts.sort_by(newest_first);
}
