//! Local artifact directory
//!
//! The directory is assumed to have a single writer. Nothing here locks it;
//! two operators running backups against the same directory at once can
//! prune each other's artifacts.

use std::fs;
use std::io;
use std::path::{Component, Path, PathBuf};

use chrono::{DateTime, Utc};

use crate::errors::{OpsError, OpsResult};

use super::manifest::{sidecar_path, with_suffix};
use super::naming::ArtifactNaming;
use super::{sort_newest_first, Artifact};

/// Where a dump is written while it is still streaming.
pub fn partial_path(artifact_path: &Path) -> PathBuf {
    with_suffix(artifact_path, ".partial")
}

/// Suffixes of files a killed run can leave beside an artifact name.
const LEFTOVER_SUFFIXES: [&str; 2] = [".partial", ".json.tmp"];

#[derive(Debug, Clone)]
pub struct ArtifactStore {
    dir: PathBuf,
    naming: ArtifactNaming,
}

impl ArtifactStore {
    /// Open an existing backup directory.
    ///
    /// A missing directory is a configuration error; it is never created here.
    pub fn open(dir: &Path, prefix: &str) -> OpsResult<Self> {
        let dir = fs::canonicalize(dir).map_err(|e| {
            OpsError::Configuration(format!(
                "backup directory {} is not accessible: {}",
                dir.display(),
                e
            ))
        })?;

        if !dir.is_dir() {
            return Err(OpsError::Configuration(format!(
                "backup directory {} is not a directory",
                dir.display()
            )));
        }

        Ok(Self {
            dir,
            naming: ArtifactNaming::new(prefix),
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn naming(&self) -> &ArtifactNaming {
        &self.naming
    }

    pub fn new_artifact_path(&self, now: DateTime<Utc>) -> PathBuf {
        self.dir.join(self.naming.file_name(now))
    }

    /// All artifacts in the directory, newest first.
    ///
    /// Files that do not follow the naming scheme (manifests, partial dumps,
    /// anything else) are ignored.
    pub fn list(&self) -> OpsResult<Vec<Artifact>> {
        let entries = fs::read_dir(&self.dir).map_err(|e| OpsError::io(&self.dir, e))?;
        let mut artifacts = Vec::new();

        for entry in entries {
            let entry = entry.map_err(|e| OpsError::io(&self.dir, e))?;
            let name = entry.file_name();
            let Some(timestamp) = name.to_str().and_then(|n| self.naming.parse(n)) else {
                continue;
            };

            let metadata = entry.metadata().map_err(|e| OpsError::io(entry.path(), e))?;
            if !metadata.is_file() {
                continue;
            }

            artifacts.push(Artifact {
                path: entry.path(),
                timestamp: Some(timestamp),
                size_bytes: metadata.len(),
            });
        }

        sort_newest_first(&mut artifacts);
        Ok(artifacts)
    }

    /// File names of listed artifacts, newest first. Listing errors yield an
    /// empty list; this is only used to help an operator correct input.
    pub fn available_names(&self) -> Vec<String> {
        self.list()
            .map(|list| list.iter().map(Artifact::file_name).collect())
            .unwrap_or_default()
    }

    /// Resolve an operator-supplied reference to an artifact.
    ///
    /// The reference is tried as a literal path first. A bare file name (a
    /// single path component) is then looked up inside the backup directory,
    /// and only if it follows the naming scheme. Manifests and leftovers of
    /// killed runs never resolve.
    pub fn resolve(&self, reference: &str) -> OpsResult<Artifact> {
        let not_found = || OpsError::ArtifactNotFound {
            reference: reference.to_string(),
            available: self.available_names(),
        };

        if reference.trim().is_empty() {
            return Err(not_found());
        }

        let literal = Path::new(reference);
        let file_name = literal.file_name().and_then(|n| n.to_str());
        if file_name.map_or(false, |n| self.is_companion(n)) {
            return Err(not_found());
        }
        if literal.is_file() {
            return self.describe(literal);
        }

        let mut components = literal.components();
        let bare = matches!(
            (components.next(), components.next()),
            (Some(Component::Normal(_)), None)
        );
        if bare && self.naming.parse(reference).is_some() {
            let candidate = self.dir.join(literal);
            if candidate.is_file() {
                return self.describe(&candidate);
            }
        }

        Err(not_found())
    }

    /// Remove an artifact and its manifest sidecar.
    pub fn delete(&self, artifact: &Artifact) -> OpsResult<()> {
        fs::remove_file(&artifact.path).map_err(|e| OpsError::io(&artifact.path, e))?;

        let sidecar = sidecar_path(&artifact.path);
        match fs::remove_file(&sidecar) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(OpsError::io(sidecar, e)),
        }
    }

    /// Remove `.partial` dumps and half-written manifests left by a run that
    /// was killed. Only names belonging to this prefix are touched.
    pub fn sweep_leftovers(&self) -> OpsResult<Vec<PathBuf>> {
        let entries = fs::read_dir(&self.dir).map_err(|e| OpsError::io(&self.dir, e))?;
        let mut removed = Vec::new();

        for entry in entries {
            let entry = entry.map_err(|e| OpsError::io(&self.dir, e))?;
            let name = entry.file_name();
            let Some(name) = name.to_str() else {
                continue;
            };
            if !self.is_leftover(name) || !entry.path().is_file() {
                continue;
            }

            let path = entry.path();
            match fs::remove_file(&path) {
                Ok(()) => {
                    tracing::warn!(path = %path.display(), "removed leftover of an interrupted run");
                    removed.push(path);
                }
                Err(e) => {
                    tracing::warn!(path = %path.display(), error = %e, "could not remove leftover file");
                }
            }
        }

        removed.sort();
        Ok(removed)
    }

    fn is_leftover(&self, name: &str) -> bool {
        LEFTOVER_SUFFIXES.iter().any(|suffix| {
            name.strip_suffix(suffix)
                .map_or(false, |stem| self.naming.parse(stem).is_some())
        })
    }

    /// A manifest or leftover that sits beside an artifact of this prefix.
    fn is_companion(&self, name: &str) -> bool {
        self.is_leftover(name)
            || name
                .strip_suffix(".json")
                .map_or(false, |stem| self.naming.parse(stem).is_some())
    }

    fn describe(&self, path: &Path) -> OpsResult<Artifact> {
        let path = fs::canonicalize(path).map_err(|e| OpsError::io(path, e))?;
        let metadata = fs::metadata(&path).map_err(|e| OpsError::io(&path, e))?;
        let timestamp = path
            .file_name()
            .and_then(|n| n.to_str())
            .and_then(|n| self.naming.parse(n));

        Ok(Artifact {
            path,
            timestamp,
            size_bytes: metadata.len(),
        })
    }
}
