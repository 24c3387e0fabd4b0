//! Artifact manifest sidecar
//!
//! Each successful dump gets `<artifact>.json` next to it, recording where the
//! dump came from and the size and SHA-256 of the bytes written. Restore uses
//! it to refuse a truncated or altered artifact before touching the remote
//! database.

use std::ffi::OsString;
use std::fs::{self, File};
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::errors::{OpsError, OpsResult};

pub const MANIFEST_FORMAT_VERSION: u8 = 1;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ArtifactManifest {
    /// Artifact file name (not a path, so the directory can be moved)
    pub artifact: String,

    /// RFC3339 creation time
    pub created_at: String,

    pub host_alias: String,
    pub database_name: String,
    pub size_bytes: u64,

    /// Lowercase hex SHA-256 of the artifact contents
    pub sha256: String,

    pub format_version: u8,
}

impl ArtifactManifest {
    pub fn new(
        artifact: &str,
        created_at: DateTime<Utc>,
        host_alias: &str,
        database_name: &str,
        size_bytes: u64,
        sha256: String,
    ) -> Self {
        Self {
            artifact: artifact.to_string(),
            created_at: created_at.to_rfc3339_opts(SecondsFormat::Secs, true),
            host_alias: host_alias.to_string(),
            database_name: database_name.to_string(),
            size_bytes,
            sha256,
            format_version: MANIFEST_FORMAT_VERSION,
        }
    }

    /// Write the manifest next to `artifact_path`, via a temp file and rename.
    pub fn write_for(&self, artifact_path: &Path) -> OpsResult<PathBuf> {
        let path = sidecar_path(artifact_path);
        let tmp = with_suffix(&path, ".tmp");

        let json = serde_json::to_vec_pretty(self).map_err(|e| {
            OpsError::validation(&path, format!("failed to serialize manifest: {}", e))
        })?;

        let result = (|| -> io::Result<()> {
            let mut file = File::create(&tmp)?;
            file.write_all(&json)?;
            file.sync_all()?;
            fs::rename(&tmp, &path)
        })();

        if let Err(e) = result {
            let _ = fs::remove_file(&tmp);
            return Err(OpsError::io(&path, e));
        }
        Ok(path)
    }

    /// Manifest for `artifact_path`, or `None` if there is no sidecar.
    pub fn read_for(artifact_path: &Path) -> OpsResult<Option<Self>> {
        let path = sidecar_path(artifact_path);
        let contents = match fs::read(&path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(OpsError::io(&path, e)),
        };

        serde_json::from_slice(&contents)
            .map(Some)
            .map_err(|e| OpsError::validation(&path, format!("unreadable manifest: {}", e)))
    }

    /// Check the artifact's size and digest against this manifest.
    pub fn verify(&self, artifact_path: &Path) -> OpsResult<()> {
        if self.format_version != MANIFEST_FORMAT_VERSION {
            return Err(OpsError::validation(
                artifact_path,
                format!("unsupported manifest version {}", self.format_version),
            ));
        }

        let (size, digest) = digest_file(artifact_path)?;
        if size != self.size_bytes {
            return Err(OpsError::validation(
                artifact_path,
                format!("size {} does not match manifest ({})", size, self.size_bytes),
            ));
        }
        if digest != self.sha256 {
            return Err(OpsError::validation(
                artifact_path,
                "sha256 does not match manifest",
            ));
        }
        Ok(())
    }
}

/// `<artifact>.json`
pub fn sidecar_path(artifact_path: &Path) -> PathBuf {
    with_suffix(artifact_path, ".json")
}

pub(crate) fn with_suffix(path: &Path, suffix: &str) -> PathBuf {
    let mut name: OsString = path.as_os_str().to_owned();
    name.push(suffix);
    PathBuf::from(name)
}

/// Size and lowercase hex SHA-256 of a file, read in chunks.
pub fn digest_file(path: &Path) -> OpsResult<(u64, String)> {
    let mut file = File::open(path).map_err(|e| OpsError::io(path, e))?;
    let mut hasher = Sha256::new();
    let mut buf = [0u8; 64 * 1024];
    let mut total = 0u64;

    loop {
        let n = file.read(&mut buf).map_err(|e| OpsError::io(path, e))?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
        total += n as u64;
    }

    Ok((total, format!("{:x}", hasher.finalize())))
}
