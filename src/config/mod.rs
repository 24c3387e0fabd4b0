//! Operator configuration
//!
//! One JSON file, read once at startup. Required: `host_alias`,
//! `database_name`, `database_user`. Everything else has a default.
//!
//! ```json
//! {
//!   "host_alias": "db-prod",
//!   "database_name": "shop",
//!   "database_user": "shop",
//!   "backup_dir": "/var/backups/shop",
//!   "artifact_prefix": "shop",
//!   "keep_count": 14
//! }
//! ```

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::artifact::ArtifactStore;
use crate::errors::{OpsError, OpsResult};
use crate::remote::{RemoteTarget, SshExecutor};
use crate::restore::DEFAULT_STAGING_DIR;
use crate::retention::{RetentionPolicy, DEFAULT_KEEP_COUNT};

pub const DEFAULT_CONFIG_PATH: &str = "./dbkeeper.json";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    /// ssh alias of the database host
    pub host_alias: String,

    pub database_name: String,

    pub database_user: String,

    #[serde(default = "default_dump_binary")]
    pub dump_binary_path: String,

    #[serde(default = "default_restore_binary")]
    pub restore_binary_path: String,

    /// Local artifact directory; must already exist
    #[serde(default = "default_backup_dir")]
    pub backup_dir: PathBuf,

    #[serde(default = "default_artifact_prefix")]
    pub artifact_prefix: String,

    #[serde(default = "default_keep_count")]
    pub keep_count: usize,

    /// Absolute directory on the remote host for staged copies
    #[serde(default = "default_staging_dir")]
    pub remote_staging_dir: String,

    #[serde(default = "default_ssh_binary")]
    pub ssh_binary: String,

    #[serde(default = "default_scp_binary")]
    pub scp_binary: String,
}

fn default_dump_binary() -> String {
    "pg_dump".to_string()
}
fn default_restore_binary() -> String {
    "pg_restore".to_string()
}
fn default_backup_dir() -> PathBuf {
    PathBuf::from("./backups")
}
fn default_artifact_prefix() -> String {
    "backup".to_string()
}
fn default_keep_count() -> usize {
    DEFAULT_KEEP_COUNT
}
fn default_staging_dir() -> String {
    DEFAULT_STAGING_DIR.to_string()
}
fn default_ssh_binary() -> String {
    "ssh".to_string()
}
fn default_scp_binary() -> String {
    "scp".to_string()
}

/// Command-line values that win over the file.
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub backup_dir: Option<PathBuf>,
    pub keep_count: Option<usize>,
}

impl Config {
    /// Read, apply overrides, validate.
    pub fn load(path: &Path, overrides: &ConfigOverrides) -> OpsResult<Self> {
        let config = Self::read(path)?.with_overrides(overrides);
        config.validate()?;
        Ok(config)
    }

    /// Parse without validating.
    pub fn read(path: &Path) -> OpsResult<Self> {
        let content = fs::read_to_string(path).map_err(|e| {
            OpsError::Configuration(format!("failed to read config {}: {}", path.display(), e))
        })?;

        serde_json::from_str(&content).map_err(|e| {
            OpsError::Configuration(format!("invalid config JSON in {}: {}", path.display(), e))
        })
    }

    pub fn with_overrides(mut self, overrides: &ConfigOverrides) -> Self {
        if let Some(dir) = &overrides.backup_dir {
            self.backup_dir = dir.clone();
        }
        if let Some(keep) = overrides.keep_count {
            self.keep_count = keep;
        }
        self
    }

    pub fn validate(&self) -> OpsResult<()> {
        for (field, value) in [
            ("host_alias", &self.host_alias),
            ("database_name", &self.database_name),
            ("database_user", &self.database_user),
            ("dump_binary_path", &self.dump_binary_path),
            ("restore_binary_path", &self.restore_binary_path),
            ("ssh_binary", &self.ssh_binary),
            ("scp_binary", &self.scp_binary),
        ] {
            if value.trim().is_empty() {
                return Err(OpsError::Configuration(format!("{} must not be empty", field)));
            }
        }

        if self.host_alias.starts_with('-') {
            return Err(OpsError::Configuration(format!(
                "host_alias '{}' must not start with '-'",
                self.host_alias
            )));
        }

        if self.keep_count == 0 {
            return Err(OpsError::Configuration("keep_count must be >= 1".to_string()));
        }

        if self.artifact_prefix.is_empty()
            || self
                .artifact_prefix
                .chars()
                .any(|c| c == '/' || c == '\\' || c.is_whitespace())
        {
            return Err(OpsError::Configuration(format!(
                "artifact_prefix '{}' must be non-empty without path separators or whitespace",
                self.artifact_prefix
            )));
        }

        if !self.remote_staging_dir.starts_with('/') {
            return Err(OpsError::Configuration(format!(
                "remote_staging_dir '{}' must be an absolute path",
                self.remote_staging_dir
            )));
        }

        if !self.backup_dir.is_dir() {
            return Err(OpsError::Configuration(format!(
                "backup_dir {} does not exist or is not a directory",
                self.backup_dir.display()
            )));
        }

        Ok(())
    }

    pub fn remote_target(&self) -> RemoteTarget {
        RemoteTarget {
            host_alias: self.host_alias.clone(),
            database_name: self.database_name.clone(),
            database_user: self.database_user.clone(),
            dump_binary_path: self.dump_binary_path.clone(),
            restore_binary_path: self.restore_binary_path.clone(),
        }
    }

    pub fn open_store(&self) -> OpsResult<ArtifactStore> {
        ArtifactStore::open(&self.backup_dir, &self.artifact_prefix)
    }

    pub fn retention_policy(&self) -> OpsResult<RetentionPolicy> {
        RetentionPolicy::new(self.keep_count)
    }

    pub fn executor(&self) -> SshExecutor {
        SshExecutor::new(&self.ssh_binary, &self.scp_binary)
    }

    pub fn staging_dir(&self) -> &str {
        &self.remote_staging_dir
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn write_config(dir: &TempDir, body: &str) -> PathBuf {
        let path = dir.path().join("dbkeeper.json");
        fs::write(&path, body).unwrap();
        path
    }

    fn minimal(backup_dir: &Path) -> String {
        serde_json::json!({
            "host_alias": "db-prod",
            "database_name": "shop",
            "database_user": "shop",
            "backup_dir": backup_dir,
        })
        .to_string()
    }

    #[test]
    fn test_defaults_applied() {
        let dir = TempDir::new().unwrap();
        let path = write_config(&dir, &minimal(dir.path()));

        let config = Config::load(&path, &ConfigOverrides::default()).unwrap();

        assert_eq!(config.dump_binary_path, "pg_dump");
        assert_eq!(config.restore_binary_path, "pg_restore");
        assert_eq!(config.artifact_prefix, "backup");
        assert_eq!(config.keep_count, 7);
        assert_eq!(config.remote_staging_dir, "/tmp");
        assert_eq!(config.ssh_binary, "ssh");
        assert_eq!(config.scp_binary, "scp");
    }

    #[test]
    fn test_missing_required_field_rejected() {
        let dir = TempDir::new().unwrap();
        let path = write_config(&dir, r#"{"host_alias": "db-prod", "database_name": "shop"}"#);

        let err = Config::load(&path, &ConfigOverrides::default()).unwrap_err();
        assert!(matches!(err, OpsError::Configuration(_)));
        assert!(err.to_string().contains("database_user"));
    }

    #[test]
    fn test_missing_file_is_configuration_error() {
        let dir = TempDir::new().unwrap();
        let err = Config::load(&dir.path().join("nope.json"), &ConfigOverrides::default())
            .unwrap_err();
        assert!(matches!(err, OpsError::Configuration(_)));
    }

    #[test]
    fn test_missing_backup_dir_rejected() {
        let dir = TempDir::new().unwrap();
        let path = write_config(&dir, &minimal(&dir.path().join("absent")));

        let err = Config::load(&path, &ConfigOverrides::default()).unwrap_err();
        assert!(err.to_string().contains("backup_dir"));
    }

    #[test]
    fn test_overrides_win_and_are_validated() {
        let dir = TempDir::new().unwrap();
        let other = TempDir::new().unwrap();
        let path = write_config(&dir, &minimal(dir.path()));

        let config = Config::load(
            &path,
            &ConfigOverrides {
                backup_dir: Some(other.path().to_path_buf()),
                keep_count: Some(3),
            },
        )
        .unwrap();
        assert_eq!(config.backup_dir, other.path());
        assert_eq!(config.keep_count, 3);

        let err = Config::load(
            &path,
            &ConfigOverrides {
                backup_dir: None,
                keep_count: Some(0),
            },
        )
        .unwrap_err();
        assert!(err.to_string().contains("keep_count"));
    }

    #[test]
    fn test_bad_prefix_and_staging_dir_rejected() {
        let dir = TempDir::new().unwrap();
        let base = Config::read(&write_config(&dir, &minimal(dir.path()))).unwrap();

        for prefix in ["", "a/b", "my backup"] {
            let config = Config {
                artifact_prefix: prefix.to_string(),
                ..base.clone()
            };
            assert!(config.validate().is_err(), "prefix {:?} accepted", prefix);
        }

        let config = Config {
            remote_staging_dir: "tmp".to_string(),
            ..base.clone()
        };
        assert!(config.validate().is_err());

        let config = Config {
            host_alias: "-oProxyCommand=x".to_string(),
            ..base
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_converts_into_runtime_parts() {
        let dir = TempDir::new().unwrap();
        let path = write_config(&dir, &minimal(dir.path()));
        let config = Config::load(&path, &ConfigOverrides::default()).unwrap();

        let target = config.remote_target();
        assert_eq!(target.host_alias, "db-prod");
        assert_eq!(target.dump_binary_path, "pg_dump");
        assert_eq!(config.retention_policy().unwrap().keep_count(), 7);
        assert_eq!(config.open_store().unwrap().naming().prefix(), "backup");
        assert_eq!(config.staging_dir(), "/tmp");
    }
}
