//! File sink that hashes what it writes

use std::fs::{File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use sha2::{Digest, Sha256};

use crate::errors::{OpsError, OpsResult};

/// Writes a new file while computing its SHA-256 and length.
pub struct HashingFile {
    path: PathBuf,
    file: File,
    hasher: Sha256,
    written: u64,
}

impl HashingFile {
    /// Create `path`, failing if it already exists.
    pub fn create_new(path: &Path) -> OpsResult<Self> {
        let file = OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(path)
            .map_err(|e| OpsError::io(path, e))?;

        Ok(Self {
            path: path.to_path_buf(),
            file,
            hasher: Sha256::new(),
            written: 0,
        })
    }

    /// Flush to disk and return `(bytes written, hex sha256)`.
    pub fn finish(mut self) -> OpsResult<(u64, String)> {
        self.file.flush().map_err(|e| OpsError::io(&self.path, e))?;
        self.file.sync_all().map_err(|e| OpsError::io(&self.path, e))?;
        Ok((self.written, format!("{:x}", self.hasher.finalize())))
    }
}

impl Write for HashingFile {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let n = self.file.write(buf)?;
        self.hasher.update(&buf[..n]);
        self.written += n as u64;
        Ok(n)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.file.flush()
    }
}
