//! Secure key/value persistence.
//!
//! [`SecretStore`] is the capability the profile store is written against.
//! [`FileVault`] keeps one owner-only file per key inside an owner-only
//! directory; each write is an atomic rename.

use std::fs;
use std::io;
use std::path::PathBuf;

use crate::fs_utils::{ensure_private_dir, write_private};

/// Opaque key -> bytes storage scoped to this application
pub trait SecretStore: Send + Sync {
    fn set(&self, key: &str, data: &[u8]) -> io::Result<()>;
    fn keys(&self) -> io::Result<Vec<String>>;
    fn get(&self, key: &str) -> io::Result<Option<Vec<u8>>>;
    /// Removing an absent key succeeds
    fn delete(&self, key: &str) -> io::Result<()>;
}

const RECORD_EXTENSION: &str = "json";

#[derive(Debug, Clone)]
pub struct FileVault {
    dir: PathBuf,
}

impl FileVault {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    fn record_path(&self, key: &str) -> io::Result<PathBuf> {
        let valid = !key.is_empty()
            && key
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
        if !valid {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("invalid vault key: {:?}", key),
            ));
        }
        Ok(self.dir.join(format!("{}.{}", key, RECORD_EXTENSION)))
    }
}

impl SecretStore for FileVault {
    fn set(&self, key: &str, data: &[u8]) -> io::Result<()> {
        let path = self.record_path(key)?;
        ensure_private_dir(&self.dir)?;
        write_private(&path, data)
    }

    fn keys(&self) -> io::Result<Vec<String>> {
        if !self.dir.exists() {
            return Ok(Vec::new());
        }

        let mut keys = Vec::new();
        for entry in fs::read_dir(&self.dir)? {
            let path = entry?.path();
            if path.extension().and_then(|e| e.to_str()) != Some(RECORD_EXTENSION) {
                continue;
            }
            if let Some(stem) = path.file_stem().and_then(|s| s.to_str())
                && !stem.starts_with('.')
            {
                keys.push(stem.to_string());
            }
        }
        keys.sort();
        Ok(keys)
    }

    fn get(&self, key: &str) -> io::Result<Option<Vec<u8>>> {
        match fs::read(self.record_path(key)?) {
            Ok(data) => Ok(Some(data)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e),
        }
    }

    fn delete(&self, key: &str) -> io::Result<()> {
        match fs::remove_file(self.record_path(key)?) {
            Err(e) if e.kind() != io::ErrorKind::NotFound => Err(e),
            _ => Ok(()),
        }
    }
}
