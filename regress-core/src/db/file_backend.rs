//! Directory storage backend
//!
//! Each key is one JSON file inside the data directory. Writes go to a
//! temporary file first and are renamed into place, so a failed write never
//! leaves a half-written aggregate behind.

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use super::traits::{check_quota, BackendType, DocumentBackend, DEFAULT_QUOTA_BYTES};
use crate::error::{StoreError, StoreResult};

pub struct FileBackend {
    dir: PathBuf,
    quota_bytes: usize,
}

impl FileBackend {
    /// Creates a backend rooted at `dir`; the directory is created on first write
    pub fn new<P: AsRef<Path>>(dir: P) -> Self {
        Self::with_quota(dir, DEFAULT_QUOTA_BYTES)
    }

    pub fn with_quota<P: AsRef<Path>>(dir: P, quota_bytes: usize) -> Self {
        Self {
            dir: dir.as_ref().to_path_buf(),
            quota_bytes,
        }
    }

    fn key_path(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{}.json", key))
    }

    /// Bytes used by every key except `key`
    fn used_by_others(&self, key: &str) -> usize {
        let own = self.key_path(key);
        let Ok(entries) = fs::read_dir(&self.dir) else {
            return 0;
        };
        entries
            .filter_map(|e| e.ok())
            .map(|e| e.path())
            .filter(|p| p != &own && p.extension().and_then(|e| e.to_str()) == Some("json"))
            .filter_map(|p| fs::metadata(p).ok())
            .map(|m| m.len() as usize)
            .sum()
    }
}

impl DocumentBackend for FileBackend {
    fn backend_type(&self) -> BackendType {
        BackendType::File
    }

    fn path(&self) -> &Path {
        &self.dir
    }

    fn quota_bytes(&self) -> usize {
        self.quota_bytes
    }

    fn read_key(&self, key: &str) -> StoreResult<Option<String>> {
        match fs::read_to_string(self.key_path(key)) {
            Ok(raw) => Ok(Some(raw)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(StoreError::StorageReadFailed(format!(
                "{:?}: {}",
                self.key_path(key),
                e
            ))),
        }
    }

    fn write_key(&self, key: &str, value: &str) -> StoreResult<()> {
        check_quota(self.used_by_others(key), value.len(), self.quota_bytes)?;

        let write_failed = |e: std::io::Error| StoreError::StorageWriteFailed(format!("{:?}: {}", self.dir, e));
        fs::create_dir_all(&self.dir).map_err(write_failed)?;

        let target = self.key_path(key);
        let tmp = target.with_extension("json.tmp");
        fs::write(&tmp, value).map_err(write_failed)?;
        fs::rename(&tmp, &target).map_err(write_failed)?;
        Ok(())
    }

    fn remove_key(&self, key: &str) -> StoreResult<()> {
        match fs::remove_file(self.key_path(key)) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(StoreError::StorageWriteFailed(e.to_string())),
        }
    }
}
