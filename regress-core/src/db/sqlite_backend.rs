//! SQLite storage backend
//!
//! This backend keeps every key as one row of a `kv` table inside a single
//! SQLite database file.

use rusqlite::{params, Connection, ErrorCode, OptionalExtension};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

use super::traits::{check_quota, BackendType, DocumentBackend, DEFAULT_QUOTA_BYTES};
use crate::error::{StoreError, StoreResult};

/// Current schema version, stored in `PRAGMA user_version`
const SCHEMA_VERSION: i32 = 1;

pub struct SqliteBackend {
    path: PathBuf,
    conn: Mutex<Connection>,
    quota_bytes: usize,
}

impl SqliteBackend {
    /// Opens (or creates) the database file
    pub fn new<P: AsRef<Path>>(path: P) -> StoreResult<Self> {
        Self::with_quota(path, DEFAULT_QUOTA_BYTES)
    }

    pub fn with_quota<P: AsRef<Path>>(path: P, quota_bytes: usize) -> StoreResult<Self> {
        let path = path.as_ref().to_path_buf();

        // Create parent directories if needed
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| StoreError::StorageWriteFailed(e.to_string()))?;
        }

        let conn = Connection::open(&path)?;
        let backend = Self {
            path,
            conn: Mutex::new(conn),
            quota_bytes,
        };

        backend.init_schema()?;
        Ok(backend)
    }

    fn conn(&self) -> StoreResult<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| StoreError::StorageWriteFailed("database connection poisoned".to_string()))
    }

    /// Initialize the database schema
    fn init_schema(&self) -> StoreResult<()> {
        let conn = self.conn()?;

        let current_version: i32 = conn.query_row("PRAGMA user_version", [], |row| row.get(0))?;

        if current_version == 0 {
            conn.execute_batch(
                "CREATE TABLE IF NOT EXISTS kv (
                    key   TEXT PRIMARY KEY NOT NULL,
                    value TEXT NOT NULL
                );",
            )?;
            conn.pragma_update(None, "user_version", SCHEMA_VERSION)?;
        } else if current_version > SCHEMA_VERSION {
            return Err(StoreError::StorageReadCorrupt(format!(
                "Database schema version {} is newer than supported version {}",
                current_version, SCHEMA_VERSION
            )));
        }

        Ok(())
    }
}

/// A full disk surfaces the same way as an exceeded quota
fn map_write_error(e: rusqlite::Error, size: usize, quota: usize) -> StoreError {
    match e.sqlite_error_code() {
        Some(ErrorCode::DiskFull) => StoreError::StorageQuotaExceeded { size, quota },
        _ => StoreError::StorageWriteFailed(e.to_string()),
    }
}

impl DocumentBackend for SqliteBackend {
    fn backend_type(&self) -> BackendType {
        BackendType::Sqlite
    }

    fn path(&self) -> &Path {
        &self.path
    }

    fn quota_bytes(&self) -> usize {
        self.quota_bytes
    }

    fn read_key(&self, key: &str) -> StoreResult<Option<String>> {
        let conn = self.conn()?;
        conn.query_row("SELECT value FROM kv WHERE key = ?1", params![key], |row| row.get(0))
            .optional()
            .map_err(|e| StoreError::StorageReadFailed(e.to_string()))
    }

    fn write_key(&self, key: &str, value: &str) -> StoreResult<()> {
        let conn = self.conn()?;

        let used: i64 = conn.query_row(
            "SELECT COALESCE(SUM(LENGTH(CAST(value AS BLOB))), 0) FROM kv WHERE key != ?1",
            params![key],
            |row| row.get(0),
        )?;
        check_quota(used.max(0) as usize, value.len(), self.quota_bytes)?;

        conn.execute(
            "INSERT INTO kv (key, value) VALUES (?1, ?2)
             ON CONFLICT(key) DO UPDATE SET value = excluded.value",
            params![key, value],
        )
        .map_err(|e| map_write_error(e, used.max(0) as usize + value.len(), self.quota_bytes))?;
        Ok(())
    }

    fn remove_key(&self, key: &str) -> StoreResult<()> {
        let conn = self.conn()?;
        conn.execute("DELETE FROM kv WHERE key = ?1", params![key])?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::traits::DATA_KEY;
    use crate::models::{AppData, Folder, Script};
    use tempfile::NamedTempFile;

    #[test]
    fn test_sqlite_backend_create_and_load() {
        let temp_file = NamedTempFile::with_suffix(".db").unwrap();
        let backend = SqliteBackend::new(temp_file.path()).unwrap();

        assert!(!backend.exists());
        backend.create_if_not_exists().unwrap();

        let data = backend.load();
        assert_eq!(data.users.len(), 2);
        assert!(data.folders.is_empty());
    }

    #[test]
    fn test_sqlite_backend_save_and_load() {
        let temp_file = NamedTempFile::with_suffix(".db").unwrap();
        let backend = SqliteBackend::new(temp_file.path()).unwrap();

        let mut data = AppData::new();
        data.add_folder(Folder::new("Payments", None));
        data.add_script(Script::new("TC-1", "Card auth", "s1", "Payments > Cards"));
        backend.save(&data).unwrap();

        // A fresh connection sees the same state
        drop(backend);
        let reopened = SqliteBackend::new(temp_file.path()).unwrap();
        assert_eq!(reopened.load(), data);
    }

    #[test]
    fn test_sqlite_quota() {
        let temp_file = NamedTempFile::with_suffix(".db").unwrap();
        let backend = SqliteBackend::with_quota(temp_file.path(), 1024).unwrap();
        backend.save(&AppData::new()).unwrap();

        let mut big = AppData::new();
        big.add_folder(Folder::new("x".repeat(2000), None));
        assert!(matches!(
            backend.save(&big),
            Err(StoreError::StorageQuotaExceeded { .. })
        ));
        assert_eq!(backend.load(), AppData::new());
    }

    #[test]
    fn test_sqlite_session_round_trip() {
        let temp_file = NamedTempFile::with_suffix(".db").unwrap();
        let backend = SqliteBackend::new(temp_file.path()).unwrap();

        assert!(backend.authenticate("user01", "user01").unwrap().is_some());
        assert_eq!(backend.current_user().unwrap().username, "user01");
        backend.logout().unwrap();
        assert!(backend.current_user().is_none());
    }

    #[test]
    fn test_sqlite_corrupt_value_falls_back() {
        let temp_file = NamedTempFile::with_suffix(".db").unwrap();
        let backend = SqliteBackend::new(temp_file.path()).unwrap();
        backend.write_key(DATA_KEY, "42").unwrap();

        assert_eq!(backend.load(), AppData::new());
    }
}
