//! Storage layer for the Regression Assistant
//!
//! This module provides a trait-based abstraction over the local key-value
//! medium that holds the aggregate, so the same accessors work on a plain
//! directory of JSON files or on a SQLite database.

mod file_backend;
mod migration;
mod sqlite_backend;
mod traits;

pub use file_backend::FileBackend;
pub use migration::{export_to_json, import_from_json, migrate};
pub use sqlite_backend::SqliteBackend;
pub use traits::{
    BackendType, DocumentBackend, StoreStats, DATA_KEY, DEFAULT_QUOTA_BYTES, SESSION_KEY,
};

use std::path::Path;

use crate::error::StoreResult;

/// Infers the backend from the path: `.db`/`.sqlite` files use SQLite,
/// anything else is treated as a data directory
pub fn infer_backend_type(path: &Path) -> BackendType {
    match path.extension().and_then(|e| e.to_str()) {
        Some("db") | Some("sqlite") | Some("sqlite3") => BackendType::Sqlite,
        _ => BackendType::File,
    }
}

/// Creates a storage backend based on the path or explicit type
pub fn create_backend(
    path: &Path,
    backend_type: Option<BackendType>,
    quota_bytes: usize,
) -> StoreResult<Box<dyn DocumentBackend>> {
    let bt = backend_type.unwrap_or_else(|| infer_backend_type(path));
    tracing::debug!(path = %path.display(), backend = %bt, "opening store");

    match bt {
        BackendType::File => Ok(Box::new(FileBackend::with_quota(path, quota_bytes))),
        BackendType::Sqlite => Ok(Box::new(SqliteBackend::with_quota(path, quota_bytes)?)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn test_infer_backend_type() {
        assert_eq!(infer_backend_type(&PathBuf::from("data.db")), BackendType::Sqlite);
        assert_eq!(infer_backend_type(&PathBuf::from("a/b.sqlite3")), BackendType::Sqlite);
        assert_eq!(infer_backend_type(&PathBuf::from("regression-assistant")), BackendType::File);
    }

    #[test]
    fn test_create_backend_explicit_type() {
        let temp_dir = tempfile::TempDir::new().unwrap();
        let backend = create_backend(
            &temp_dir.path().join("store"),
            Some(BackendType::Sqlite),
            DEFAULT_QUOTA_BYTES,
        )
        .unwrap();
        assert_eq!(backend.backend_type(), BackendType::Sqlite);
        assert!(backend.load().folders.is_empty());
    }
}
