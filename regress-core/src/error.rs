//! Error types shared by the store, the workflow operations and the CLI

use thiserror::Error;

/// Errors surfaced by store and workflow operations
///
/// Storage kinds are kept distinct so callers can tailor the message, e.g.
/// suggest removing screenshots when the quota is exceeded.
#[derive(Error, Debug)]
pub enum StoreError {
    /// User input rejected before any state was touched
    #[error("{0}")]
    Validation(String),

    /// A referenced entity does not exist
    #[error("{kind} not found: {id}")]
    NotFound { kind: &'static str, id: String },

    /// The serialized aggregate does not fit in the configured quota
    #[error(
        "Storage quota exceeded ({size} bytes, limit {quota}). Please clear some data or use fewer/smaller screenshots."
    )]
    StorageQuotaExceeded { size: usize, quota: usize },

    /// Any other failure while persisting
    #[error("Failed to write storage: {0}")]
    StorageWriteFailed(String),

    /// Persisted state was read but could not be decoded
    #[error("Stored data is unreadable: {0}")]
    StorageReadCorrupt(String),

    /// The storage medium itself failed while reading
    #[error("Failed to read storage: {0}")]
    StorageReadFailed(String),
}

impl StoreError {
    pub fn validation(msg: impl Into<String>) -> Self {
        StoreError::Validation(msg.into())
    }

    pub fn not_found(kind: &'static str, id: impl Into<String>) -> Self {
        StoreError::NotFound {
            kind,
            id: id.into(),
        }
    }

    /// Returns true for errors that originate in the storage medium
    pub fn is_storage(&self) -> bool {
        matches!(
            self,
            StoreError::StorageQuotaExceeded { .. }
                | StoreError::StorageWriteFailed(_)
                | StoreError::StorageReadCorrupt(_)
                | StoreError::StorageReadFailed(_)
        )
    }
}

impl From<rusqlite::Error> for StoreError {
    fn from(e: rusqlite::Error) -> Self {
        StoreError::StorageWriteFailed(e.to_string())
    }
}

pub type StoreResult<T> = std::result::Result<T, StoreError>;
