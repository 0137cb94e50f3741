use thiserror::Error;

/// Errors related to the core types of the short-link service.
pub type Result<T> = std::result::Result<T, CoreError>;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CoreError {
    #[error("invalid short id: {0}")]
    InvalidShortId(String),
}

/// Errors reported by storage backends.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StorageError {
    #[error("record not found: {0}")]
    NotFound(String),
    #[error("target already stored: {0}")]
    Conflict(String),
    #[error("short id already taken: {0}")]
    IdTaken(String),
    #[error("storage backend unavailable: {0}")]
    Unavailable(String),
    #[error("storage operation timed out: {0}")]
    Timeout(String),
    #[error("storage query failed: {0}")]
    Query(String),
    #[error("stored data is invalid: {0}")]
    InvalidData(String),
    #[error("storage i/o failed: {0}")]
    Io(String),
    #[error("storage operation failed: {0}")]
    Operation(String),
}

impl StorageError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, StorageError::NotFound(_))
    }

    /// Whether the write collided with an already stored target.
    pub fn is_conflict(&self) -> bool {
        matches!(self, StorageError::Conflict(_))
    }
}
