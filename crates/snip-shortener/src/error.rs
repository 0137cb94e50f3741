use snip_core::{CoreError, StorageError};
use thiserror::Error;

pub type Result<T> = std::result::Result<T, ShortenerError>;

#[derive(Debug, Clone, Error)]
pub enum ShortenerError {
    #[error("url shouldn't be empty")]
    EmptyTarget,
    #[error("invalid short id: {0}")]
    InvalidShortId(String),
    #[error("short url not found: {0}")]
    NotFound(String),
    #[error("short url was deleted: {0}")]
    Deleted(String),
    #[error("storage error: {0}")]
    Storage(#[from] StorageError),
}

impl From<CoreError> for ShortenerError {
    fn from(value: CoreError) -> Self {
        match value {
            CoreError::InvalidShortId(message) => Self::InvalidShortId(message),
        }
    }
}
