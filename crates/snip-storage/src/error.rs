pub use snip_core::error::StorageError;

/// Result type for repository operations.
pub type Result<T> = std::result::Result<T, StorageError>;

pub(crate) fn map_io_error(err: std::io::Error) -> StorageError {
    use std::io::ErrorKind;

    let message = err.to_string();

    match err.kind() {
        ErrorKind::TimedOut => StorageError::Timeout(message),
        ErrorKind::NotFound | ErrorKind::PermissionDenied => StorageError::Unavailable(message),
        ErrorKind::InvalidData | ErrorKind::UnexpectedEof => StorageError::InvalidData(message),
        _ => StorageError::Io(message),
    }
}

pub(crate) fn map_json_error(err: serde_json::Error) -> StorageError {
    if err.is_io() {
        return StorageError::Io(err.to_string());
    }
    StorageError::InvalidData(err.to_string())
}
