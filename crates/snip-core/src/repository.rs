use crate::error::StorageError;
use crate::record::UrlRecord;
use crate::short_id::ShortId;
use async_trait::async_trait;
use std::time::Duration;

/// Result type for repository operations.
pub type Result<T> = std::result::Result<T, StorageError>;

/// A read-only view of a repository.
#[async_trait]
pub trait ReadRepository: Send + Sync + 'static {
    /// Retrieves the record for a given short id.
    ///
    /// Soft-deleted records are returned as well; callers inspect
    /// [`UrlRecord::deleted`]. Returns `Err(NotFound)` if the id is unknown.
    async fn get(&self, id: &ShortId) -> Result<UrlRecord>;

    /// Retrieves the record stored for an original URL.
    async fn get_by_target(&self, target: &str) -> Result<UrlRecord>;

    /// Returns every record created by `owner`, in no particular order.
    async fn find_by_owner(&self, owner: &str) -> Result<Vec<UrlRecord>>;
}

#[async_trait]
pub trait Repository: ReadRepository {
    /// Inserts a new record.
    ///
    /// Returns `Err(Conflict)` if the target is already stored, so callers can
    /// recover the existing id with [`ReadRepository::get_by_target`].
    async fn save(&self, record: UrlRecord) -> Result<()>;

    /// Inserts several records. Atomicity depends on the backend.
    async fn save_batch(&self, records: Vec<UrlRecord>) -> Result<()>;

    /// Marks the given ids as deleted.
    /// Unknown or already deleted ids are not an error.
    async fn delete_batch(&self, ids: &[ShortId]) -> Result<()>;

    /// Releases backend resources. Called once at shutdown.
    async fn close(&self) -> Result<()> {
        Ok(())
    }

    /// Liveness probe bounded by `timeout`.
    async fn health_check(&self, _timeout: Duration) -> Result<()> {
        Ok(())
    }
}
