use crate::error::{Result, StorageError};
use async_trait::async_trait;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use snip_core::{ReadRepository, Repository, ShortId, UrlRecord};
use std::sync::atomic::{AtomicU64, Ordering};

/// In-memory implementation of the repository contract using DashMap.
///
/// Records are keyed by short id. A second map indexes targets so the
/// uniqueness check and the insert happen under the same shard lock; the
/// records map is only ever locked after the index, never the other way
/// round.
///
/// Intended for development and tests: owner lookups scan every record.
#[derive(Debug, Default)]
pub struct InMemoryRepository {
    records: DashMap<String, UrlRecord>,
    targets: DashMap<String, ShortId>,
    sequence: AtomicU64,
}

impl InMemoryRepository {
    /// Creates a new in-memory repository.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a new in-memory repository with the specified capacity.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            records: DashMap::with_capacity(capacity),
            targets: DashMap::with_capacity(capacity),
            sequence: AtomicU64::new(0),
        }
    }

    /// Number of stored records, deleted ones included.
    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

#[async_trait]
impl ReadRepository for InMemoryRepository {
    async fn get(&self, id: &ShortId) -> Result<UrlRecord> {
        self.records
            .get(id.as_str())
            .map(|entry| entry.value().clone())
            .ok_or_else(|| StorageError::NotFound(id.to_string()))
    }

    async fn get_by_target(&self, target: &str) -> Result<UrlRecord> {
        let id = self
            .targets
            .get(target)
            .map(|entry| entry.value().clone())
            .ok_or_else(|| StorageError::NotFound(target.to_string()))?;

        self.get(&id).await
    }

    async fn find_by_owner(&self, owner: &str) -> Result<Vec<UrlRecord>> {
        Ok(self
            .records
            .iter()
            .filter(|entry| entry.is_owned_by(owner))
            .map(|entry| entry.value().clone())
            .collect())
    }
}

#[async_trait]
impl Repository for InMemoryRepository {
    async fn save(&self, mut record: UrlRecord) -> Result<()> {
        let target_slot = match self.targets.entry(record.target.clone()) {
            Entry::Occupied(_) => return Err(StorageError::Conflict(record.target)),
            Entry::Vacant(slot) => slot,
        };

        match self.records.entry(record.short_id.as_str().to_owned()) {
            Entry::Occupied(_) => Err(StorageError::IdTaken(record.short_id.to_string())),
            Entry::Vacant(slot) => {
                record.sequence = self.sequence.fetch_add(1, Ordering::SeqCst) + 1;
                target_slot.insert(record.short_id.clone());
                slot.insert(record);
                Ok(())
            }
        }
    }

    async fn save_batch(&self, records: Vec<UrlRecord>) -> Result<()> {
        // No rollback: records saved before a failure stay stored.
        for record in records {
            self.save(record).await?;
        }
        Ok(())
    }

    async fn delete_batch(&self, ids: &[ShortId]) -> Result<()> {
        for id in ids {
            if let Some(mut record) = self.records.get_mut(id.as_str()) {
                record.deleted = true;
            }
        }
        Ok(())
    }
}
