use crate::error::Result;
use crate::{InMemoryRepository, LogRepository, PostgresRepository};
use async_trait::async_trait;
use snip_core::{ReadRepository, Repository, ShortId, UrlRecord};
use std::fmt::{Display, Formatter};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;
use typed_builder::TypedBuilder;

pub const DEFAULT_MAX_CONNECTIONS: u32 = 10;

/// Where records are persisted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendKind {
    Memory,
    Log,
    Postgres,
}

impl Display for BackendKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            BackendKind::Memory => write!(f, "memory"),
            BackendKind::Log => write!(f, "log"),
            BackendKind::Postgres => write!(f, "postgres"),
        }
    }
}

/// Inputs for picking a backend.
///
/// A database DSN wins over a file path, and a file path wins over the
/// in-memory default. Blank values count as absent.
#[derive(Debug, Clone, TypedBuilder)]
pub struct StorageConfig {
    #[builder(default, setter(strip_option, into))]
    pub database_dsn: Option<String>,
    #[builder(default, setter(strip_option, into))]
    pub file_path: Option<PathBuf>,
    #[builder(default = DEFAULT_MAX_CONNECTIONS)]
    pub max_connections: u32,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self::builder().build()
    }
}

impl StorageConfig {
    pub fn backend_kind(&self) -> BackendKind {
        if self.dsn().is_some() {
            BackendKind::Postgres
        } else if self.path().is_some() {
            BackendKind::Log
        } else {
            BackendKind::Memory
        }
    }

    fn dsn(&self) -> Option<&str> {
        self.database_dsn
            .as_deref()
            .map(str::trim)
            .filter(|dsn| !dsn.is_empty())
    }

    fn path(&self) -> Option<&PathBuf> {
        self.file_path
            .as_ref()
            .filter(|path| !path.as_os_str().is_empty())
    }
}

/// The single storage entry point of the process.
///
/// Owns exactly one backend, chosen when the storage is opened, and exposes
/// the repository contract by delegating to it. Clones share that backend.
#[derive(Clone)]
pub struct Storage {
    backend: Arc<dyn Repository>,
    kind: BackendKind,
}

impl std::fmt::Debug for Storage {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Storage").field("kind", &self.kind).finish()
    }
}

impl Storage {
    /// Opens the backend selected by `config`.
    ///
    /// Fails if that backend cannot be initialized, e.g. the database is
    /// unreachable, the schema cannot be created or the log file cannot be
    /// opened. There is no fallback to another backend.
    pub async fn open(config: &StorageConfig) -> Result<Self> {
        let kind = config.backend_kind();

        let backend: Arc<dyn Repository> = match kind {
            BackendKind::Postgres => {
                let dsn = config.dsn().unwrap_or_default();
                Arc::new(PostgresRepository::connect(dsn, config.max_connections).await?)
            }
            BackendKind::Log => {
                let path = config.path().cloned().unwrap_or_default();
                Arc::new(LogRepository::open(path).await?)
            }
            BackendKind::Memory => Arc::new(InMemoryRepository::new()),
        };

        info!(backend = %kind, "storage opened");

        Ok(Self { backend, kind })
    }

    /// An empty in-memory storage.
    pub fn memory() -> Self {
        Self {
            backend: Arc::new(InMemoryRepository::new()),
            kind: BackendKind::Memory,
        }
    }

    pub fn kind(&self) -> BackendKind {
        self.kind
    }
}

#[async_trait]
impl ReadRepository for Storage {
    async fn get(&self, id: &ShortId) -> Result<UrlRecord> {
        self.backend.get(id).await
    }

    async fn get_by_target(&self, target: &str) -> Result<UrlRecord> {
        self.backend.get_by_target(target).await
    }

    async fn find_by_owner(&self, owner: &str) -> Result<Vec<UrlRecord>> {
        self.backend.find_by_owner(owner).await
    }
}

#[async_trait]
impl Repository for Storage {
    async fn save(&self, record: UrlRecord) -> Result<()> {
        self.backend.save(record).await
    }

    async fn save_batch(&self, records: Vec<UrlRecord>) -> Result<()> {
        self.backend.save_batch(records).await
    }

    async fn delete_batch(&self, ids: &[ShortId]) -> Result<()> {
        self.backend.delete_batch(ids).await
    }

    async fn close(&self) -> Result<()> {
        info!(backend = %self.kind, "closing storage");
        self.backend.close().await
    }

    async fn health_check(&self, timeout: Duration) -> Result<()> {
        self.backend.health_check(timeout).await
    }
}
