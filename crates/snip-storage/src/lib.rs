//! Storage backends for the snip short-link service.
//!
//! Three interchangeable implementations of [`snip_core::Repository`]:
//!
//! - [`InMemoryRepository`]: DashMap-backed, for development and tests.
//! - [`LogRepository`]: append-only newline-delimited JSON file.
//! - [`PostgresRepository`]: a `urls` table managed through `sqlx`.
//!
//! [`Storage`] picks one of them from a [`StorageConfig`] and is what the
//! rest of the service holds on to.

pub mod error;
pub mod log;
pub mod memory;
pub mod postgres;
pub mod storage;

pub use error::{Result, StorageError};
pub use log::LogRepository;
pub use memory::InMemoryRepository;
pub use postgres::PostgresRepository;
pub use snip_core::{ReadRepository, Repository, ShortId, UrlRecord};
pub use storage::{BackendKind, Storage, StorageConfig};
