//! Core types and traits for the snip short-link service.
//!
//! This crate provides the record model, the short id type and the
//! repository contract shared by the storage backends and the shortener.

pub mod error;
pub mod record;
pub mod repository;
pub mod short_id;

pub use error::{CoreError, StorageError};
pub use record::UrlRecord;
pub use repository::{ReadRepository, Repository};
pub use short_id::ShortId;
