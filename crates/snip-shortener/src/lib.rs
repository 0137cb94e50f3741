//! URL shortener service.
//!
//! This crate provides the shortener service, the owner-filtered bulk
//! deletion pipeline and the id generator. Storage types are re-exported
//! from `snip_core`.

pub mod deletion;
pub mod error;
pub mod generator;
pub mod service;
pub mod shortener;

pub use deletion::{
    cancellation, CancelHandle, Cancellation, DeletionOutcome, DeletionPipeline, DeletionTicket,
    WORKER_COUNT,
};
pub use error::ShortenerError;
pub use generator::{Generator, RandomGenerator};
pub use service::ShortenerService;
pub use shortener::{BatchItem, BatchShortened, Shortened, Shortener, UserUrl};
pub use snip_core::{ReadRepository, Repository, ShortId, StorageError, UrlRecord};
