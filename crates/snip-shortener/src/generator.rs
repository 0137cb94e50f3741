pub mod random;

use snip_core::ShortId;

pub use random::RandomGenerator;

/// Trait for generating short ids.
///
/// Implementations are pure generators that don't interact with storage, so
/// uniqueness is only checked when the record is saved.
pub trait Generator: Send + Sync + 'static {
    fn generate(&self) -> ShortId;
}
