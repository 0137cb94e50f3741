use crate::generator::Generator;
use snip_core::short_id::{ALPHABET, LENGTH};
use snip_core::ShortId;
use std::iter;

/// Draws every character of the id uniformly from the ASCII letters.
///
/// Not suitable where ids must be unguessable.
#[derive(Debug, Clone, Copy, Default)]
pub struct RandomGenerator;

impl RandomGenerator {
    pub fn new() -> Self {
        Self
    }
}

impl Generator for RandomGenerator {
    fn generate(&self) -> ShortId {
        let id: String = iter::repeat_with(|| ALPHABET[rand::random_range(0..ALPHABET.len())] as char)
            .take(LENGTH)
            .collect();
        ShortId::new_unchecked(id)
    }
}
