use crate::error::CoreError;
use serde::{Deserialize, Serialize};
use std::fmt::Display;

/// Symbols a short identifier is drawn from.
pub const ALPHABET: &[u8; 52] = b"abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXYZ";

/// Length of every short identifier.
pub const LENGTH: usize = 8;

/// The lookup key of a stored record.
///
/// Identifiers are exactly 8 characters from [`ALPHABET`]. Uniqueness is not
/// guaranteed by construction; backends enforce it when a record is saved.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ShortId(String);

impl ShortId {
    /// Creates a new `ShortId` after validating the input.
    pub fn new(id: impl Into<String>) -> Result<Self, CoreError> {
        let id = id.into();
        Self::validate(&id)?;
        Ok(Self(id))
    }

    /// Creates a `ShortId` without validation.
    ///
    /// Use this only for identifiers produced by trusted internal sources,
    /// such as a generator or a row read back from storage.
    pub fn new_unchecked(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Parses either a bare identifier or a short URL built by [`ShortId::to_url`]
    /// with the same `base_url`.
    pub fn from_url(base_url: &str, input: &str) -> Result<Self, CoreError> {
        let input = input.trim();
        let prefix = base_url.trim_end_matches('/');

        let id = input
            .strip_prefix(prefix)
            .and_then(|rest| rest.strip_prefix('/'))
            .filter(|_| !prefix.is_empty())
            .unwrap_or(input);

        Self::new(id)
    }

    /// Generates the full short URL based on the provided base URL.
    pub fn to_url(&self, base_url: &str) -> String {
        format!("{}/{}", base_url.trim_end_matches('/'), self.0)
    }

    /// Returns the identifier as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    fn validate(id: &str) -> Result<(), CoreError> {
        if id.len() != LENGTH {
            return Err(CoreError::InvalidShortId(format!(
                "length must be {}, got {}",
                LENGTH,
                id.len()
            )));
        }

        if !id.bytes().all(|b| ALPHABET.contains(&b)) {
            return Err(CoreError::InvalidShortId(format!(
                "must contain only ASCII letters: '{}'",
                id
            )));
        }

        Ok(())
    }
}

impl AsRef<str> for ShortId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl Display for ShortId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn valid_ids() {
        assert!(ShortId::new("abcdEFGH").is_ok());
        assert!(ShortId::new("ZZZZZZZZ").is_ok());
    }

    #[test]
    fn wrong_length() {
        assert!(ShortId::new("abcdEFG").is_err());
        assert!(ShortId::new("abcdEFGHI").is_err());
        assert!(ShortId::new("").is_err());
    }

    #[test]
    fn invalid_characters() {
        assert!(ShortId::new("abcd1234").is_err());
        assert!(ShortId::new("abcd-EFG").is_err());
        assert!(ShortId::new("abcdéFG").is_err());
    }

    #[test]
    fn to_url_trims_trailing_slash() {
        let id = ShortId::new("abcdEFGH").unwrap();
        assert_eq!(id.to_url("http://localhost:8080"), "http://localhost:8080/abcdEFGH");
        assert_eq!(id.to_url("http://localhost:8080/"), "http://localhost:8080/abcdEFGH");
    }

    #[test]
    fn from_url_accepts_prefixed_and_bare_input() {
        let base = "http://localhost:8080";

        let prefixed = ShortId::from_url(base, "http://localhost:8080/abcdEFGH").unwrap();
        let bare = ShortId::from_url(base, "abcdEFGH").unwrap();

        assert_eq!(prefixed, bare);
        assert_eq!(prefixed.as_str(), "abcdEFGH");
    }

    #[test]
    fn from_url_rejects_foreign_prefix() {
        assert!(ShortId::from_url("http://localhost:8080", "http://other.test/abcdEFGH").is_err());
    }

    #[test]
    fn from_url_with_empty_base() {
        assert_eq!(ShortId::from_url("", "abcdEFGH").unwrap().as_str(), "abcdEFGH");
    }
}
