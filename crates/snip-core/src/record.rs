use crate::short_id::ShortId;
use serde::{Deserialize, Serialize};

/// A stored short-link record.
///
/// Serialized as one JSON object per line by the log backend, so the field
/// names here are part of the on-disk format.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UrlRecord {
    /// Backend-local ordinal, assigned on save.
    #[serde(default)]
    pub sequence: u64,
    /// The lookup key.
    #[serde(rename = "shortID")]
    pub short_id: ShortId,
    /// The original URL that was shortened.
    pub target: String,
    /// Principal that created the record; empty for anonymous writes.
    #[serde(default)]
    pub owner: String,
    /// Soft-delete marker.
    #[serde(default)]
    pub deleted: bool,
}

impl UrlRecord {
    /// Creates a live record. The backend assigns `sequence` when it is saved.
    pub fn new(short_id: ShortId, target: impl Into<String>, owner: impl Into<String>) -> Self {
        Self {
            sequence: 0,
            short_id,
            target: target.into(),
            owner: owner.into(),
            deleted: false,
        }
    }

    pub fn is_owned_by(&self, owner: &str) -> bool {
        self.owner == owner
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn serializes_log_line_field_names() {
        let record = UrlRecord {
            sequence: 3,
            short_id: ShortId::new_unchecked("abcdEFGH"),
            target: "https://x.test".to_string(),
            owner: "u1".to_string(),
            deleted: false,
        };

        let line = serde_json::to_string(&record).unwrap();
        assert_eq!(
            line,
            r#"{"sequence":3,"shortID":"abcdEFGH","target":"https://x.test","owner":"u1","deleted":false}"#
        );
    }

    #[test]
    fn missing_optional_fields_use_defaults() {
        let record: UrlRecord =
            serde_json::from_str(r#"{"shortID":"abcdEFGH","target":"https://x.test"}"#).unwrap();

        assert_eq!(record.sequence, 0);
        assert_eq!(record.owner, "");
        assert!(!record.deleted);
    }

    #[test]
    fn ownership_is_exact_match() {
        let record = UrlRecord::new(ShortId::new_unchecked("abcdEFGH"), "https://x.test", "u1");
        assert!(record.is_owned_by("u1"));
        assert!(!record.is_owned_by("u2"));
        assert!(!record.is_owned_by(""));
    }
}
