use crate::deletion::DeletionTicket;
use crate::error::Result;
use async_trait::async_trait;
use snip_core::ShortId;
use std::time::Duration;

/// Result of shortening one URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Shortened {
    pub id: ShortId,
    pub short_url: String,
    /// `false` when the URL was already stored and the existing id is returned.
    pub created: bool,
}

/// One entry of a batch shorten request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchItem {
    pub correlation_id: String,
    pub target: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchShortened {
    pub correlation_id: String,
    pub short_url: String,
}

/// A live short URL created by some owner.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserUrl {
    pub short_url: String,
    pub original_url: String,
}

#[async_trait]
pub trait Shortener: Send + Sync + 'static {
    /// Shortens `target` on behalf of `owner`. An empty owner is anonymous.
    async fn shorten(&self, target: &str, owner: &str) -> Result<Shortened>;

    /// Shortens every item in one storage call, keeping the correlation ids.
    async fn shorten_batch(&self, items: Vec<BatchItem>, owner: &str)
        -> Result<Vec<BatchShortened>>;

    /// Resolves a short id or short URL to its original URL.
    async fn expand(&self, id: &str) -> Result<String>;

    /// Lists the live short URLs created by `owner`.
    async fn user_urls(&self, owner: &str) -> Result<Vec<UserUrl>>;

    /// Deletes the ids among `ids` that belong to `owner`.
    async fn delete_urls(&self, owner: &str, ids: Vec<String>) -> DeletionTicket;

    /// Checks that the storage is reachable within `timeout`.
    async fn ping(&self, timeout: Duration) -> Result<()>;
}
