use crate::deletion::{DeletionPipeline, DeletionTicket};
use crate::error::{Result, ShortenerError};
use crate::generator::Generator;
use crate::shortener::{BatchItem, BatchShortened, Shortened, Shortener, UserUrl};
use async_trait::async_trait;
use snip_core::{Repository, ShortId, StorageError, UrlRecord};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// How many generated ids `shorten` tries before giving up on collisions.
pub const MAX_ID_ATTEMPTS: usize = 3;

/// The [`Shortener`] on top of a [`Repository`] and a [`Generator`].
///
/// The generator does not look at the storage, so an id collision is only
/// detected on save and answered with a fresh id.
#[derive(Debug)]
pub struct ShortenerService<R, G> {
    repository: Arc<R>,
    generator: Arc<G>,
    base_url: String,
    deletion: DeletionPipeline<R>,
}

impl<R, G> Clone for ShortenerService<R, G> {
    fn clone(&self) -> Self {
        Self {
            repository: Arc::clone(&self.repository),
            generator: Arc::clone(&self.generator),
            base_url: self.base_url.clone(),
            deletion: self.deletion.clone(),
        }
    }
}

impl<R: Repository, G: Generator> ShortenerService<R, G> {
    pub fn new(repository: R, generator: G, base_url: impl Into<String>) -> Self {
        let repository = Arc::new(repository);
        let base_url = base_url.into().trim_end_matches('/').to_string();
        let deletion = DeletionPipeline::new(Arc::clone(&repository), base_url.clone());

        Self {
            repository,
            generator: Arc::new(generator),
            base_url,
            deletion,
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn repository(&self) -> &R {
        &self.repository
    }

    fn short_url(&self, id: &ShortId) -> String {
        id.to_url(&self.base_url)
    }
}

#[async_trait]
impl<R: Repository, G: Generator> Shortener for ShortenerService<R, G> {
    async fn shorten(&self, target: &str, owner: &str) -> Result<Shortened> {
        if target.is_empty() {
            return Err(ShortenerError::EmptyTarget);
        }

        let mut last_error = None;
        for attempt in 1..=MAX_ID_ATTEMPTS {
            let id = self.generator.generate();
            let record = UrlRecord::new(id.clone(), target, owner);

            match self.repository.save(record).await {
                Ok(()) => {
                    info!(id = %id, owner = %owner, "short url created");
                    return Ok(Shortened {
                        short_url: self.short_url(&id),
                        id,
                        created: true,
                    });
                }
                Err(StorageError::Conflict(_)) => {
                    let existing = self.repository.get_by_target(target).await?;
                    debug!(id = %existing.short_id, "url already shortened");
                    return Ok(Shortened {
                        short_url: self.short_url(&existing.short_id),
                        id: existing.short_id,
                        created: false,
                    });
                }
                Err(err @ StorageError::IdTaken(_)) => {
                    warn!(id = %id, attempt, "generated id already taken");
                    last_error = Some(err);
                }
                Err(err) => return Err(err.into()),
            }
        }

        Err(last_error
            .unwrap_or_else(|| StorageError::Operation("no id attempts were made".to_string()))
            .into())
    }

    async fn shorten_batch(
        &self,
        items: Vec<BatchItem>,
        owner: &str,
    ) -> Result<Vec<BatchShortened>> {
        if items.is_empty() {
            return Ok(Vec::new());
        }
        if items.iter().any(|item| item.target.is_empty()) {
            return Err(ShortenerError::EmptyTarget);
        }

        let mut records = Vec::with_capacity(items.len());
        let mut shortened = Vec::with_capacity(items.len());
        for item in items {
            let id = self.generator.generate();
            shortened.push(BatchShortened {
                correlation_id: item.correlation_id,
                short_url: self.short_url(&id),
            });
            records.push(UrlRecord::new(id, item.target, owner));
        }

        self.repository.save_batch(records).await?;
        info!(count = shortened.len(), owner = %owner, "short url batch created");

        Ok(shortened)
    }

    async fn expand(&self, id: &str) -> Result<String> {
        let id = ShortId::from_url(&self.base_url, id)?;

        let record = match self.repository.get(&id).await {
            Ok(record) => record,
            Err(err) if err.is_not_found() => {
                return Err(ShortenerError::NotFound(id.to_string()));
            }
            Err(err) => return Err(err.into()),
        };

        if record.deleted {
            return Err(ShortenerError::Deleted(id.to_string()));
        }

        Ok(record.target)
    }

    async fn user_urls(&self, owner: &str) -> Result<Vec<UserUrl>> {
        let records = self.repository.find_by_owner(owner).await?;

        Ok(records
            .into_iter()
            .filter(|record| !record.deleted)
            .map(|record| UserUrl {
                short_url: self.short_url(&record.short_id),
                original_url: record.target,
            })
            .collect())
    }

    async fn delete_urls(&self, owner: &str, ids: Vec<String>) -> DeletionTicket {
        self.deletion.delete(owner, ids).await
    }

    async fn ping(&self, timeout: Duration) -> Result<()> {
        Ok(self.repository.health_check(timeout).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::deletion::DeletionOutcome;
    use crate::generator::RandomGenerator;
    use snip_storage::InMemoryRepository;
    use std::collections::VecDeque;
    use std::sync::Mutex;

    const BASE_URL: &str = "http://localhost:8080";

    /// Hands out a fixed list of ids, then falls back to random ones.
    struct ScriptedGenerator {
        ids: Mutex<VecDeque<&'static str>>,
    }

    impl ScriptedGenerator {
        fn new(ids: &[&'static str]) -> Self {
            Self {
                ids: Mutex::new(ids.iter().copied().collect()),
            }
        }
    }

    impl Generator for ScriptedGenerator {
        fn generate(&self) -> ShortId {
            match self.ids.lock().unwrap().pop_front() {
                Some(id) => ShortId::new_unchecked(id),
                None => RandomGenerator.generate(),
            }
        }
    }

    fn test_service() -> ShortenerService<InMemoryRepository, RandomGenerator> {
        ShortenerService::new(InMemoryRepository::new(), RandomGenerator::new(), BASE_URL)
    }

    #[tokio::test]
    async fn shorten_creates_short_url() {
        let service = test_service();

        let shortened = service.shorten("https://example.com", "u1").await.unwrap();

        assert!(shortened.created);
        assert_eq!(
            shortened.short_url,
            format!("{BASE_URL}/{}", shortened.id.as_str())
        );
        assert_eq!(
            service.expand(shortened.id.as_str()).await.unwrap(),
            "https://example.com"
        );
    }

    #[tokio::test]
    async fn shorten_empty_url_fails() {
        let service = test_service();

        let err = service.shorten("", "u1").await.unwrap_err();
        assert!(matches!(err, ShortenerError::EmptyTarget));
    }

    #[tokio::test]
    async fn shorten_same_url_returns_existing_id() {
        let service = test_service();

        let first = service.shorten("https://example.com", "u1").await.unwrap();
        let second = service.shorten("https://example.com", "u2").await.unwrap();

        assert!(!second.created);
        assert_eq!(second.id, first.id);
        assert_eq!(service.repository().len(), 1);
    }

    #[tokio::test]
    async fn shorten_retries_taken_ids() {
        let service = ShortenerService::new(
            InMemoryRepository::new(),
            ScriptedGenerator::new(&["aaaaaaaa", "aaaaaaaa", "bbbbbbbb"]),
            BASE_URL,
        );

        service.shorten("https://one.test", "").await.unwrap();
        let second = service.shorten("https://two.test", "").await.unwrap();

        assert!(second.created);
        assert_eq!(second.id.as_str(), "bbbbbbbb");
    }

    #[tokio::test]
    async fn shorten_gives_up_after_max_attempts() {
        let service = ShortenerService::new(
            InMemoryRepository::new(),
            ScriptedGenerator::new(&["aaaaaaaa"; MAX_ID_ATTEMPTS + 1]),
            BASE_URL,
        );

        service.shorten("https://one.test", "").await.unwrap();
        let err = service.shorten("https://two.test", "").await.unwrap_err();

        assert!(matches!(
            err,
            ShortenerError::Storage(StorageError::IdTaken(_))
        ));
    }

    #[tokio::test]
    async fn shorten_batch_keeps_correlation_ids() {
        let service = test_service();
        let items = vec![
            BatchItem {
                correlation_id: "1".to_string(),
                target: "https://x.test".to_string(),
            },
            BatchItem {
                correlation_id: "2".to_string(),
                target: "https://y.test".to_string(),
            },
        ];

        let shortened = service.shorten_batch(items, "u1").await.unwrap();

        assert_eq!(shortened.len(), 2);
        assert_eq!(shortened[0].correlation_id, "1");
        assert_eq!(shortened[1].correlation_id, "2");
        assert_eq!(
            service.expand(&shortened[1].short_url).await.unwrap(),
            "https://y.test"
        );
    }

    #[tokio::test]
    async fn shorten_batch_of_nothing_is_empty() {
        let service = test_service();

        assert!(service.shorten_batch(Vec::new(), "u1").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn expand_rejects_malformed_ids() {
        let service = test_service();

        let err = service.expand("abc").await.unwrap_err();
        assert!(matches!(err, ShortenerError::InvalidShortId(_)));
    }

    #[tokio::test]
    async fn expand_unknown_id_is_not_found() {
        let service = test_service();

        let err = service.expand("zzzzzzzz").await.unwrap_err();
        assert!(matches!(err, ShortenerError::NotFound(_)));
    }

    #[tokio::test]
    async fn deleted_urls_are_hidden() {
        let service = test_service();
        let kept = service.shorten("https://x.test", "u1").await.unwrap();
        let gone = service.shorten("https://y.test", "u1").await.unwrap();

        let outcome = service
            .delete_urls("u1", vec![gone.short_url.clone()])
            .await
            .wait()
            .await;
        assert_eq!(outcome, DeletionOutcome::Deleted(vec![gone.id.clone()]));

        let err = service.expand(gone.id.as_str()).await.unwrap_err();
        assert!(matches!(err, ShortenerError::Deleted(_)));

        let urls = service.user_urls("u1").await.unwrap();
        assert_eq!(
            urls,
            vec![UserUrl {
                short_url: kept.short_url,
                original_url: "https://x.test".to_string(),
            }]
        );
    }

    #[tokio::test]
    async fn user_urls_of_unknown_owner_is_empty() {
        let service = test_service();
        service.shorten("https://x.test", "u1").await.unwrap();

        assert!(service.user_urls("u2").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn ping_memory_storage() {
        let service = test_service();

        assert!(service.ping(Duration::from_millis(10)).await.is_ok());
    }
}
