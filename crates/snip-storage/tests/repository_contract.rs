//! Behaviour every backend shares, run against the memory and log backends.
//! The PostgreSQL backend is covered by `postgres_repository_integration`.

use snip_core::{ShortId, UrlRecord};
use snip_storage::{InMemoryRepository, LogRepository, Repository};
use tempfile::TempDir;

fn id(value: &str) -> ShortId {
    ShortId::new_unchecked(value)
}

fn fixture_records() -> Vec<UrlRecord> {
    vec![
        UrlRecord::new(id("aaaaaaaa"), "https://x.test", "u1"),
        UrlRecord::new(id("bbbbbbbb"), "https://y.test", "u1"),
        UrlRecord::new(id("cccccccc"), "https://z.test", "u2"),
        UrlRecord::new(id("dddddddd"), "https://anon.test", ""),
    ]
}

async fn round_trip<R: Repository>(repo: &R) {
    for record in fixture_records() {
        repo.save(record.clone()).await.unwrap();

        let got = repo.get(&record.short_id).await.unwrap();
        assert_eq!(got.target, record.target);
        assert_eq!(got.owner, record.owner);
        assert!(!got.deleted);

        let by_target = repo.get_by_target(&record.target).await.unwrap();
        assert_eq!(by_target.short_id, record.short_id);
    }
}

async fn owner_lookup<R: Repository>(repo: &R) {
    repo.save_batch(fixture_records()).await.unwrap();

    for owner in ["u1", "u2", "", "nobody"] {
        let mut expected: Vec<String> = fixture_records()
            .into_iter()
            .filter(|r| r.owner == owner)
            .map(|r| r.short_id.to_string())
            .collect();
        expected.sort();

        let mut got: Vec<String> = repo
            .find_by_owner(owner)
            .await
            .unwrap()
            .into_iter()
            .map(|r| r.short_id.to_string())
            .collect();
        got.sort();

        assert_eq!(got, expected, "owner {owner:?}");
    }
}

async fn missing_lookups<R: Repository>(repo: &R) {
    assert!(repo.get(&id("zzzzzzzz")).await.unwrap_err().is_not_found());
    assert!(repo
        .get_by_target("https://missing.test")
        .await
        .unwrap_err()
        .is_not_found());
}

async fn delete_of_unknown_ids_is_ok<R: Repository>(repo: &R) {
    repo.delete_batch(&[id("zzzzzzzz"), id("yyyyyyyy")])
        .await
        .unwrap();
    repo.delete_batch(&[]).await.unwrap();
}

async fn log_repo(dir: &TempDir) -> LogRepository {
    LogRepository::open(dir.path().join("urls.log")).await.unwrap()
}

#[tokio::test]
async fn memory_round_trip() {
    round_trip(&InMemoryRepository::new()).await;
}

#[tokio::test]
async fn log_round_trip() {
    let dir = TempDir::new().unwrap();
    round_trip(&log_repo(&dir).await).await;
}

#[tokio::test]
async fn memory_owner_lookup() {
    owner_lookup(&InMemoryRepository::new()).await;
}

#[tokio::test]
async fn log_owner_lookup() {
    let dir = TempDir::new().unwrap();
    owner_lookup(&log_repo(&dir).await).await;
}

#[tokio::test]
async fn memory_missing_lookups() {
    missing_lookups(&InMemoryRepository::new()).await;
}

#[tokio::test]
async fn log_missing_lookups() {
    let dir = TempDir::new().unwrap();
    missing_lookups(&log_repo(&dir).await).await;
}

#[tokio::test]
async fn memory_delete_of_unknown_ids_is_ok() {
    delete_of_unknown_ids_is_ok(&InMemoryRepository::new()).await;
}

#[tokio::test]
async fn log_delete_of_unknown_ids_is_ok() {
    let dir = TempDir::new().unwrap();
    delete_of_unknown_ids_is_ok(&log_repo(&dir).await).await;
}

#[tokio::test]
async fn memory_duplicate_target_stores_one_record() {
    let repo = InMemoryRepository::new();

    repo.save(UrlRecord::new(id("aaaaaaaa"), "https://dup.test", ""))
        .await
        .unwrap();
    let err = repo
        .save(UrlRecord::new(id("bbbbbbbb"), "https://dup.test", ""))
        .await
        .unwrap_err();

    assert!(err.is_conflict());
    assert_eq!(repo.len(), 1);
}
