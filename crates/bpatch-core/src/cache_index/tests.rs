//! Tests for the cache index (in-memory and on-disk).

use super::CacheIndex;
use crate::error::PatchError;

fn hashes(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

#[tokio::test]
async fn starts_empty_and_registers_hashes() {
    let index = CacheIndex::open_in_memory().await.unwrap();
    assert!(index.is_empty());
    assert!(!index.contains("h1"));

    let added = index.bulk_insert(&hashes(&["h1", "h2", "h1"])).await.unwrap();
    assert_eq!(added, 2);
    assert!(index.contains("h1"));
    assert!(index.contains("h2"));
    assert_eq!(index.len(), 2);

    // Re-registering known hashes is a no-op.
    assert_eq!(index.bulk_insert(&hashes(&["h2"])).await.unwrap(), 0);
    assert!(index.insert("h3").await.unwrap());
    assert!(!index.insert("h3").await.unwrap());
    assert_eq!(index.len(), 3);
}

#[tokio::test]
async fn clear_forgets_everything() {
    let index = CacheIndex::open_in_memory().await.unwrap();
    index.bulk_insert(&hashes(&["a", "b"])).await.unwrap();
    index.clear().await.unwrap();
    assert!(index.is_empty());
    assert!(!index.contains("a"));
}

#[tokio::test]
async fn survives_reopen_on_disk() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("state dir").join("cache.db");
    {
        let index = CacheIndex::open_at(&path).await.unwrap();
        index.bulk_insert(&hashes(&["persisted"])).await.unwrap();
        index.close().await;
    }
    let index = CacheIndex::open_at(&path).await.unwrap();
    assert!(index.contains("persisted"));
    assert_eq!(index.len(), 1);
}

#[tokio::test]
async fn write_failure_escalates_and_leaves_snapshot_untouched() {
    let index = CacheIndex::open_in_memory().await.unwrap();
    index.close().await;
    let err = index.bulk_insert(&hashes(&["lost"])).await.unwrap_err();
    match err {
        PatchError::CacheIndexWriteFailure { attempts, .. } => assert_eq!(attempts, 3),
        other => panic!("unexpected error: {other}"),
    }
    assert!(!index.contains("lost"));
}

#[tokio::test]
async fn concurrent_writers_are_serialized() {
    let index = CacheIndex::open_in_memory().await.unwrap();
    let mut set = tokio::task::JoinSet::new();
    for i in 0..16 {
        let index = index.clone();
        set.spawn(async move { index.insert(&format!("hash{i}")).await });
    }
    while let Some(res) = set.join_next().await {
        assert!(res.unwrap().unwrap());
    }
    assert_eq!(index.len(), 16);
}
