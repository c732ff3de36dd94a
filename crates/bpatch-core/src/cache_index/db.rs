//! SQLite-backed cache index implementation.

use anyhow::Result;
use sqlx::sqlite::SqlitePoolOptions;
use sqlx::{Pool, Row, Sqlite};
use std::collections::HashSet;
use std::path::Path;
use std::sync::{Arc, RwLock};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use crate::error::PatchError;

/// Attempts per bulk write before escalating `CacheIndexWriteFailure`.
const WRITE_ATTEMPTS: u32 = 3;
const WRITE_RETRY_DELAY: Duration = Duration::from_millis(50);

/// Percent-encode a path for use in a sqlite:// URI so spaces and special chars don't break parsing.
fn path_to_sqlite_uri(path: &Path) -> String {
    let s = path.to_string_lossy();
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '%' => out.push_str("%25"),
            ' ' => out.push_str("%20"),
            '#' => out.push_str("%23"),
            '?' => out.push_str("%3F"),
            '&' => out.push_str("%26"),
            c => out.push(c),
        }
    }
    format!("sqlite://{}", out)
}

struct Inner {
    pool: Pool<Sqlite>,
    known: RwLock<HashSet<String>>,
    writer: tokio::sync::Mutex<()>,
}

/// Handle to the cache index. Cheap to clone; clones share the same state.
#[derive(Clone)]
pub struct CacheIndex {
    inner: Arc<Inner>,
}

impl CacheIndex {
    /// Open (or create) the index at `path`, creating parent dirs if needed.
    pub async fn open_at(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let uri = path_to_sqlite_uri(path) + "?mode=rwc";
        let pool = SqlitePoolOptions::new()
            .max_connections(4)
            .connect(&uri)
            .await?;
        Self::from_pool(pool).await
    }

    /// Open an in-memory index (nothing persisted). Useful for tests and dry runs.
    pub async fn open_in_memory() -> Result<Self> {
        // Single connection so the pool never hands back a different empty DB.
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await?;
        Self::from_pool(pool).await
    }

    async fn from_pool(pool: Pool<Sqlite>) -> Result<Self> {
        migrate(&pool).await?;
        let rows = sqlx::query("SELECT hash FROM cached_bundles")
            .fetch_all(&pool)
            .await?;
        let known: HashSet<String> = rows.iter().map(|r| r.get::<String, _>("hash")).collect();
        tracing::debug!(entries = known.len(), "cache index loaded");
        Ok(Self {
            inner: Arc::new(Inner {
                pool,
                known: RwLock::new(known),
                writer: tokio::sync::Mutex::new(()),
            }),
        })
    }

    /// True if `hash` has been registered as downloaded and verified.
    pub fn contains(&self, hash: &str) -> bool {
        self.inner.known.read().unwrap().contains(hash)
    }

    pub fn len(&self) -> usize {
        self.inner.known.read().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Register many hashes in one transaction. Returns how many were new.
    ///
    /// Writers are serialized. A failed transaction is retried a few times and
    /// then escalated; the snapshot is only updated after a commit.
    pub async fn bulk_insert(&self, hashes: &[String]) -> Result<usize, PatchError> {
        let _guard = self.inner.writer.lock().await;

        let fresh: Vec<String> = {
            let known = self.inner.known.read().unwrap();
            let mut seen = HashSet::new();
            hashes
                .iter()
                .filter(|h| !known.contains(*h) && seen.insert(h.as_str()))
                .cloned()
                .collect()
        };
        if fresh.is_empty() {
            return Ok(0);
        }

        let mut attempt = 1u32;
        loop {
            match self.write_batch(&fresh).await {
                Ok(()) => break,
                Err(e) if attempt < WRITE_ATTEMPTS => {
                    tracing::warn!(attempt, "cache index write failed, retrying: {:#}", e);
                    tokio::time::sleep(WRITE_RETRY_DELAY * attempt).await;
                    attempt += 1;
                }
                Err(e) => {
                    tracing::error!(
                        attempt,
                        count = fresh.len(),
                        "cache index write failed: {:#}",
                        e
                    );
                    return Err(PatchError::CacheIndexWriteFailure {
                        attempts: attempt,
                        reason: format!("{:#}", e),
                    });
                }
            }
        }

        let added = fresh.len();
        self.inner.known.write().unwrap().extend(fresh);
        tracing::debug!(added, "cache index updated");
        Ok(added)
    }

    /// Register a single hash.
    pub async fn insert(&self, hash: &str) -> Result<bool, PatchError> {
        Ok(self.bulk_insert(&[hash.to_string()]).await? == 1)
    }

    /// Forget every entry (clear-on-dirty).
    pub async fn clear(&self) -> Result<()> {
        let _guard = self.inner.writer.lock().await;
        sqlx::query("DELETE FROM cached_bundles")
            .execute(&self.inner.pool)
            .await?;
        self.inner.known.write().unwrap().clear();
        tracing::info!("cache index cleared");
        Ok(())
    }

    /// Flush and close the underlying pool. Later writes fail.
    pub async fn close(&self) {
        let _guard = self.inner.writer.lock().await;
        self.inner.pool.close().await;
    }

    async fn write_batch(&self, hashes: &[String]) -> Result<()> {
        let now = unix_timestamp();
        let mut tx = self.inner.pool.begin().await?;
        for hash in hashes {
            sqlx::query(
                r#"
                INSERT OR IGNORE INTO cached_bundles (hash, registered_at)
                VALUES (?1, ?2)
                "#,
            )
            .bind(hash)
            .bind(now)
            .execute(&mut *tx)
            .await?;
        }
        tx.commit().await?;
        Ok(())
    }
}

async fn migrate(pool: &Pool<Sqlite>) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS cached_bundles (
            hash TEXT PRIMARY KEY NOT NULL,
            registered_at INTEGER NOT NULL
        );
        "#,
    )
    .execute(pool)
    .await?;
    Ok(())
}

fn unix_timestamp() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs() as i64
}
