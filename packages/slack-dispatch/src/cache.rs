//! Idempotency cache port and in-memory implementation.
//!
//! The cache is the only shared state between in-flight requests: a key→marker
//! store with TTL, used to detect re-delivery of the same webhook within a
//! bounded window. The port is deliberately narrow so it can be backed by
//! Redis/memcached in deployments with more than one instance; the in-memory
//! implementation assumes a single process.

use std::time::{Duration, Instant};

use anyhow::Result;
use async_trait::async_trait;
use dashmap::DashMap;

/// Key→marker store with per-entry TTL.
#[async_trait]
pub trait IdempotencyCache: Send + Sync {
    /// Fetch a live (non-expired) entry.
    async fn get(&self, key: &str) -> Result<Option<String>>;

    /// Store an entry that expires after `ttl`. Overwrites any existing entry.
    async fn put(&self, key: &str, value: &str, ttl: Duration) -> Result<()>;
}

/// Process-local cache backed by a concurrent map.
///
/// Expired entries are dropped lazily on access; there is no sweeper task
/// because the dispatch layer only ever holds one short-lived key per
/// delivery.
#[derive(Default)]
pub struct InMemoryIdempotencyCache {
    entries: DashMap<String, CacheEntry>,
}

struct CacheEntry {
    value: String,
    expires_at: Instant,
}

impl InMemoryIdempotencyCache {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl IdempotencyCache for InMemoryIdempotencyCache {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        if let Some(entry) = self.entries.get(key) {
            if entry.expires_at > Instant::now() {
                return Ok(Some(entry.value.clone()));
            }
        }
        // Either absent or expired; drop the stale entry if one exists.
        self.entries.remove(key);
        Ok(None)
    }

    async fn put(&self, key: &str, value: &str, ttl: Duration) -> Result<()> {
        self.entries.insert(
            key.to_string(),
            CacheEntry {
                value: value.to_string(),
                expires_at: Instant::now() + ttl,
            },
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn put_then_get_round_trips() {
        let cache = InMemoryIdempotencyCache::new();
        cache
            .put("k", "proceeded", Duration::from_secs(60))
            .await
            .unwrap();

        assert_eq!(cache.get("k").await.unwrap().as_deref(), Some("proceeded"));
    }

    #[tokio::test]
    async fn expired_entries_read_as_absent() {
        let cache = InMemoryIdempotencyCache::new();
        cache
            .put("k", "proceeded", Duration::from_millis(10))
            .await
            .unwrap();

        tokio::time::sleep(Duration::from_millis(30)).await;

        assert_eq!(cache.get("k").await.unwrap(), None);
    }

    #[tokio::test]
    async fn put_overwrites_existing_entry() {
        let cache = InMemoryIdempotencyCache::new();
        cache.put("k", "a", Duration::from_secs(60)).await.unwrap();
        cache.put("k", "b", Duration::from_secs(60)).await.unwrap();

        assert_eq!(cache.get("k").await.unwrap().as_deref(), Some("b"));
    }
}
