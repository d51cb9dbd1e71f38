use std::time::Duration;

use super::types::CacheEntry;
use super::KeyValueStore;

/// Default time a cached payload stays fresh (1 hour)
pub const DEFAULT_TTL: Duration = Duration::from_secs(60 * 60);

/// Time-boxed, best-effort cache of raw upstream payloads.
///
/// One entry per source key, JSON-encoded as `{data, timestamp}`. Nothing
/// here ever fails outward: a store error on read is a miss, a store error
/// on write is logged and skipped.
#[derive(Debug, Clone)]
pub struct ResponseCache<S> {
    store: S,
    ttl: Duration,
}

impl<S: KeyValueStore> ResponseCache<S> {
    pub fn new(store: S, ttl: Duration) -> Self {
        Self { store, ttl }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    // ========================================================================
    // Cache Operations
    // ========================================================================

    /// Store a raw payload under `key`, stamped with the current time.
    pub async fn cache_data(&self, key: &str, data: &serde_json::Value) {
        self.cache_data_at(key, data, now_millis()).await;
    }

    /// Store a raw payload with an explicit write time (epoch millis).
    pub async fn cache_data_at(&self, key: &str, data: &serde_json::Value, timestamp: i64) {
        let entry = CacheEntry {
            data: data.clone(),
            timestamp,
        };
        let encoded = match serde_json::to_string(&entry) {
            Ok(encoded) => encoded,
            Err(e) => {
                tracing::warn!(key = %key, error = %e, "Failed to encode cache entry, skipping write");
                return;
            }
        };

        if let Err(e) = self.store.set(key, &encoded).await {
            tracing::warn!(key = %key, error = %e, "Cache write failed, continuing without cache");
        }
    }

    /// Return the cached payload for `key` if it is younger than the TTL.
    ///
    /// Stale or undecodable entries are removed and reported as a miss.
    pub async fn get_cached_data(&self, key: &str) -> Option<serde_json::Value> {
        self.get_cached_data_at(key, now_millis()).await
    }

    /// [`get_cached_data`](Self::get_cached_data) evaluated at an explicit time.
    pub async fn get_cached_data_at(&self, key: &str, now: i64) -> Option<serde_json::Value> {
        let raw = match self.store.get(key).await {
            Ok(Some(raw)) => raw,
            Ok(None) => {
                tracing::debug!(key = %key, "Cache miss");
                return None;
            }
            Err(e) => {
                tracing::debug!(key = %key, error = %e, "Cache read failed, treating as miss");
                return None;
            }
        };

        let entry: CacheEntry = match serde_json::from_str(&raw) {
            Ok(entry) => entry,
            Err(e) => {
                tracing::debug!(key = %key, error = %e, "Undecodable cache entry, evicting");
                self.evict(key).await;
                return None;
            }
        };

        let age_ms = now.saturating_sub(entry.timestamp);
        if age_ms > self.ttl_millis() {
            tracing::debug!(key = %key, age_ms = age_ms, "Cache entry expired, evicting");
            self.evict(key).await;
            return None;
        }

        tracing::debug!(key = %key, age_ms = age_ms, "Cache hit");
        Some(entry.data)
    }

    /// Drop the entry for `key`, ignoring store failures.
    pub async fn evict(&self, key: &str) {
        if let Err(e) = self.store.remove(key).await {
            tracing::debug!(key = %key, error = %e, "Cache eviction failed");
        }
    }

    fn ttl_millis(&self) -> i64 {
        i64::try_from(self.ttl.as_millis()).unwrap_or(i64::MAX)
    }
}

fn now_millis() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::{Database, MemoryStore};
    use serde_json::json;

    const HOUR_MS: i64 = 60 * 60 * 1000;
    const T0: i64 = 1_704_067_200_000;

    fn cache() -> ResponseCache<MemoryStore> {
        ResponseCache::new(MemoryStore::new(), DEFAULT_TTL)
    }

    #[tokio::test]
    async fn test_fresh_entry_returns_payload() {
        let cache = cache();
        let payload = json!({ "results": [{ "url": "https://example.com/a" }] });

        cache.cache_data_at("k", &payload, T0).await;
        let cached = cache.get_cached_data_at("k", T0 + HOUR_MS - 1).await;
        assert_eq!(cached, Some(payload));
    }

    #[tokio::test]
    async fn test_entry_at_exact_ttl_is_fresh() {
        let cache = cache();
        cache.cache_data_at("k", &json!({ "results": [] }), T0).await;
        assert!(cache.get_cached_data_at("k", T0 + HOUR_MS).await.is_some());
    }

    #[tokio::test]
    async fn test_expired_entry_is_miss_and_removed() {
        let cache = cache();
        cache.cache_data_at("k", &json!({ "results": [] }), T0).await;

        assert!(cache.get_cached_data_at("k", T0 + HOUR_MS + 1).await.is_none());
        assert!(cache.store().get("k").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_missing_entry_is_miss() {
        assert!(cache().get_cached_data_at("absent", T0).await.is_none());
    }

    #[tokio::test]
    async fn test_undecodable_entry_evicted() {
        let cache = cache();
        cache.store().set("k", "not json").await.unwrap();

        assert!(cache.get_cached_data_at("k", T0).await.is_none());
        assert!(cache.store().get("k").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_entry_encoding() {
        let cache = cache();
        cache.cache_data_at("k", &json!({ "results": [] }), T0).await;

        let raw = cache.store().get("k").await.unwrap().unwrap();
        let entry: CacheEntry = serde_json::from_str(&raw).unwrap();
        assert_eq!(entry.timestamp, T0);
        assert_eq!(entry.data, json!({ "results": [] }));
    }

    #[tokio::test]
    async fn test_overwrite_refreshes_timestamp() {
        let cache = cache();
        cache.cache_data_at("k", &json!({ "v": 1 }), T0).await;
        cache.cache_data_at("k", &json!({ "v": 2 }), T0 + HOUR_MS).await;

        let cached = cache.get_cached_data_at("k", T0 + HOUR_MS + 10).await;
        assert_eq!(cached, Some(json!({ "v": 2 })));
    }

    #[tokio::test]
    async fn test_sqlite_backed_cache() {
        let db = Database::open(":memory:").await.unwrap();
        let cache = ResponseCache::new(db, Duration::from_secs(60));
        let payload = json!({ "results": [{ "title": "t" }] });

        cache.cache_data("k", &payload).await;
        assert_eq!(cache.get_cached_data("k").await, Some(payload));
    }
}
