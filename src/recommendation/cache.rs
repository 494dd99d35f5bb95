//! A small, process-external-shaped key/value cache abstraction with TTL and
//! explicit invalidation, per spec.md §9's design note: "the implementation
//! should abstract them behind a small key/value interface with TTL and
//! explicit invalidation, so tests can substitute an in-memory double."
//!
//! The in-memory implementation here doubles as both that test double and
//! the crate's only shipped implementation, since persistence/caching
//! backends are out of the engine's scope (spec.md §1) — only the contract
//! matters. Grounded in shape (not storage) on the teacher's
//! `cache_recommendations`/`get_cached_recommendations` TTL-plus-invalidation
//! pattern in `recommendation/engine.rs`.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::RwLock;
use std::time::{Duration, Instant};

#[async_trait]
pub trait Cache: Send + Sync {
    /// Fetch a cached, still-fresh JSON blob for `key`, or `None` on a miss
    /// or expiry. A cache miss is always `Transient` and recovered locally
    /// by the caller (never surfaced), per spec.md §7.
    async fn get(&self, key: &str) -> Option<String>;

    /// Store `value` under `key` with the given TTL. Writes are
    /// last-writer-wins; no locking is required across keys.
    async fn set(&self, key: &str, value: String, ttl: Duration);

    /// Explicitly evict `key`, regardless of TTL.
    async fn invalidate(&self, key: &str);

    /// Explicitly evict every key with the given prefix (used when a user's
    /// preferences change and every cached recommendation for that user
    /// must be dropped, not just one kind).
    async fn invalidate_prefix(&self, prefix: &str);
}

struct Entry {
    value: String,
    expires_at: Instant,
}

/// An in-memory `Cache`. Lock-free reads are approximated with a
/// `RwLock<HashMap<..>>`: concurrent readers proceed together, writers take
/// the lock briefly. Good enough for a process-local double; a real
/// deployment would back this with an external TTL store.
#[derive(Default)]
pub struct InMemoryCache {
    entries: RwLock<HashMap<String, Entry>>,
}

impl InMemoryCache {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Cache for InMemoryCache {
    async fn get(&self, key: &str) -> Option<String> {
        let entries = self.entries.read().unwrap();
        entries.get(key).and_then(|entry| {
            if entry.expires_at > Instant::now() {
                Some(entry.value.clone())
            } else {
                None
            }
        })
    }

    async fn set(&self, key: &str, value: String, ttl: Duration) {
        let mut entries = self.entries.write().unwrap();
        entries.insert(
            key.to_string(),
            Entry {
                value,
                expires_at: Instant::now() + ttl,
            },
        );
    }

    async fn invalidate(&self, key: &str) {
        let mut entries = self.entries.write().unwrap();
        entries.remove(key);
    }

    async fn invalidate_prefix(&self, prefix: &str) {
        let mut entries = self.entries.write().unwrap();
        entries.retain(|k, _| !k.starts_with(prefix));
    }
}

/// Cache key namespaces, per spec.md §6's "Cache namespace" table.
pub mod keys {
    use crate::recommendation::domain::{ItemId, ItemKind, UserId};

    pub fn rec(kind: ItemKind, user_id: UserId) -> String {
        format!("rec:{}:{}", kind.as_str(), user_id.0)
    }

    pub fn item_sim(kind: ItemKind, item_id: ItemId, shrinkage: f64) -> String {
        format!("item_sim:{}:{}:shrunk:{}", kind.as_str(), item_id, shrinkage)
    }

    pub fn prefs(kind: ItemKind, user_id: UserId) -> String {
        format!("prefs:{}:{}", kind.as_str(), user_id.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn set_then_get_round_trips() {
        let cache = InMemoryCache::new();
        cache
            .set("k", "v".to_string(), Duration::from_secs(60))
            .await;
        assert_eq!(cache.get("k").await, Some("v".to_string()));
    }

    #[tokio::test]
    async fn expired_entry_is_a_miss() {
        let cache = InMemoryCache::new();
        cache
            .set("k", "v".to_string(), Duration::from_millis(1))
            .await;
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert_eq!(cache.get("k").await, None);
    }

    #[tokio::test]
    async fn invalidate_removes_key() {
        let cache = InMemoryCache::new();
        cache
            .set("k", "v".to_string(), Duration::from_secs(60))
            .await;
        cache.invalidate("k").await;
        assert_eq!(cache.get("k").await, None);
    }

    #[tokio::test]
    async fn invalidate_prefix_removes_matching_keys_only() {
        let cache = InMemoryCache::new();
        cache
            .set("rec:book:1", "a".to_string(), Duration::from_secs(60))
            .await;
        cache
            .set("rec:media:1", "b".to_string(), Duration::from_secs(60))
            .await;
        cache
            .set("prefs:book:1", "c".to_string(), Duration::from_secs(60))
            .await;
        cache.invalidate_prefix("rec:").await;
        assert_eq!(cache.get("rec:book:1").await, None);
        assert_eq!(cache.get("rec:media:1").await, None);
        assert_eq!(cache.get("prefs:book:1").await, Some("c".to_string()));
    }
}
