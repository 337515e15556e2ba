//! Time-boxed LRU cache for proxied indexer responses.

use std::num::NonZeroUsize;
use std::time::{Duration, Instant};

use lru::LruCache;
use parking_lot::Mutex;
use serde_json::Value;

/// Default number of cached responses.
pub const DEFAULT_CAPACITY: usize = 100;

/// Default lifetime of a cached response.
pub const DEFAULT_TTL: Duration = Duration::from_secs(30);

struct CachedResponse {
    value: Value,
    stored_at: Instant,
}

/// LRU cache keyed by the serialized request body.
///
/// Lookups refresh recency; entries older than the TTL are treated as misses
/// and dropped on access.
pub struct ResponseCache {
    inner: Mutex<LruCache<String, CachedResponse>>,
    ttl: Duration,
}

impl ResponseCache {
    /// Create a cache with default capacity and TTL.
    #[must_use]
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY, DEFAULT_TTL)
    }

    /// Create a cache with the specified capacity and TTL.
    #[must_use]
    pub fn with_capacity(capacity: usize, ttl: Duration) -> Self {
        let cap = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            inner: Mutex::new(LruCache::new(cap)),
            ttl,
        }
    }

    pub fn get(&self, key: &str) -> Option<Value> {
        self.get_at(key, Instant::now())
    }

    /// Lookup as of `now`.
    pub fn get_at(&self, key: &str, now: Instant) -> Option<Value> {
        let mut cache = self.inner.lock();
        let fresh = cache
            .get(key)
            .map(|entry| now.saturating_duration_since(entry.stored_at) < self.ttl)?;
        if fresh {
            cache.peek(key).map(|entry| entry.value.clone())
        } else {
            cache.pop(key);
            None
        }
    }

    pub fn insert(&self, key: String, value: Value) {
        self.insert_at(key, value, Instant::now());
    }

    /// Store `value` as of `now`, evicting the least recently used entry when full.
    pub fn insert_at(&self, key: String, value: Value, now: Instant) {
        let mut cache = self.inner.lock();
        if let Some((evicted, _)) = cache.push(
            key,
            CachedResponse {
                value,
                stored_at: now,
            },
        ) {
            tracing::trace!("Evicted cached indexer response ({} bytes key)", evicted.len());
        }
    }

    /// Get the current number of entries in the cache.
    #[cfg(test)]
    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.lock().len()
    }

    /// Check if the cache is empty.
    #[cfg(test)]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.inner.lock().is_empty()
    }
}

impl Default for ResponseCache {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_hit_and_miss() {
        let cache = ResponseCache::new();
        assert!(cache.is_empty());
        assert!(cache.get("a").is_none());

        cache.insert("a".to_string(), json!({ "data": 1 }));
        assert_eq!(cache.get("a"), Some(json!({ "data": 1 })));
        assert!(cache.get("b").is_none());
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_expired_entries_miss() {
        let cache = ResponseCache::with_capacity(10, Duration::from_secs(30));
        let start = Instant::now();
        cache.insert_at("q".to_string(), json!(1), start);

        assert!(cache
            .get_at("q", start + Duration::from_secs(29))
            .is_some());
        assert!(cache
            .get_at("q", start + Duration::from_secs(30))
            .is_none());
        // Expired entry is dropped
        assert!(cache.is_empty());
    }

    #[test]
    fn test_evicts_least_recently_used() {
        let cache = ResponseCache::new();
        for i in 0..DEFAULT_CAPACITY {
            cache.insert(format!("query-{}", i), json!(i));
        }
        // Touch the oldest entry so query-1 becomes the least recently used
        assert!(cache.get("query-0").is_some());

        cache.insert("query-100".to_string(), json!(100));

        assert_eq!(cache.len(), DEFAULT_CAPACITY);
        assert!(cache.get("query-1").is_none());
        assert!(cache.get("query-0").is_some());
        assert!(cache.get("query-100").is_some());
    }

    #[test]
    fn test_101_inserts_evict_first_key() {
        let cache = ResponseCache::new();
        for i in 0..=DEFAULT_CAPACITY {
            cache.insert(format!("query-{}", i), json!(i));
        }
        assert!(cache.get("query-0").is_none());
        assert!(cache.get(&format!("query-{}", DEFAULT_CAPACITY)).is_some());
    }
}
