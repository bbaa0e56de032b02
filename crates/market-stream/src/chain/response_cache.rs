//! Short-lived response cache keyed by request.
//!
//! Caches successful upstream payloads for a bounded time so that several
//! subscriptions asking for the same data within one refresh window share
//! a single provider call. Expired entries are evicted lazily on access,
//! there is no background sweeper.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};
use std::time::{Duration, Instant};

use log::{debug, warn};

/// A cached value together with its freshness window.
#[derive(Debug, Clone)]
struct CacheEntry<V> {
    value: V,
    inserted: Instant,
    ttl: Duration,
}

impl<V> CacheEntry<V> {
    /// An entry is fresh strictly inside its window. A zero TTL entry is
    /// never fresh.
    fn is_fresh(&self) -> bool {
        self.inserted.elapsed() < self.ttl
    }
}

/// TTL cache for upstream responses.
///
/// Thread-safe map from request key to payload. Each entry carries its
/// own time-to-live, so quote and index payloads can age out on
/// different schedules.
pub struct ResponseCache<V> {
    entries: Mutex<HashMap<String, CacheEntry<V>>>,
}

impl<V: Clone> ResponseCache<V> {
    pub fn new() -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
        }
    }

    /// Lock the entry map, recovering from poison if necessary.
    fn lock_entries(&self) -> MutexGuard<'_, HashMap<String, CacheEntry<V>>> {
        self.entries.lock().unwrap_or_else(|poisoned| {
            warn!("Response cache mutex was poisoned, recovering");
            poisoned.into_inner()
        })
    }

    /// Fetch a fresh value for `key`, evicting it if it has expired.
    pub fn get(&self, key: &str) -> Option<V> {
        let mut entries = self.lock_entries();

        match entries.get(key) {
            Some(entry) if entry.is_fresh() => {
                debug!("Response cache: hit for '{}'", key);
                Some(entry.value.clone())
            }
            Some(_) => {
                debug!("Response cache: expired entry for '{}', evicting", key);
                entries.remove(key);
                None
            }
            None => None,
        }
    }

    /// Store a value under `key` with the given freshness window,
    /// replacing any previous entry.
    pub fn set(&self, key: &str, value: V, ttl: Duration) {
        let mut entries = self.lock_entries();
        entries.insert(
            key.to_string(),
            CacheEntry {
                value,
                inserted: Instant::now(),
                ttl,
            },
        );
    }

    /// Number of entries currently held, fresh or not.
    pub fn len(&self) -> usize {
        self.lock_entries().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock_entries().is_empty()
    }

    /// Drop every expired entry immediately.
    pub fn purge(&self) {
        let mut entries = self.lock_entries();
        entries.retain(|_, entry| entry.is_fresh());
    }

    /// Drop every entry regardless of freshness.
    pub fn clear(&self) {
        let mut entries = self.lock_entries();
        entries.clear();
    }
}

impl<V: Clone> Default for ResponseCache<V> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Backdate an entry's insertion instant, simulating elapsed time
    /// without sleeping.
    fn age(cache: &ResponseCache<String>, key: &str, delta: Duration) {
        let mut entries = cache.entries.lock().unwrap();
        if let Some(entry) = entries.get_mut(key) {
            entry.inserted = Instant::now() - delta;
        }
    }

    #[test]
    fn test_hit_within_window() {
        let cache = ResponseCache::new();
        cache.set("quote:INFY.NS", "payload".to_string(), Duration::from_secs(5));

        assert_eq!(cache.get("quote:INFY.NS"), Some("payload".to_string()));
    }

    #[test]
    fn test_miss_for_unknown_key() {
        let cache: ResponseCache<String> = ResponseCache::new();
        assert_eq!(cache.get("quote:TCS.NS"), None);
    }

    #[test]
    fn test_expired_entry_is_evicted_on_access() {
        let cache = ResponseCache::new();
        cache.set("indices", "payload".to_string(), Duration::from_secs(10));
        age(&cache, "indices", Duration::from_secs(11));

        assert_eq!(cache.get("indices"), None);
        // The stale entry is gone, not merely hidden.
        assert_eq!(cache.len(), 0);
    }

    #[test]
    fn test_entry_at_exact_ttl_is_stale() {
        let cache = ResponseCache::new();
        cache.set("quote:SBIN.NS", "payload".to_string(), Duration::from_secs(5));
        age(&cache, "quote:SBIN.NS", Duration::from_secs(5));

        assert_eq!(cache.get("quote:SBIN.NS"), None);
    }

    #[test]
    fn test_zero_ttl_never_serves() {
        let cache = ResponseCache::new();
        cache.set("quote:ITC.NS", "payload".to_string(), Duration::ZERO);

        assert_eq!(cache.get("quote:ITC.NS"), None);
    }

    #[test]
    fn test_set_replaces_value_and_window() {
        let cache = ResponseCache::new();
        cache.set("quote:INFY.NS", "old".to_string(), Duration::from_secs(5));
        cache.set("quote:INFY.NS", "new".to_string(), Duration::from_secs(5));

        assert_eq!(cache.get("quote:INFY.NS"), Some("new".to_string()));
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_entries_age_independently() {
        let cache = ResponseCache::new();
        cache.set("quote:INFY.NS", "quote".to_string(), Duration::from_secs(5));
        cache.set("indices", "indices".to_string(), Duration::from_secs(10));
        age(&cache, "quote:INFY.NS", Duration::from_secs(6));

        assert_eq!(cache.get("quote:INFY.NS"), None);
        assert_eq!(cache.get("indices"), Some("indices".to_string()));
    }

    #[test]
    fn test_purge_drops_only_expired_entries() {
        let cache = ResponseCache::new();
        cache.set("fresh", "a".to_string(), Duration::from_secs(60));
        cache.set("stale", "b".to_string(), Duration::from_secs(1));
        age(&cache, "stale", Duration::from_secs(2));

        cache.purge();

        assert_eq!(cache.len(), 1);
        assert_eq!(cache.get("fresh"), Some("a".to_string()));
    }

    #[test]
    fn test_clear_empties_cache() {
        let cache = ResponseCache::new();
        cache.set("quote:INFY.NS", "a".to_string(), Duration::from_secs(60));
        cache.clear();

        assert!(cache.is_empty());
    }
}
