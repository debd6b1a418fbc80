//! Engine-local memoization
//!
//! Caches are owned by exactly one engine instance and live as long as it does.
//! Entries are immutable once inserted: inputs are keyed by their canonical
//! JSON form, so a changed input is simply a different key.
//!
//! When `max_entries` is reached new results are computed but not stored.

use std::collections::HashMap;
use std::hash::Hash;

use serde::Serialize;

/// Cache statistics for observability.
///
/// Passive only: statistics never influence caching decisions.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CacheStats {
    /// Number of cache hits.
    pub hits: u64,
    /// Number of cache misses.
    pub misses: u64,
    /// Number of results not stored because the cache was full.
    pub evictions: u64,
}

/// A memo table keyed by structural fingerprints.
#[derive(Debug)]
pub struct MemoCache<K, V> {
    entries: HashMap<K, V>,
    /// Zero means unbounded.
    max_entries: usize,
    enabled: bool,
    stats: CacheStats,
}

impl<K: Hash + Eq, V: Clone> MemoCache<K, V> {
    /// Create an enabled cache. `max_entries == 0` means unbounded.
    pub fn new(max_entries: usize) -> Self {
        Self {
            entries: HashMap::new(),
            max_entries,
            enabled: true,
            stats: CacheStats::default(),
        }
    }

    /// Create a cache that never stores anything.
    pub fn disabled() -> Self {
        Self {
            entries: HashMap::new(),
            max_entries: 0,
            enabled: false,
            stats: CacheStats::default(),
        }
    }

    /// Whether lookups and inserts are active.
    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Look up a cached result.
    pub fn get(&mut self, key: &K) -> Option<V> {
        if !self.enabled {
            return None;
        }
        match self.entries.get(key) {
            Some(value) => {
                self.stats.hits += 1;
                Some(value.clone())
            }
            None => {
                self.stats.misses += 1;
                None
            }
        }
    }

    /// Store a result. Existing entries are never replaced.
    pub fn insert(&mut self, key: K, value: V) {
        if !self.enabled {
            return;
        }
        if self.max_entries > 0 && self.entries.len() >= self.max_entries {
            self.stats.evictions += 1;
            return;
        }
        self.entries.entry(key).or_insert(value);
    }

    /// Return the cached value for `key`, computing and storing it on a miss.
    pub fn get_or_insert_with(&mut self, key: K, compute: impl FnOnce() -> V) -> V {
        if let Some(hit) = self.get(&key) {
            return hit;
        }
        let value = compute();
        self.insert(key, value.clone());
        value
    }

    /// Number of stored entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether nothing is stored.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Current statistics.
    pub fn stats(&self) -> CacheStats {
        self.stats
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hit_after_insert() {
        let mut cache: MemoCache<String, u32> = MemoCache::new(0);

        assert_eq!(cache.get(&"a".to_string()), None);
        cache.insert("a".to_string(), 1);
        assert_eq!(cache.get(&"a".to_string()), Some(1));

        let stats = cache.stats();
        assert_eq!(stats.hits, 1);
        assert_eq!(stats.misses, 1);
    }

    #[test]
    fn test_entries_are_immutable() {
        let mut cache: MemoCache<&str, u32> = MemoCache::new(0);

        cache.insert("a", 1);
        cache.insert("a", 2);

        assert_eq!(cache.get(&"a"), Some(1));
    }

    #[test]
    fn test_capacity_skips_insert() {
        let mut cache: MemoCache<u32, u32> = MemoCache::new(1);

        cache.insert(1, 1);
        cache.insert(2, 2);

        assert_eq!(cache.len(), 1);
        assert_eq!(cache.stats().evictions, 1);
        assert_eq!(cache.get(&2), None);
    }

    #[test]
    fn test_disabled_cache_always_computes() {
        let mut cache: MemoCache<u32, u32> = MemoCache::disabled();
        let mut calls = 0;

        for _ in 0..3 {
            cache.get_or_insert_with(7, || {
                calls += 1;
                49
            });
        }

        assert_eq!(calls, 3);
        assert!(cache.is_empty());
        assert_eq!(cache.stats(), CacheStats::default());
    }

    #[test]
    fn test_get_or_insert_with_computes_once() {
        let mut cache: MemoCache<u32, u32> = MemoCache::new(0);
        let mut calls = 0;

        for _ in 0..3 {
            let value = cache.get_or_insert_with(7, || {
                calls += 1;
                49
            });
            assert_eq!(value, 49);
        }

        assert_eq!(calls, 1);
    }
}
