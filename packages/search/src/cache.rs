//! Bounded search result cache.
//!
//! Entries are evicted oldest-inserted first when the cache is full. This is
//! insertion order, not access recency: a hit does not refresh an entry.

use std::sync::Arc;
use std::time::{Duration, Instant};

use indexmap::IndexMap;
use ocp_explorer_plan_models::{Coordinates, SearchResult};

/// Builds the cache key for a normalized query, its result cap and an
/// optional location.
#[must_use]
pub fn cache_key(
    normalized_query: &str,
    max_results: usize,
    location: Option<Coordinates>,
) -> String {
    location.map_or_else(
        || format!("{normalized_query}|{max_results}"),
        |c| format!("{normalized_query}|{max_results}|{},{}", c.lat, c.lng),
    )
}

struct CacheEntry {
    inserted: Instant,
    value: Arc<SearchResult>,
}

/// Capacity-bounded map from cache key to a shared [`SearchResult`].
pub struct SearchCache {
    entries: IndexMap<String, CacheEntry>,
    capacity: usize,
    ttl: Option<Duration>,
}

impl SearchCache {
    /// Creates a cache holding up to `capacity` results. With a `ttl`,
    /// entries older than it are treated as missing.
    #[must_use]
    pub fn new(capacity: usize, ttl: Option<Duration>) -> Self {
        Self {
            entries: IndexMap::with_capacity(capacity),
            capacity,
            ttl,
        }
    }

    /// Looks up `key` as of `now`, dropping the entry if it has expired.
    pub fn get(&mut self, key: &str, now: Instant) -> Option<Arc<SearchResult>> {
        let entry = self.entries.get(key)?;

        if let Some(ttl) = self.ttl
            && now.saturating_duration_since(entry.inserted) >= ttl
        {
            log::debug!("Cache entry for {key:?} expired");
            self.entries.shift_remove(key);
            return None;
        }

        Some(Arc::clone(&entry.value))
    }

    /// Stores `value` under `key`, evicting the oldest entry when full.
    ///
    /// Re-inserting an existing key counts as a fresh insertion.
    pub fn insert(&mut self, key: String, value: Arc<SearchResult>, now: Instant) {
        if self.capacity == 0 {
            return;
        }

        self.entries.shift_remove(&key);
        if self.entries.len() >= self.capacity
            && let Some((evicted, _)) = self.entries.shift_remove_index(0)
        {
            log::debug!("Evicted cache entry for {evicted:?}");
        }

        self.entries.insert(
            key,
            CacheEntry {
                inserted: now,
                value,
            },
        );
    }

    /// Removes every entry.
    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// Number of stored entries, including any not yet found expired.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the cache holds no entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
