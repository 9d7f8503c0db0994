//! Bounded in-memory embedding cache.
//!
//! First tier of the lookup chain. Keys are `CacheKey` strings
//! (model id + content hash), values are embedding vectors. The cache is
//! bounded by entry count with idle-time expiry, so recently used
//! entries survive and cold ones age out.

use moka::sync::Cache;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use crate::embedding::types::CacheKey;

/// Idle time after which an unused entry becomes eligible for eviction.
const IDLE_TTL_SECS: u64 = 3600;

/// Hit/miss counters for a cache tier.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
}

impl CacheStats {
    /// Hit ratio in `[0, 1]`; 0.0 when the tier has never been queried.
    #[must_use]
    pub fn hit_ratio(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            return 0.0;
        }
        self.hits as f64 / total as f64
    }
}

/// In-memory embedding cache tier.
pub struct MemoryCache {
    cache: Cache<String, Vec<f32>>,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl std::fmt::Debug for MemoryCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryCache")
            .field("entries", &self.cache.entry_count())
            .field("stats", &self.stats())
            .finish()
    }
}

impl MemoryCache {
    /// Creates a cache bounded to `max_entries`.
    #[must_use]
    pub fn new(max_entries: u64) -> Self {
        let cache = Cache::builder()
            .max_capacity(max_entries)
            .time_to_idle(Duration::from_secs(IDLE_TTL_SECS))
            .build();

        Self {
            cache,
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }

    /// Looks up a vector, recording the hit or miss.
    pub fn get(&self, key: &CacheKey) -> Option<Vec<f32>> {
        match self.cache.get(&key.as_string()) {
            Some(vector) => {
                self.hits.fetch_add(1, Ordering::Relaxed);
                Some(vector)
            }
            None => {
                self.misses.fetch_add(1, Ordering::Relaxed);
                None
            }
        }
    }

    /// Inserts a vector. Last write wins on racing keys; recomputation
    /// is idempotent so that race is accepted.
    pub fn insert(&self, key: &CacheKey, vector: Vec<f32>) {
        self.cache.insert(key.as_string(), vector);
    }

    /// Number of entries currently resident.
    #[must_use]
    pub fn len(&self) -> u64 {
        self.cache.entry_count()
    }

    /// Whether the cache is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drops every entry.
    pub fn clear(&self) {
        self.cache.invalidate_all();
    }

    /// Snapshot of the hit/miss counters.
    #[must_use]
    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
        }
    }
}
