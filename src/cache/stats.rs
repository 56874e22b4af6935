//! Cache Statistics Module
//!
//! Tracks store size estimates and performance counters.

use std::sync::atomic::{AtomicI64, AtomicU64, Ordering};

use serde::Serialize;

// == Store Counters ==
/// Live counters owned by a store, updated with atomic adds.
///
/// Size and count are estimates: adjusted on every write and delete, and
/// reset by the startup scan. Concurrent writers to one key can make them
/// drift briefly, so they are signed.
#[derive(Debug, Default)]
pub struct StoreCounters {
    size_bytes: AtomicI64,
    count: AtomicI64,
    hits: AtomicU64,
    misses: AtomicU64,
    evictions: AtomicU64,
    written_bytes: AtomicU64,
    read_bytes: AtomicU64,
    deleted_bytes: AtomicU64,
}

impl StoreCounters {
    pub fn new() -> Self {
        Self::default()
    }

    /// Overwrites size and count, used after the startup scan.
    pub fn reset_size(&self, size_bytes: u64, count: u64) {
        self.size_bytes.store(size_bytes as i64, Ordering::Relaxed);
        self.count.store(count as i64, Ordering::Relaxed);
    }

    /// Applies size/count deltas and returns the new size estimate.
    pub fn adjust(&self, size_delta: i64, count_delta: i64) -> i64 {
        self.count.fetch_add(count_delta, Ordering::Relaxed);
        self.size_bytes.fetch_add(size_delta, Ordering::AcqRel) + size_delta
    }

    pub fn size_bytes(&self) -> i64 {
        self.size_bytes.load(Ordering::Acquire)
    }

    pub fn record_hit(&self, read_bytes: u64) {
        self.hits.fetch_add(1, Ordering::Relaxed);
        self.read_bytes.fetch_add(read_bytes, Ordering::Relaxed);
    }

    pub fn record_miss(&self) {
        self.misses.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_eviction(&self) {
        self.evictions.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_write(&self, bytes: u64) {
        self.written_bytes.fetch_add(bytes, Ordering::Relaxed);
    }

    pub fn record_delete(&self, bytes: u64) {
        self.deleted_bytes.fetch_add(bytes, Ordering::Relaxed);
    }

    /// Copies the counters into a plain snapshot.
    pub fn snapshot(&self) -> CacheStats {
        CacheStats {
            size_bytes: self.size_bytes.load(Ordering::Relaxed).max(0) as u64,
            count: self.count.load(Ordering::Relaxed).max(0) as u64,
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            evictions: self.evictions.load(Ordering::Relaxed),
            written_bytes: self.written_bytes.load(Ordering::Relaxed),
            read_bytes: self.read_bytes.load(Ordering::Relaxed),
            deleted_bytes: self.deleted_bytes.load(Ordering::Relaxed),
        }
    }
}

// == Cache Stats ==
/// Point-in-time view of a store's counters.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CacheStats {
    /// Estimated bytes on disk, headers included
    pub size_bytes: u64,
    /// Estimated number of entries
    pub count: u64,
    /// Number of successful cache retrievals
    pub hits: u64,
    /// Number of failed cache retrievals (absent, stale or unreadable)
    pub misses: u64,
    /// Number of entries evicted due to LRU policy
    pub evictions: u64,
    pub written_bytes: u64,
    pub read_bytes: u64,
    pub deleted_bytes: u64,
}

impl CacheStats {
    // == Hit Rate ==
    /// Calculates the cache hit rate.
    ///
    /// Returns hits / (hits + misses), or 0.0 if no requests have been made.
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}
