//! Cache Statistics Module
//!
//! Tracks cache performance metrics including hits, misses, evictions and
//! drain activity.

use serde::Serialize;

// == Cache Stats ==
/// Tracks cache performance metrics.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CacheStats {
    /// Number of reads served from memory
    pub hits: u64,
    /// Number of reads that went to the backing store or failed
    pub misses: u64,
    /// Number of clean entries evicted under memory pressure
    pub evictions: u64,
    /// Number of write actions persisted
    pub writes_flushed: u64,
    /// Number of delete actions persisted
    pub deletes_flushed: u64,
    /// Number of drain batches aborted by a backing store failure
    pub flush_failures: u64,
    /// Current number of resident entries
    pub total_entries: usize,
    /// Current memory usage in characters
    pub memory_usage: usize,
}

impl CacheStats {
    // == Constructor ==
    /// Creates a new CacheStats with all counters at zero.
    pub fn new() -> Self {
        Self::default()
    }

    // == Hit Rate ==
    /// Calculates the cache hit rate.
    ///
    /// Returns hits / (hits + misses), or 0.0 if no reads have been made.
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }

    pub fn record_hit(&mut self) {
        self.hits += 1;
    }

    pub fn record_miss(&mut self) {
        self.misses += 1;
    }

    pub fn record_write_flushed(&mut self) {
        self.writes_flushed += 1;
    }

    pub fn record_delete_flushed(&mut self) {
        self.deletes_flushed += 1;
    }

    pub fn record_flush_failure(&mut self) {
        self.flush_failures += 1;
    }
}
