//! Cache Store Module
//!
//! Key/entry map with memory accounting, the eviction queue of clean
//! entries, and the eviction controller that keeps memory within budget.

use std::collections::HashMap;

use serde_json::Value;
use tracing::debug;

use crate::cache::{CacheEntry, OrderedQueue};

// == Cache Store ==
/// Resident entries plus the bookkeeping needed to evict them.
///
/// Only clean entries are members of the eviction queue. An entry with a
/// pending action is absent from it and therefore can never be evicted.
#[derive(Debug, Default)]
pub struct CacheStore {
    /// Key-entry storage, sole owner of entries
    entries: HashMap<String, CacheEntry>,
    /// Sum of all resident entry sizes
    memory_usage: usize,
    /// Clean entries ordered by last touch
    eviction_queue: OrderedQueue<String>,
    /// Memoized not-found reads, key -> path
    not_found: HashMap<String, String>,
    /// Budget in characters, None = unbounded
    max_memory_usage: Option<usize>,
    /// Entries evicted since creation
    evictions: u64,
}

impl CacheStore {
    // == Constructor ==
    /// Creates an empty store with the given character budget.
    pub fn new(max_memory_usage: Option<usize>) -> Self {
        Self {
            max_memory_usage,
            ..Self::default()
        }
    }

    // == Get ==
    /// Pure lookup, no side effect.
    pub fn get(&self, key: &str) -> Option<&CacheEntry> {
        self.entries.get(key)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    // == Put ==
    /// Inserts or replaces an entry and adjusts memory usage by the size
    /// delta, evicting clean entries if that exceeds the budget.
    ///
    /// Returns the entry, or None if it was itself evicted.
    pub fn put(&mut self, key: &str, data: Value, size: usize) -> Option<&CacheEntry> {
        let delta = match self.entries.get_mut(key) {
            Some(entry) => entry.replace(data, size),
            None => {
                self.entries
                    .insert(key.to_string(), CacheEntry::new(key, data, size));
                size as isize
            }
        };

        self.adjust_memory_usage(delta);
        self.entries.get(key)
    }

    // == Delete ==
    /// Removes an entry and its eviction queue membership.
    ///
    /// Returns the removed entry, or None if it was not resident.
    pub fn delete(&mut self, key: &str) -> Option<CacheEntry> {
        self.eviction_queue.remove(key);
        let entry = self.entries.remove(key)?;
        self.memory_usage = self.memory_usage.saturating_sub(entry.size);
        Some(entry)
    }

    // == Adjust Memory Usage ==
    /// Applies `delta`, then evicts the least recently touched clean entries
    /// until usage fits the budget.
    ///
    /// When no clean entry is left the budget stays exceeded until a pending
    /// action completes.
    ///
    /// Returns the number of entries evicted.
    pub fn adjust_memory_usage(&mut self, delta: isize) -> usize {
        self.memory_usage = self.memory_usage.saturating_add_signed(delta);

        let Some(max) = self.max_memory_usage else {
            return 0;
        };

        let mut evicted = 0;
        while self.memory_usage > max {
            let Some(key) = self.eviction_queue.dequeue() else {
                debug!(
                    memory_usage = self.memory_usage,
                    max, "Over budget with no clean entry to evict"
                );
                break;
            };

            if let Some(entry) = self.delete(&key) {
                debug!(key = %key, size = entry.size, "Evicted entry");
                evicted += 1;
            }
        }

        self.evictions += evicted as u64;
        evicted
    }

    // == Touch ==
    /// Refreshes a clean entry's position in the eviction queue.
    ///
    /// Dirty entries stay out of the queue. Returns the entry if resident.
    pub fn touch(&mut self, key: &str, timestamp: u64) -> Option<&CacheEntry> {
        let entry = self.entries.get(key)?;
        if self.eviction_queue.contains(key) {
            self.eviction_queue.requeue(key.to_string(), timestamp);
        }
        Some(entry)
    }

    // == Mark Clean ==
    /// Makes a resident entry eviction-eligible as freshly touched.
    pub fn mark_clean(&mut self, key: &str, timestamp: u64) -> bool {
        if !self.entries.contains_key(key) {
            return false;
        }
        self.eviction_queue.enqueue(key.to_string(), timestamp);
        true
    }

    // == Mark Dirty ==
    /// Removes an entry from eviction candidacy.
    pub fn mark_dirty(&mut self, key: &str) {
        self.eviction_queue.remove(key);
    }

    // == Not Found Memoization ==
    pub fn memoize_not_found(&mut self, key: &str, path: &str) {
        self.not_found.insert(key.to_string(), path.to_string());
    }

    /// Returns the memoized not-found path for a key.
    pub fn not_found(&self, key: &str) -> Option<&str> {
        self.not_found.get(key).map(String::as_str)
    }

    pub fn forget_not_found(&mut self, key: &str) {
        self.not_found.remove(key);
    }

    // == Budget ==
    /// Replaces the character budget and evicts down to it.
    ///
    /// Returns the number of entries evicted.
    pub fn set_max_memory_usage(&mut self, max_memory_usage: Option<usize>) -> usize {
        self.max_memory_usage = max_memory_usage;
        self.adjust_memory_usage(0)
    }

    pub fn max_memory_usage(&self) -> Option<usize> {
        self.max_memory_usage
    }

    // == Accessors ==
    pub fn memory_usage(&self) -> usize {
        self.memory_usage
    }

    pub fn evictions(&self) -> u64 {
        self.evictions
    }

    pub fn eviction_queue(&self) -> &OrderedQueue<String> {
        &self.eviction_queue
    }

    pub fn entries(&self) -> impl Iterator<Item = &CacheEntry> {
        self.entries.values()
    }

    /// Resident keys that start with `prefix`.
    pub fn keys_with_prefix(&self, prefix: &str) -> Vec<String> {
        self.entries
            .keys()
            .filter(|key| key.starts_with(prefix))
            .cloned()
            .collect()
    }

    pub fn not_found_keys(&self) -> impl Iterator<Item = &String> {
        self.not_found.keys()
    }

    /// Returns the current number of resident entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    // == Clear ==
    /// Drops all entries, memoized errors and counters; keeps the budget.
    pub fn clear(&mut self) {
        *self = Self::new(self.max_memory_usage);
    }
}
