//! Cache Entry Module
//!
//! Defines the structure for individual cached documents and how their
//! memory footprint is measured.

use serde_json::Value;

// == Cache Entry ==
/// One cached document.
///
/// Entries are owned by the store; queues only refer to them by key.
#[derive(Debug, Clone, PartialEq)]
pub struct CacheEntry {
    /// Instance-namespaced key (`"{instance}:{path}"`)
    pub key: String,
    /// The decoded document
    pub data: Value,
    /// Serialized length used for memory accounting
    pub size: usize,
}

impl CacheEntry {
    // == Constructor ==
    /// Creates a new entry.
    ///
    /// # Arguments
    /// * `key` - The namespaced key
    /// * `data` - The decoded document
    /// * `size` - Size of the serialized form, see [`measure_size`]
    pub fn new(key: impl Into<String>, data: Value, size: usize) -> Self {
        Self {
            key: key.into(),
            data,
            size,
        }
    }

    // == Replace ==
    /// Swaps in new data and returns the size delta.
    pub fn replace(&mut self, data: Value, size: usize) -> isize {
        let delta = size as isize - self.size as isize;
        self.data = data;
        self.size = size;
        delta
    }
}

// == Utility Functions ==
/// Returns the character length of a serialized document.
///
/// Characters are counted as UTF-16 code units, matching the two-bytes-per-
/// character assumption behind the configured byte budget.
pub fn measure_size(text: &str) -> usize {
    text.encode_utf16().count()
}
