//! Ordered Queue Module
//!
//! A queue of keys kept sorted by `(timestamp, key)`, used both for picking
//! eviction victims and for ordering pending persistence actions.

use std::borrow::Borrow;
use std::cmp::Ordering;
use std::collections::{HashMap, VecDeque};
use std::hash::Hash;

use serde::Serialize;

// == Queue Item ==
/// A key paired with its logical timestamp.
///
/// Field order matters: the derived `Ord` compares `timestamp` first and
/// falls back to `key`, which is the queue's ordering.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize)]
pub struct QueueItem<K> {
    /// Logical time of the last enqueue
    pub timestamp: u64,
    /// Item identity
    pub key: K,
}

// == Ordered Queue ==
/// Keys ordered by `(timestamp, key)` ascending.
///
/// - Front = lowest timestamp (next to dequeue)
/// - Back = highest timestamp
///
/// A side index maps each key to its timestamp so that `remove` can locate
/// the item by binary search instead of scanning.
#[derive(Debug)]
pub struct OrderedQueue<K> {
    /// Items sorted by `(timestamp, key)`
    items: VecDeque<QueueItem<K>>,
    /// Timestamp index, one entry per queued key
    timestamps: HashMap<K, u64>,
}

impl<K> Default for OrderedQueue<K> {
    fn default() -> Self {
        Self {
            items: VecDeque::new(),
            timestamps: HashMap::new(),
        }
    }
}

impl<K: Ord + Hash + Clone> OrderedQueue<K> {
    // == Constructor ==
    /// Creates a new empty queue.
    pub fn new() -> Self {
        Self::default()
    }

    // == Enqueue ==
    /// Inserts `key` at the position given by `timestamp`.
    ///
    /// Equal timestamps sort by key. A key that is already queued is moved,
    /// never duplicated.
    pub fn enqueue(&mut self, key: K, timestamp: u64) {
        self.remove(&key);

        let item = QueueItem { timestamp, key };
        // Fresh touches almost always land at the back
        let index = match self.items.back() {
            None => 0,
            Some(last) if *last < item => self.items.len(),
            Some(_) => self.items.partition_point(|queued| *queued < item),
        };

        self.timestamps.insert(item.key.clone(), timestamp);
        self.items.insert(index, item);
    }

    // == Dequeue ==
    /// Removes and returns the lowest-ordered key.
    ///
    /// Returns None if the queue is empty.
    pub fn dequeue(&mut self) -> Option<K> {
        let item = self.items.pop_front()?;
        self.timestamps.remove(&item.key);
        Some(item.key)
    }

    // == Requeue ==
    /// Moves `key` to the position given by `timestamp`, queuing it if it
    /// was absent.
    pub fn requeue(&mut self, key: K, timestamp: u64) {
        self.enqueue(key, timestamp);
    }

    // == Remove ==
    /// Removes a key from the queue.
    ///
    /// Returns true if the key was queued. Removing an absent key is a no-op.
    pub fn remove<Q>(&mut self, key: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: Ord + Hash + ?Sized,
    {
        let Some(timestamp) = self.timestamps.remove(key) else {
            return false;
        };

        if let Some(index) = self.index_of(key, timestamp) {
            self.items.remove(index);
        }
        true
    }

    // == Index Of ==
    /// Binary search using the same comparator as insertion.
    fn index_of<Q>(&self, key: &Q, timestamp: u64) -> Option<usize>
    where
        K: Borrow<Q>,
        Q: Ord + ?Sized,
    {
        self.items
            .binary_search_by(|queued| match queued.timestamp.cmp(&timestamp) {
                Ordering::Equal => Borrow::<Q>::borrow(&queued.key).cmp(key),
                other => other,
            })
            .ok()
    }

    // == Peek ==
    /// Returns the lowest-ordered key without removing it.
    pub fn peek(&self) -> Option<&K> {
        self.items.front().map(|item| &item.key)
    }

    // == Head ==
    /// Returns up to `n` keys from the front, in order, without removing them.
    pub fn head(&self, n: usize) -> Vec<K> {
        self.items.iter().take(n).map(|item| item.key.clone()).collect()
    }

    // == List ==
    /// Live ordered view of the queue.
    pub fn list(&self) -> impl Iterator<Item = &QueueItem<K>> {
        self.items.iter()
    }

    // == Keys ==
    /// Queued keys in order.
    pub fn keys(&self) -> Vec<K> {
        self.items.iter().map(|item| item.key.clone()).collect()
    }

    // == Timestamp Of ==
    /// Returns the timestamp a key is queued under.
    pub fn timestamp_of<Q>(&self, key: &Q) -> Option<u64>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.timestamps.get(key).copied()
    }

    // == Contains ==
    /// Checks if a key is queued.
    pub fn contains<Q>(&self, key: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.timestamps.contains_key(key)
    }

    // == Length ==
    /// Returns the number of queued keys.
    pub fn len(&self) -> usize {
        self.items.len()
    }

    // == Is Empty ==
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    // == Clear ==
    pub fn clear(&mut self) {
        self.items.clear();
        self.timestamps.clear();
    }
}
