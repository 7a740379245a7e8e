//! Action Ledger Module
//!
//! Pending persistence intents, at most one per key, ordered by when they
//! were first filed.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use serde::Serialize;

use crate::backing::BackingStore;
use crate::cache::OrderedQueue;

// == Action Kind ==
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ActionKind {
    /// Persist the entry's current data
    Write,
    /// Remove the path from the backing store
    Delete,
}

// == Action ==
/// A pending persistence intent for one key.
///
/// Write payloads are not copied here: a pending write pins its entry in the
/// store, so the data is read from the entry when the action executes.
#[derive(Clone)]
pub struct Action {
    pub kind: ActionKind,
    /// Path inside the owning instance's backing store
    pub path: String,
    /// Backing store of the instance that filed the action
    pub store: Arc<dyn BackingStore>,
    /// Bumped every time the action is refiled
    pub generation: u64,
}

impl fmt::Debug for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Action")
            .field("kind", &self.kind)
            .field("path", &self.path)
            .field("generation", &self.generation)
            .finish_non_exhaustive()
    }
}

// == Action Ledger ==
#[derive(Debug, Default)]
pub struct ActionLedger {
    /// Pending action per key
    actions: HashMap<String, Action>,
    /// Keys in filing order
    queue: OrderedQueue<String>,
    /// Source of action generations
    next_generation: u64,
}

impl ActionLedger {
    // == Constructor ==
    pub fn new() -> Self {
        Self::default()
    }

    // == File ==
    /// Records an intent for `key`.
    ///
    /// A key that already has a pending action keeps its queue position; only
    /// the kind, path and store are replaced. Returns true if the key had no
    /// pending action before.
    pub fn file(
        &mut self,
        key: &str,
        kind: ActionKind,
        path: &str,
        store: Arc<dyn BackingStore>,
        timestamp: u64,
    ) -> bool {
        self.next_generation += 1;
        let generation = self.next_generation;

        if let Some(action) = self.actions.get_mut(key) {
            action.kind = kind;
            action.path = path.to_string();
            action.store = store;
            action.generation = generation;
            return false;
        }

        self.actions.insert(
            key.to_string(),
            Action {
                kind,
                path: path.to_string(),
                store,
                generation,
            },
        );
        self.queue.enqueue(key.to_string(), timestamp);
        true
    }

    pub fn get(&self, key: &str) -> Option<&Action> {
        self.actions.get(key)
    }

    /// Kind of the action pending for `key`, if any.
    pub fn pending_kind(&self, key: &str) -> Option<ActionKind> {
        self.actions.get(key).map(|action| action.kind)
    }

    // == Batch ==
    /// Up to `n` actions from the front of the queue, without removing them.
    pub fn batch(&self, n: usize) -> Vec<(String, Action)> {
        self.queue
            .head(n)
            .into_iter()
            .filter_map(|key| {
                let action = self.actions.get(&key)?.clone();
                Some((key, action))
            })
            .collect()
    }

    // == Complete ==
    /// Clears the action for `key` if it is still the given generation.
    ///
    /// Returns None when the action was refiled in the meantime; the newer
    /// intent then stays pending.
    pub fn complete(&mut self, key: &str, generation: u64) -> Option<Action> {
        if self.actions.get(key)?.generation != generation {
            return None;
        }
        self.queue.remove(key);
        self.actions.remove(key)
    }

    /// Drops the action for `key` whatever its generation.
    pub fn discard(&mut self, key: &str) -> Option<Action> {
        let action = self.actions.remove(key)?;
        self.queue.remove(key);
        Some(action)
    }

    /// Keys with a pending action that start with `prefix`.
    pub fn keys_with_prefix(&self, prefix: &str) -> Vec<String> {
        self.actions
            .keys()
            .filter(|key| key.starts_with(prefix))
            .cloned()
            .collect()
    }

    // == Accessors ==
    pub fn queue(&self) -> &OrderedQueue<String> {
        &self.queue
    }

    pub fn len(&self) -> usize {
        self.actions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.actions.is_empty()
    }

    pub fn clear(&mut self) {
        self.actions.clear();
        self.queue.clear();
    }
}
