//! Shared Cache State Module
//!
//! Everything shared by the instances of one context: the store, the action
//! ledger, configuration, statistics and the in-flight drain handle. Each
//! method is one atomic transition; callers hold the context lock for its
//! whole duration and never across backing store I/O.

use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use futures::future::{BoxFuture, Shared};
use serde::Serialize;
use serde_json::Value;
use tokio::task::AbortHandle;
use tracing::{debug, warn};

use crate::backing::{folderize_path, BackingStore};
use crate::cache::{ActionKind, ActionLedger, CacheStats, CacheStore};
use crate::config::CacheConfig;
use crate::error::{CacheError, Result};

/// Join-able completion signal of a drain loop.
pub type DrainHandle = Shared<BoxFuture<'static, ()>>;

// == Drain Loop ==
/// The in-flight drain loop of a context.
pub(crate) struct DrainLoop {
    pub(crate) handle: DrainHandle,
    pub(crate) task: AbortHandle,
}

// == Lookup ==
/// Outcome of consulting the cache before going to the backing store.
#[derive(Debug, PartialEq)]
pub enum Lookup {
    /// Resident entry
    Hit(Value),
    /// Memoized not-found read for the path
    NotFound(String),
    /// A delete of the path or one of its folders is pending
    Deleted,
    /// Nothing known, ask the backing store
    Miss(ReadTicket),
}

// == Read Ticket ==
/// Held by a read-miss while the backing store read is in flight.
///
/// Mutations are only tracked while at least one ticket is alive, so a
/// read that returns late can tell that its result is stale.
#[derive(Debug)]
pub struct ReadTicket {
    /// Clock value at the miss
    since: u64,
    in_flight: Arc<AtomicUsize>,
}

impl ReadTicket {
    fn new(since: u64, in_flight: &Arc<AtomicUsize>) -> Self {
        in_flight.fetch_add(1, Ordering::SeqCst);
        Self {
            since,
            in_flight: Arc::clone(in_flight),
        }
    }
}

impl Drop for ReadTicket {
    fn drop(&mut self) {
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
    }
}

impl PartialEq for ReadTicket {
    fn eq(&self, other: &Self) -> bool {
        self.since == other.since
    }
}

/// Last write or delete filed for a key.
#[derive(Debug, Clone, Copy)]
struct Mutation {
    at: u64,
    kind: ActionKind,
}

// == Pending Flush ==
/// One action selected for execution, detached from the lock.
pub struct PendingFlush {
    pub key: String,
    pub path: String,
    pub store: Arc<dyn BackingStore>,
    pub generation: u64,
    /// Serialized document for writes, None for deletes
    pub text: Option<String>,
}

// == Cache State ==
pub struct CacheState {
    pub(crate) config: CacheConfig,
    pub(crate) store: CacheStore,
    pub(crate) ledger: ActionLedger,
    pub(crate) stats: CacheStats,
    /// In-flight drain loop, if any
    pub(crate) drain: Option<DrainLoop>,
    /// Logical clock for queue timestamps
    clock: u64,
    /// Mutations filed while read-misses were in flight
    mutations: HashMap<String, Mutation>,
    /// Live read tickets
    reads_in_flight: Arc<AtomicUsize>,
}

impl CacheState {
    // == Constructor ==
    pub fn new(config: CacheConfig) -> Self {
        Self {
            store: CacheStore::new(config.char_budget()),
            config,
            ledger: ActionLedger::new(),
            stats: CacheStats::new(),
            drain: None,
            clock: 0,
            mutations: HashMap::new(),
            reads_in_flight: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Advances the logical clock.
    fn tick(&mut self) -> u64 {
        self.clock += 1;
        self.clock
    }

    /// Records a write or delete for the benefit of in-flight reads.
    ///
    /// Tickets are only issued under the context lock, so with none alive
    /// the history can be dropped.
    fn record_mutation(&mut self, key: &str, kind: ActionKind, at: u64) {
        if self.reads_in_flight.load(Ordering::SeqCst) == 0 {
            self.mutations.clear();
            return;
        }
        self.mutations.insert(key.to_string(), Mutation { at, kind });
    }

    /// Latest mutation affecting `key` after `since`: its own writes and
    /// deletes, or a delete of one of its folders.
    fn mutated_since(&self, key: &str, since: u64) -> Option<ActionKind> {
        let own = self.mutations.get(key).copied();
        let folders = key
            .match_indices('/')
            .filter_map(|(end, _)| self.mutations.get(&key[..end]).copied())
            .filter(|mutation| mutation.kind == ActionKind::Delete);

        own.into_iter()
            .chain(folders)
            .filter(|mutation| mutation.at > since)
            .max_by_key(|mutation| mutation.at)
            .map(|mutation| mutation.kind)
    }

    /// Whether a delete is pending for `key` or one of its folders.
    fn delete_pending(&self, key: &str) -> bool {
        std::iter::once(key)
            .chain(key.match_indices('/').map(|(end, _)| &key[..end]))
            .any(|key| self.ledger.pending_kind(key) == Some(ActionKind::Delete))
    }

    // == Lookup ==
    /// Serves a read from memory if possible, touching the entry.
    pub fn lookup(&mut self, key: &str) -> Lookup {
        let now = self.tick();
        if let Some(entry) = self.store.touch(key, now) {
            let data = entry.data.clone();
            self.stats.record_hit();
            return Lookup::Hit(data);
        }

        self.stats.record_miss();
        if let Some(path) = self.store.not_found(key) {
            return Lookup::NotFound(path.to_string());
        }
        if self.delete_pending(key) {
            return Lookup::Deleted;
        }
        Lookup::Miss(ReadTicket::new(now, &self.reads_in_flight))
    }

    // == Load Clean ==
    /// Inserts a document just read from the backing store as a clean entry.
    ///
    /// If the key was written or deleted after the miss, the newer local
    /// state wins and nothing is inserted. `Ok(None)` means a newer write
    /// already left the cache again, so the read must be repeated.
    pub fn load_clean(
        &mut self,
        ticket: &ReadTicket,
        key: &str,
        path: &str,
        data: Value,
        size: usize,
    ) -> Result<Option<Value>> {
        if let Some(entry) = self.store.get(key) {
            return Ok(Some(entry.data.clone()));
        }
        if self.delete_pending(key) {
            return Err(CacheError::NotFound(path.to_string()));
        }
        match self.mutated_since(key, ticket.since) {
            Some(ActionKind::Delete) => return Err(CacheError::NotFound(path.to_string())),
            Some(ActionKind::Write) => {
                debug!(key = %key, "Discarding stale read");
                return Ok(None);
            }
            None => {}
        }

        self.store.put(key, data.clone(), size);
        let now = self.tick();
        self.store.mark_clean(key, now);
        // The loaded entry itself may not fit next to dirty entries
        self.store.adjust_memory_usage(0);
        debug!(key = %key, size, "Loaded entry from backing store");
        Ok(Some(data))
    }

    // == Memoize Not Found ==
    /// Remembers that `path` is absent.
    ///
    /// Returns false, memoizing nothing, if the key was written after the
    /// miss; the document exists now and the read must be repeated.
    pub fn memoize_not_found(&mut self, ticket: &ReadTicket, key: &str, path: &str) -> bool {
        if self.store.contains(key)
            || self.ledger.pending_kind(key) == Some(ActionKind::Write)
            || self.mutated_since(key, ticket.since) == Some(ActionKind::Write)
        {
            debug!(key = %key, "Discarding stale not-found read");
            return false;
        }
        self.store.memoize_not_found(key, path);
        true
    }

    // == Write ==
    /// Stores `data` as a dirty entry and files a write action for it.
    pub fn write(
        &mut self,
        key: &str,
        path: &str,
        data: Value,
        size: usize,
        store: Arc<dyn BackingStore>,
    ) {
        self.store.forget_not_found(key);
        // Dirty before resizing, so the entry cannot evict itself
        self.store.mark_dirty(key);
        let now = self.tick();
        self.ledger.file(key, ActionKind::Write, path, store, now);
        self.record_mutation(key, ActionKind::Write, now);
        self.store.put(key, data, size);
        debug!(key = %key, size, "Filed write action");
    }

    // == Delete ==
    /// Drops the entry immediately and files a delete action.
    ///
    /// The backing store deletes folders recursively, so resident entries
    /// and pending actions below `key` are dropped as well.
    pub fn delete(&mut self, key: &str, path: &str, store: Arc<dyn BackingStore>) {
        self.store.delete(key);

        let folder = folderize_path(key);
        let children = self.store.keys_with_prefix(&folder);
        for child in &children {
            self.store.delete(child);
        }
        let superseded = self.ledger.keys_with_prefix(&folder);
        for child in &superseded {
            self.ledger.discard(child);
        }

        let now = self.tick();
        self.ledger.file(key, ActionKind::Delete, path, store, now);
        self.record_mutation(key, ActionKind::Delete, now);
        debug!(
            key = %key,
            children = children.len(),
            superseded = superseded.len(),
            "Filed delete action"
        );
    }

    // == Next Batch ==
    /// Selects up to `max` actions from the front of the action queue.
    ///
    /// Actions stay in the ledger until [`CacheState::complete`] clears them.
    pub fn next_batch(&mut self, max: usize) -> Vec<PendingFlush> {
        let mut batch = Vec::new();

        for (key, action) in self.ledger.batch(max) {
            let text = match action.kind {
                ActionKind::Delete => None,
                ActionKind::Write => match self.store.get(&key) {
                    Some(entry) => Some(entry.data.to_string()),
                    None => {
                        warn!(key = %key, "Dropping write action without a resident entry");
                        self.ledger.complete(&key, action.generation);
                        continue;
                    }
                },
            };

            batch.push(PendingFlush {
                key,
                path: action.path,
                store: action.store,
                generation: action.generation,
                text,
            });
        }

        batch
    }

    // == Complete ==
    /// Marks an executed action done.
    ///
    /// A written entry becomes clean and freshly touched. Superseded actions
    /// are left pending.
    pub fn complete(&mut self, key: &str, generation: u64) {
        let Some(action) = self.ledger.complete(key, generation) else {
            debug!(key = %key, "Action superseded while flushing");
            return;
        };

        match action.kind {
            ActionKind::Write => {
                let now = self.tick();
                self.store.mark_clean(key, now);
                self.stats.record_write_flushed();
            }
            ActionKind::Delete => self.stats.record_delete_flushed(),
        }
    }

    // == Evict ==
    /// Runs the eviction controller without changing memory usage.
    pub fn evict(&mut self) -> usize {
        self.store.adjust_memory_usage(0)
    }

    // == Configuration ==
    pub fn set_config(&mut self, config: CacheConfig) {
        self.store.set_max_memory_usage(config.char_budget());
        self.config = config;
    }

    /// Drops entries, actions, memoized errors and counters; keeps config.
    pub fn clear(&mut self) {
        self.store.clear();
        self.ledger.clear();
        self.mutations.clear();
        self.stats = CacheStats::new();
    }

    /// Clears everything and restores the default config.
    pub fn reset(&mut self) {
        self.clear();
        self.set_config(CacheConfig::default());
    }

    // == Stats ==
    pub fn stats(&self) -> CacheStats {
        let mut stats = self.stats.clone();
        stats.evictions = self.store.evictions();
        stats.total_entries = self.store.len();
        stats.memory_usage = self.store.memory_usage();
        stats
    }

    // == Snapshot ==
    pub fn snapshot(&self) -> StateSnapshot {
        let mut not_found: Vec<String> = self.store.not_found_keys().cloned().collect();
        not_found.sort();

        StateSnapshot {
            entries: self
                .store
                .entries()
                .map(|entry| (entry.key.clone(), entry.size))
                .collect(),
            memory_usage: self.store.memory_usage(),
            max_memory_usage: self.store.max_memory_usage(),
            eviction_queue: self.store.eviction_queue().keys(),
            action_queue: self
                .ledger
                .queue()
                .keys()
                .into_iter()
                .filter_map(|key| {
                    let kind = self.ledger.pending_kind(&key)?;
                    Some(QueuedAction { key, kind })
                })
                .collect(),
            not_found,
            draining: self.drain.is_some(),
            stats: self.stats(),
        }
    }
}

// == State Snapshot ==
/// Point-in-time copy of the shared state, for tests and diagnostics.
#[derive(Debug, Clone, Serialize)]
pub struct StateSnapshot {
    /// Resident keys and their sizes
    pub entries: BTreeMap<String, usize>,
    pub memory_usage: usize,
    /// Budget in characters
    pub max_memory_usage: Option<usize>,
    /// Clean keys, next eviction victim first
    pub eviction_queue: Vec<String>,
    /// Pending actions, next to flush first
    pub action_queue: Vec<QueuedAction>,
    /// Keys with a memoized not-found read
    pub not_found: Vec<String>,
    /// Whether a drain loop is in flight
    pub draining: bool,
    pub stats: CacheStats,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct QueuedAction {
    pub key: String,
    pub kind: ActionKind,
}

impl StateSnapshot {
    /// Resident paths with the instance prefix stripped, sorted.
    pub fn resident_paths(&self) -> Vec<String> {
        self.entries.keys().map(|key| strip_instance(key)).collect()
    }

    /// Eviction queue paths with the instance prefix stripped, in order.
    pub fn eviction_paths(&self) -> Vec<String> {
        self.eviction_queue.iter().map(|key| strip_instance(key)).collect()
    }

    /// Sum of resident entry sizes.
    pub fn resident_size(&self) -> usize {
        self.entries.values().sum()
    }
}

fn strip_instance(key: &str) -> String {
    key.split_once(':')
        .map_or(key, |(_, path)| path)
        .to_string()
}
