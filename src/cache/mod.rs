//! Cache Module
//!
//! Memory-bounded write-back caching of JSON documents: the ordered queues,
//! the entry store with its eviction controller, the action ledger, and the
//! per-instance façade.

mod context;
mod entry;
mod handle;
mod ledger;
mod queue;
mod state;
mod stats;
mod store;


use std::time::Duration;

// Re-export public types
pub use context::CacheContext;
pub use entry::{measure_size, CacheEntry};
pub use handle::Cache;
pub use ledger::{Action, ActionKind, ActionLedger};
pub use queue::{OrderedQueue, QueueItem};
pub(crate) use state::DrainLoop;
pub use state::{
    CacheState, DrainHandle, Lookup, PendingFlush, QueuedAction, ReadTicket, StateSnapshot,
};
pub use stats::CacheStats;
pub use store::CacheStore;

// == Public Constants ==
/// Delay before each drain batch
pub const DRAIN_INTERVAL: Duration = Duration::from_millis(100);

/// Maximum number of actions persisted per drain batch
pub const MAX_BATCH_SIZE: usize = 100;
