//! memstash - a memory-bounded write-back cache for JSON documents
//!
//! Documents are read and written by path through a [`Cache`] instance. Reads
//! are served from memory, writes are batched and drained to a pluggable
//! [`BackingStore`] in the background, and clean entries are evicted
//! least-recently-used first once the memory budget is exceeded.

pub mod api;
pub mod backing;
pub mod cache;
pub mod config;
pub mod error;
pub mod models;
pub mod tasks;

pub use api::AppState;
pub use backing::{BackingStore, EntryKind, FsStore, Listing, MemoryStore};
pub use cache::{Cache, CacheContext, CacheStats, StateSnapshot};
pub use config::{CacheConfig, ServerConfig};
pub use error::{CacheError, Result, StoreError};
