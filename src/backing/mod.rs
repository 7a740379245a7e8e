//! Backing Store Module
//!
//! The durable key/text store the cache sits in front of, plus two
//! implementations: an in-memory map and a directory on disk.

mod fs;
mod memory;
mod paths;

use std::collections::BTreeMap;

use async_trait::async_trait;
use serde::Serialize;

use crate::error::StoreError;

pub use fs::FsStore;
pub use memory::MemoryStore;
pub use paths::{folderize_path, normalize_path};

// == Listing ==
/// Kind of a listed path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum EntryKind {
    File,
    Folder,
}

/// Listed paths mapped to their kind, keyed by full path.
pub type Listing = BTreeMap<String, EntryKind>;

/// Convenience Result type for backing store calls.
pub type StoreResult<T> = std::result::Result<T, StoreError>;

// == Backing Store Trait ==
/// Durable text storage addressed by `/`-separated paths.
///
/// Implementations must report a missing path on `read_text` with an error
/// for which [`StoreError::is_not_found`] is true; the cache memoizes those.
#[async_trait]
pub trait BackingStore: Send + Sync + 'static {
    /// Reads the text stored at `path`.
    async fn read_text(&self, path: &str) -> StoreResult<String>;

    /// Stores `text` at `path`, replacing any previous content.
    async fn write_text(&self, path: &str, text: &str) -> StoreResult<()>;

    /// Removes `path`. Removing an absent path succeeds.
    async fn delete_entry(&self, path: &str) -> StoreResult<()>;

    /// Lists `path` itself if it is a file, and its direct children if it is
    /// a folder. The empty path lists the root.
    async fn list(&self, path: &str) -> StoreResult<Listing>;
}
