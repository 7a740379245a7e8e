//! In-memory backing store.

use std::collections::BTreeMap;

use async_trait::async_trait;
use tokio::sync::RwLock;

use super::{folderize_path, normalize_path, BackingStore, EntryKind, Listing, StoreResult};
use crate::error::StoreError;

// == Memory Store ==
/// Backing store holding every path in a sorted map.
///
/// Useful for tests and for embedding the cache without persistence.
#[derive(Debug, Default)]
pub struct MemoryStore {
    files: RwLock<BTreeMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored paths.
    pub async fn len(&self) -> usize {
        self.files.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.files.read().await.is_empty()
    }
}

#[async_trait]
impl BackingStore for MemoryStore {
    async fn read_text(&self, path: &str) -> StoreResult<String> {
        let path = normalize_path(path);
        self.files
            .read()
            .await
            .get(&path)
            .cloned()
            .ok_or(StoreError::NotFound(path))
    }

    async fn write_text(&self, path: &str, text: &str) -> StoreResult<()> {
        let path = normalize_path(path);
        if path.is_empty() {
            return Err(StoreError::Backend("Cannot write to the root".to_string()));
        }
        self.files.write().await.insert(path, text.to_string());
        Ok(())
    }

    async fn delete_entry(&self, path: &str) -> StoreResult<()> {
        let path = normalize_path(path);
        let folder = folderize_path(&path);
        let mut files = self.files.write().await;

        files.remove(&path);
        // Deleting a folder deletes everything under it
        files.retain(|key, _| !key.starts_with(&folder) || folder.is_empty());
        Ok(())
    }

    async fn list(&self, path: &str) -> StoreResult<Listing> {
        let path = normalize_path(path);
        let folder = folderize_path(&path);
        let files = self.files.read().await;
        let mut listing = Listing::new();

        if files.contains_key(&path) {
            listing.insert(path.clone(), EntryKind::File);
        }

        for key in files.range(folder.clone()..).map(|(key, _)| key) {
            let Some(rest) = key.strip_prefix(&folder) else {
                break;
            };
            match rest.find('/') {
                None => listing.insert(key.clone(), EntryKind::File),
                Some(slash) => listing.insert(
                    key[..folder.len() + slash].to_string(),
                    EntryKind::Folder,
                ),
            };
        }

        Ok(listing)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn seeded() -> MemoryStore {
        let store = MemoryStore::new();
        store.write_text("File-A", "1").await.unwrap();
        store.write_text("Folder-A", "2").await.unwrap();
        store.write_text("Folder-A/File-B", "3").await.unwrap();
        store.write_text("Folder-A/Sub/File-C", "4").await.unwrap();
        store
    }

    #[tokio::test]
    async fn test_read_write() {
        let store = MemoryStore::new();
        store.write_text("/a//b", "hello").await.unwrap();

        assert_eq!(store.read_text("a/b").await.unwrap(), "hello");
        assert_eq!(store.len().await, 1);
    }

    #[tokio::test]
    async fn test_read_missing_is_not_found() {
        let store = MemoryStore::new();

        let err = store.read_text("missing").await.unwrap_err();
        assert!(err.is_not_found());
        assert_eq!(err.path(), Some("missing"));
    }

    #[tokio::test]
    async fn test_write_root_is_rejected() {
        let store = MemoryStore::new();
        assert!(store.write_text("/", "x").await.is_err());
    }

    #[tokio::test]
    async fn test_delete_missing_is_ok() {
        let store = MemoryStore::new();
        assert!(store.delete_entry("nothing").await.is_ok());
    }

    #[tokio::test]
    async fn test_delete_folder_removes_children() {
        let store = seeded().await;

        store.delete_entry("Folder-A").await.unwrap();

        let listing = store.list("").await.unwrap();
        assert_eq!(listing.len(), 1);
        assert_eq!(listing.get("File-A"), Some(&EntryKind::File));
    }

    #[tokio::test]
    async fn test_list_root() {
        let store = seeded().await;

        let listing = store.list("").await.unwrap();
        assert_eq!(
            listing,
            Listing::from([
                ("File-A".to_string(), EntryKind::File),
                ("Folder-A".to_string(), EntryKind::Folder),
            ])
        );
    }

    #[tokio::test]
    async fn test_list_file() {
        let store = seeded().await;

        let listing = store.list("File-A").await.unwrap();
        assert_eq!(listing, Listing::from([("File-A".to_string(), EntryKind::File)]));
    }

    #[tokio::test]
    async fn test_list_folder_that_is_also_a_file() {
        let store = seeded().await;

        let listing = store.list("Folder-A").await.unwrap();
        assert_eq!(
            listing,
            Listing::from([
                ("Folder-A".to_string(), EntryKind::File),
                ("Folder-A/File-B".to_string(), EntryKind::File),
                ("Folder-A/Sub".to_string(), EntryKind::Folder),
            ])
        );
    }

    #[tokio::test]
    async fn test_list_missing_is_empty() {
        let store = seeded().await;
        assert!(store.list("nowhere").await.unwrap().is_empty());
    }
}
