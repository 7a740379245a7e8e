//! Filesystem backing store rooted at a directory.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::fs;

use super::{folderize_path, normalize_path, BackingStore, EntryKind, Listing, StoreResult};
use crate::error::StoreError;

// == Fs Store ==
/// Backing store mapping each path to a file below `root`.
#[derive(Debug, Clone)]
pub struct FsStore {
    root: PathBuf,
}

impl FsStore {
    /// Creates a store rooted at `root`. The directory is created lazily on
    /// first write.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Normalizes `path` and maps it below the root.
    fn resolve(&self, path: &str) -> StoreResult<(String, PathBuf)> {
        let path = normalize_path(path);
        let mut full = self.root.clone();
        for segment in path.split('/').filter(|s| !s.is_empty()) {
            if segment == ".." {
                return Err(StoreError::Backend(format!(
                    "Path escapes the store root: \"{path}\""
                )));
            }
            full.push(segment);
        }
        Ok((path, full))
    }
}

#[async_trait]
impl BackingStore for FsStore {
    async fn read_text(&self, path: &str) -> StoreResult<String> {
        let (path, full) = self.resolve(path)?;
        fs::read_to_string(&full).await.map_err(|err| match err.kind() {
            ErrorKind::NotFound => StoreError::NotFound(path),
            _ => StoreError::io(path, err),
        })
    }

    async fn write_text(&self, path: &str, text: &str) -> StoreResult<()> {
        let (path, full) = self.resolve(path)?;
        if path.is_empty() {
            return Err(StoreError::Backend("Cannot write to the root".to_string()));
        }
        if let Some(parent) = full.parent() {
            fs::create_dir_all(parent)
                .await
                .map_err(|err| StoreError::io(path.as_str(), err))?;
        }
        fs::write(&full, text)
            .await
            .map_err(|err| StoreError::io(path, err))
    }

    async fn delete_entry(&self, path: &str) -> StoreResult<()> {
        let (path, full) = self.resolve(path)?;
        if path.is_empty() {
            return Err(StoreError::Backend("Cannot delete the root".to_string()));
        }

        let result = match fs::metadata(&full).await {
            Ok(meta) if meta.is_dir() => fs::remove_dir_all(&full).await,
            Ok(_) => fs::remove_file(&full).await,
            Err(err) => Err(err),
        };

        match result {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(()),
            Err(err) => Err(StoreError::io(path, err)),
        }
    }

    async fn list(&self, path: &str) -> StoreResult<Listing> {
        let (path, full) = self.resolve(path)?;
        let mut listing = Listing::new();

        let meta = match fs::metadata(&full).await {
            Ok(meta) => meta,
            Err(err) if err.kind() == ErrorKind::NotFound => return Ok(listing),
            Err(err) => return Err(StoreError::io(path, err)),
        };

        if meta.is_file() {
            listing.insert(path, EntryKind::File);
            return Ok(listing);
        }

        let folder = folderize_path(&path);
        let mut dir = fs::read_dir(&full)
            .await
            .map_err(|err| StoreError::io(path.as_str(), err))?;

        while let Some(child) = dir
            .next_entry()
            .await
            .map_err(|err| StoreError::io(path.as_str(), err))?
        {
            let file_type = child
                .file_type()
                .await
                .map_err(|err| StoreError::io(path.as_str(), err))?;
            let kind = if file_type.is_dir() {
                EntryKind::Folder
            } else {
                EntryKind::File
            };
            let name = child.file_name().to_string_lossy().into_owned();
            listing.insert(format!("{folder}{name}"), kind);
        }

        Ok(listing)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_maps_below_root() {
        let store = FsStore::new("/tmp/root");

        let (path, full) = store.resolve("/a//b/").unwrap();
        assert_eq!(path, "a/b");
        assert_eq!(full, PathBuf::from("/tmp/root").join("a").join("b"));
    }

    #[test]
    fn test_resolve_rejects_parent_segments() {
        let store = FsStore::new("/tmp/root");
        assert!(matches!(
            store.resolve("a/../../etc"),
            Err(StoreError::Backend(_))
        ));
    }
}
