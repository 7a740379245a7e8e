//! Cache Handle Module
//!
//! The per-instance façade: JSON reads and writes by path, served from the
//! shared cache state and drained to the instance's backing store.

use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use tracing::debug;

use crate::backing::{folderize_path, normalize_path, BackingStore, Listing};
use crate::cache::{measure_size, CacheContext, Lookup};
use crate::error::{CacheError, Result};

// == Cache ==
/// A cache instance over one backing store.
///
/// Keys are namespaced by the instance id, so instances created from the
/// same context never see each other's entries but share its memory budget.
#[derive(Clone)]
pub struct Cache {
    context: CacheContext,
    store: Arc<dyn BackingStore>,
    instance_id: u64,
    /// Folder prefix of a navigated view, empty at the root
    prefix: String,
}

impl Cache {
    // == Constructor ==
    pub(crate) fn new(context: &CacheContext, store: Arc<dyn BackingStore>) -> Self {
        Self {
            context: context.clone(),
            store,
            instance_id: context.next_instance_id(),
            prefix: String::new(),
        }
    }

    pub fn instance_id(&self) -> u64 {
        self.instance_id
    }

    pub fn context(&self) -> &CacheContext {
        &self.context
    }

    /// Returns a view rooted at the sub-folder `path`.
    ///
    /// The view shares this instance's id, entries and backing store.
    pub fn navigate(&self, path: &str) -> Cache {
        let prefix = folderize_path(&normalize_path(&format!("{}{}", self.prefix, path)));
        Cache {
            context: self.context.clone(),
            store: Arc::clone(&self.store),
            instance_id: self.instance_id,
            prefix,
        }
    }

    /// Maps a caller path to its backing store path and cache key.
    fn resolve(&self, path: &str) -> (String, String) {
        let path = normalize_path(&format!("{}{}", self.prefix, path));
        let key = format!("{}:{}", self.instance_id, path);
        (path, key)
    }

    /// Like [`Cache::resolve`], but refuses the root, which holds no document.
    fn resolve_document(&self, path: &str) -> Result<(String, String)> {
        let (path, key) = self.resolve(path);
        if path.is_empty() {
            return Err(CacheError::InvalidPath(
                "the root is a folder, not a document".to_string(),
            ));
        }
        Ok((path, key))
    }

    // == Get ==
    /// Reads the document at `path`.
    ///
    /// Served from memory when resident. A missing document is remembered,
    /// so repeated reads fail with [`CacheError::NotFound`] without touching
    /// the backing store again until the path is written. A backing store
    /// read that is overtaken by a write or delete of the same path never
    /// replaces the newer state.
    pub async fn get_json(&self, path: &str) -> Result<Value> {
        let (path, key) = self.resolve(path);

        loop {
            let ticket = match self.context.lock().await.lookup(&key) {
                Lookup::Hit(data) => return Ok(data),
                Lookup::NotFound(path) => return Err(CacheError::NotFound(path)),
                Lookup::Deleted => return Err(CacheError::NotFound(path)),
                Lookup::Miss(ticket) => ticket,
            };

            match self.store.read_text(&path).await {
                Ok(text) => {
                    let data: Value = serde_json::from_str(&text)?;
                    let size = measure_size(&text);
                    let loaded = self
                        .context
                        .lock()
                        .await
                        .load_clean(&ticket, &key, &path, data, size)?;
                    if let Some(data) = loaded {
                        return Ok(data);
                    }
                }
                Err(err) if err.is_not_found() => {
                    let mut state = self.context.lock().await;
                    if state.memoize_not_found(&ticket, &key, &path) {
                        debug!(key = %key, "Memoized missing document");
                        return Err(CacheError::NotFound(path));
                    }
                }
                Err(err) => return Err(CacheError::Store(err)),
            }

            debug!(key = %key, "Read overtaken by a write, reading again");
        }
    }

    /// Reads the document at `path` and decodes it into `T`.
    pub async fn get_as<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        let data = self.get_json(path).await?;
        Ok(serde_json::from_value(data)?)
    }

    // == Set ==
    /// Writes `data` at `path`.
    ///
    /// The entry is updated in memory right away and persisted by the next
    /// drain; it cannot be evicted before then.
    pub async fn set_json<T: Serialize + ?Sized>(&self, path: &str, data: &T) -> Result<()> {
        let (path, key) = self.resolve_document(path)?;
        let data = serde_json::to_value(data)?;
        let size = measure_size(&data.to_string());

        let mut state = self.context.lock().await;
        state.write(&key, &path, data, size, Arc::clone(&self.store));
        self.context.schedule_drain(&mut state);
        Ok(())
    }

    // == Delete ==
    /// Deletes the document at `path`.
    ///
    /// Reads fail with [`CacheError::NotFound`] immediately; the backing
    /// store is updated by the next drain.
    pub async fn delete(&self, path: &str) -> Result<()> {
        let (path, key) = self.resolve_document(path)?;

        let mut state = self.context.lock().await;
        state.delete(&key, &path, Arc::clone(&self.store));
        self.context.schedule_drain(&mut state);
        Ok(())
    }

    // == List ==
    /// Lists `path` in the backing store.
    ///
    /// Pending actions are drained first so the listing reflects every
    /// write and delete issued so far. Returned paths are relative to this
    /// view.
    pub async fn list(&self, path: &str) -> Result<Listing> {
        let (path, _) = self.resolve(path);

        self.context.flush().await;

        let listing = self.store.list(&path).await?;
        if self.prefix.is_empty() {
            return Ok(listing);
        }

        Ok(listing
            .into_iter()
            .filter_map(|(child, kind)| {
                child
                    .strip_prefix(self.prefix.as_str())
                    .map(|relative| (relative.to_string(), kind))
            })
            .collect())
    }
}

// == Unit Tests ==
#[cfg(test)]
mod tests {
    use super::*;
    use crate::backing::{EntryKind, MemoryStore};
    use serde::Deserialize;
    use serde_json::json;

    fn setup() -> (CacheContext, Arc<MemoryStore>, Cache) {
        let context = CacheContext::new();
        let backing = Arc::new(MemoryStore::new());
        let cache = context.cache(backing.clone());
        (context, backing, cache)
    }

    #[test]
    fn test_resolve_namespaces_keys() {
        let context = CacheContext::new();
        let first = context.cache(Arc::new(MemoryStore::new()));
        let second = context.cache(Arc::new(MemoryStore::new()));

        assert_eq!(first.resolve("/a//b"), ("a/b".to_string(), "0:a/b".to_string()));
        assert_eq!(second.resolve("a/b").1, "1:a/b");
    }

    #[test]
    fn test_navigate_prefixes_paths() {
        let context = CacheContext::new();
        let cache = context.cache(Arc::new(MemoryStore::new()));

        let view = cache.navigate("/folder/").navigate("sub");

        assert_eq!(view.instance_id(), cache.instance_id());
        assert_eq!(view.prefix, "folder/sub/");
        assert_eq!(view.resolve("doc").0, "folder/sub/doc");
        assert_eq!(view.resolve("doc").1, cache.resolve("folder/sub/doc").1);
    }

    #[tokio::test]
    async fn test_set_then_get_skips_backing_store() {
        let (_, backing, cache) = setup();

        cache.set_json("a", &json!({"x": 1})).await.unwrap();

        assert_eq!(cache.get_json("a").await.unwrap(), json!({"x": 1}));
        assert!(backing.is_empty().await);
    }

    #[tokio::test]
    async fn test_get_loads_clean_entry() {
        let (context, backing, cache) = setup();
        backing.write_text("doc", "{\"n\": 5}").await.unwrap();

        assert_eq!(cache.get_json("doc").await.unwrap(), json!({"n": 5}));

        let snapshot = context.snapshot().await;
        assert_eq!(snapshot.eviction_paths(), vec!["doc"]);
        assert_eq!(snapshot.entries["0:doc"], 9);
        assert!(snapshot.action_queue.is_empty());
    }

    #[tokio::test]
    async fn test_missing_document_is_memoized() {
        let (context, _, cache) = setup();

        let err = cache.get_json("missing").await.unwrap_err();
        assert!(matches!(&err, CacheError::NotFound(path) if path == "missing"));

        assert_eq!(context.snapshot().await.not_found, vec!["0:missing"]);
    }

    #[tokio::test]
    async fn test_invalid_json_is_not_memoized() {
        let (context, backing, cache) = setup();
        backing.write_text("bad", "{nope").await.unwrap();

        let err = cache.get_json("bad").await.unwrap_err();

        assert!(matches!(err, CacheError::Serialization(_)));
        let snapshot = context.snapshot().await;
        assert!(snapshot.not_found.is_empty());
        assert!(snapshot.entries.is_empty());
    }

    #[tokio::test]
    async fn test_get_as_decodes_typed_value() {
        #[derive(Debug, Serialize, Deserialize, PartialEq)]
        struct Settings {
            theme: String,
            volume: u8,
        }

        let (_, _, cache) = setup();
        let settings = Settings {
            theme: "dark".to_string(),
            volume: 7,
        };

        cache.set_json("settings", &settings).await.unwrap();

        let loaded: Settings = cache.get_as("settings").await.unwrap();
        assert_eq!(loaded, settings);
    }

    #[tokio::test]
    async fn test_root_is_not_a_document() {
        let (_, _, cache) = setup();

        assert!(matches!(
            cache.set_json("/", &1).await,
            Err(CacheError::InvalidPath(_))
        ));
        assert!(matches!(
            cache.navigate("folder").delete("").await,
            Err(CacheError::InvalidPath(_))
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn test_list_drains_first_and_strips_prefix() {
        let (_, _, cache) = setup();
        let view = cache.navigate("folder");

        view.set_json("one", &1).await.unwrap();
        view.set_json("nested/two", &2).await.unwrap();

        let listing = view.list("").await.unwrap();

        assert_eq!(listing.len(), 2);
        assert_eq!(listing["one"], EntryKind::File);
        assert_eq!(listing["nested"], EntryKind::Folder);
    }
}
