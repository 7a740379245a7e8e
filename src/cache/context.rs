//! Cache Context Module
//!
//! The shared context every cache instance is created from. It owns the
//! process-wide state (store, ledger, budget) and schedules draining.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use tokio::sync::{Mutex, MutexGuard};
use tracing::info;

use crate::backing::BackingStore;
use crate::cache::{Cache, CacheState, CacheStats, DrainHandle, StateSnapshot};
use crate::config::CacheConfig;
use crate::error::Result;
use crate::tasks::spawn_drain_task;

// == Cache Context ==
/// Shared state behind every [`Cache`] created from it.
///
/// Cloning is cheap and yields a handle to the same state. Instances created
/// from one context share its memory budget and its drain loop; separate
/// contexts are fully isolated.
#[derive(Clone)]
pub struct CacheContext {
    inner: Arc<ContextInner>,
}

struct ContextInner {
    state: Mutex<CacheState>,
    next_instance_id: AtomicU64,
}

impl CacheContext {
    // == Constructor ==
    /// Creates a context with the default (unbounded) configuration.
    pub fn new() -> Self {
        Self::from_state(CacheState::new(CacheConfig::default()))
    }

    /// Creates a context with a validated configuration.
    pub fn with_config(config: CacheConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self::from_state(CacheState::new(config)))
    }

    fn from_state(state: CacheState) -> Self {
        Self {
            inner: Arc::new(ContextInner {
                state: Mutex::new(state),
                next_instance_id: AtomicU64::new(0),
            }),
        }
    }

    // == Instances ==
    /// Creates a cache instance over `store`.
    pub fn cache(&self, store: Arc<dyn BackingStore>) -> Cache {
        Cache::new(self, store)
    }

    /// Hands out unique, increasing instance ids.
    pub(crate) fn next_instance_id(&self) -> u64 {
        self.inner.next_instance_id.fetch_add(1, Ordering::Relaxed)
    }

    // == Configuration ==
    /// Validates and applies a new configuration.
    ///
    /// A smaller budget evicts clean entries right away.
    pub async fn set_config(&self, config: CacheConfig) -> Result<()> {
        config.validate()?;
        info!(
            max_memory_usage = ?config.max_memory_usage,
            drain_interval_ms = config.drain_interval.as_millis() as u64,
            max_batch_size = config.max_batch_size,
            "Cache configuration updated"
        );
        self.lock().await.set_config(config);
        Ok(())
    }

    pub async fn config(&self) -> CacheConfig {
        self.lock().await.config.clone()
    }

    /// Clears all entries, actions and memoized errors, and restores the
    /// default configuration.
    pub async fn reset_state(&self) {
        self.lock().await.reset();
    }

    /// Clears all entries, actions and memoized errors; keeps configuration.
    pub async fn clear_cache(&self) {
        self.lock().await.clear();
    }

    // == Introspection ==
    /// Copy of the raw shared state, for tests and diagnostics.
    pub async fn snapshot(&self) -> StateSnapshot {
        self.lock().await.snapshot()
    }

    pub async fn stats(&self) -> CacheStats {
        self.lock().await.stats()
    }

    // == Draining ==
    /// Waits for the in-flight drain loop, if any, to finish.
    ///
    /// Returns immediately when nothing is draining. The loop finishes once
    /// the action queue is empty or a batch fails.
    pub async fn drained(&self) {
        let handle = self
            .lock()
            .await
            .drain
            .as_ref()
            .map(|drain| drain.handle.clone());
        if let Some(handle) = handle {
            handle.await;
        }
    }

    /// Starts draining if actions are pending and waits for it to finish.
    pub async fn flush(&self) {
        let handle = {
            let mut state = self.lock().await;
            if state.ledger.is_empty() {
                None
            } else {
                Some(self.schedule_drain(&mut state))
            }
        };
        if let Some(handle) = handle {
            handle.await;
        }
    }

    /// Returns the in-flight drain handle, starting a loop if none runs.
    pub(crate) fn schedule_drain(&self, state: &mut CacheState) -> DrainHandle {
        if let Some(drain) = &state.drain {
            // A loop that died without clearing its slot is replaced
            if !drain.task.is_finished() {
                return drain.handle.clone();
            }
        }

        let drain = spawn_drain_task(self.clone());
        let handle = drain.handle.clone();
        state.drain = Some(drain);
        handle
    }

    pub(crate) async fn lock(&self) -> MutexGuard<'_, CacheState> {
        self.inner.state.lock().await
    }
}

impl Default for CacheContext {
    fn default() -> Self {
        Self::new()
    }
}

// == Unit Tests ==
#[cfg(test)]
mod tests {
    use super::*;
    use crate::backing::MemoryStore;
    use crate::error::CacheError;

    #[test]
    fn test_instance_ids_increase() {
        let context = CacheContext::new();
        assert_eq!(context.next_instance_id(), 0);
        assert_eq!(context.next_instance_id(), 1);
        assert_eq!(context.next_instance_id(), 2);
    }

    #[test]
    fn test_with_config_rejects_invalid() {
        let config = CacheConfig::default().with_max_memory_usage(0);
        assert!(matches!(
            CacheContext::with_config(config),
            Err(CacheError::Config(_))
        ));
    }

    #[tokio::test]
    async fn test_set_config_halves_budget() {
        let context = CacheContext::new();

        context
            .set_config(CacheConfig::default().with_max_memory_usage(100))
            .await
            .unwrap();

        assert_eq!(context.snapshot().await.max_memory_usage, Some(50));
        assert_eq!(context.config().await.max_memory_usage, Some(100));
    }

    #[tokio::test]
    async fn test_set_config_rejects_invalid_and_keeps_previous() {
        let context = CacheContext::new();
        context
            .set_config(CacheConfig::default().with_max_memory_usage(100))
            .await
            .unwrap();

        let result = context
            .set_config(CacheConfig::default().with_max_memory_usage(0))
            .await;

        assert!(matches!(result, Err(CacheError::Config(_))));
        assert_eq!(context.snapshot().await.max_memory_usage, Some(50));
    }

    #[tokio::test]
    async fn test_drained_without_drain_returns() {
        let context = CacheContext::new();
        context.drained().await;
        context.flush().await;
        assert!(!context.snapshot().await.draining);
    }

    #[tokio::test(start_paused = true)]
    async fn test_schedule_drain_is_single_flight() {
        let context = CacheContext::new();
        let cache = context.cache(Arc::new(MemoryStore::new()));
        cache.set_json("a", &1).await.unwrap();

        let (first, second) = {
            let mut state = context.lock().await;
            let first = context.schedule_drain(&mut state);
            let second = context.schedule_drain(&mut state);
            (first, second)
        };

        assert!(first.ptr_eq(&second));
        first.await;
        second.await;
    }

    #[tokio::test]
    async fn test_clear_cache_keeps_config() {
        let context = CacheContext::new();
        context
            .set_config(CacheConfig::default().with_max_memory_usage(1000))
            .await
            .unwrap();
        let cache = context.cache(Arc::new(MemoryStore::new()));
        cache.set_json("a", &"x").await.unwrap();

        context.clear_cache().await;

        let snapshot = context.snapshot().await;
        assert!(snapshot.entries.is_empty());
        assert!(snapshot.action_queue.is_empty());
        assert_eq!(snapshot.max_memory_usage, Some(500));

        context.reset_state().await;
        assert_eq!(context.snapshot().await.max_memory_usage, None);
    }
}
