//! Drain Task
//!
//! Background loop that reconciles pending actions with the backing stores.
//! At most one loop runs per context; it exits once the action queue is
//! empty or a batch fails, clearing its handle either way.

use futures::FutureExt;
use tokio::time::sleep;
use tracing::{debug, error, info, warn};

use crate::cache::{CacheContext, DrainLoop};
use crate::error::{CacheError, Result};

/// Spawns a drain loop.
///
/// Callers must hold the context lock and store the loop in the state, so
/// that concurrent triggers join this loop instead of starting another.
pub(crate) fn spawn_drain_task(context: CacheContext) -> DrainLoop {
    let task = tokio::spawn(run_drain_loop(context));
    let abort = task.abort_handle();

    let handle = task
        .map(|result| {
            if let Err(err) = result {
                error!("Drain task ended abnormally: {}", err);
            }
        })
        .boxed()
        .shared();

    DrainLoop {
        handle,
        task: abort,
    }
}

/// Waits one interval, flushes one batch, and repeats while actions remain.
async fn run_drain_loop(context: CacheContext) {
    info!("Drain loop started");

    loop {
        let interval = context.lock().await.config.drain_interval;
        sleep(interval).await;

        let outcome = flush_batch(&context).await;

        let mut state = context.lock().await;
        let remaining = state.ledger.len();
        match outcome {
            Ok(flushed) => {
                debug!(flushed, remaining, "Drain batch flushed");
            }
            Err(err) => {
                state.stats.record_flush_failure();
                state.drain = None;
                warn!(
                    error = %err,
                    remaining, "Drain batch aborted, pending actions kept for retry"
                );
                return;
            }
        }

        if remaining == 0 {
            state.drain = None;
            info!("Drain loop finished");
            return;
        }
    }
}

/// Executes up to `max_batch_size` actions from the front of the queue.
///
/// Stops at the first failing action; it and every later action stay
/// pending in their queue positions. Runs the eviction controller afterwards
/// since flushed writes are now clean.
///
/// Returns the number of actions persisted.
pub async fn flush_batch(context: &CacheContext) -> Result<usize> {
    let batch = {
        let mut state = context.lock().await;
        let max = state.config.max_batch_size;
        state.next_batch(max)
    };

    let mut flushed = 0;
    let mut failure = None;

    for job in batch {
        let result = match &job.text {
            Some(text) => job.store.write_text(&job.path, text).await,
            None => job.store.delete_entry(&job.path).await,
        };

        if let Err(err) = result {
            failure = Some(err);
            break;
        }

        context.lock().await.complete(&job.key, job.generation);
        flushed += 1;
    }

    let evicted = context.lock().await.evict();
    if evicted > 0 {
        debug!(evicted, "Evicted entries after drain batch");
    }

    match failure {
        Some(err) => Err(CacheError::Store(err)),
        None => Ok(flushed),
    }
}
