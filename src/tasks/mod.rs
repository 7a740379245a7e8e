//! Background Tasks Module
//!
//! Contains the tasks that run alongside cache operations.
//!
//! # Tasks
//! - Drain: flushes pending write/delete actions to the backing stores in
//!   bounded batches at a fixed interval

mod drain;

pub use drain::flush_batch;
pub(crate) use drain::spawn_drain_task;
