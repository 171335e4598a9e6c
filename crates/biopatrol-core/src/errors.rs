//! Typed errors for the parts of the runtime that have a closed set of
//! failure modes. Orchestration glue that chains several fallible calls
//! uses `anyhow::Result` with `.context(...)` instead. Dispatcher routing
//! and the task/step state machine don't raise: an unroutable task is
//! recorded as data on the task itself, and illegal transitions are a
//! `debug_assert` bug-check, not a recoverable error (mirroring
//! `Step::set_status`).

use thiserror::Error;

/// Errors raised by [`crate::runtime::Runtime`] lookups.
#[derive(Debug, Error)]
pub enum RuntimeError {
    #[error("task {0:?} not found")]
    TaskNotFound(String),
}
