//! Result codes shared by the containers, the graph and the worker thread.
//!
//! Every fallible operation in this crate returns [`Result<T>`]. Retrying a
//! compare-exchange is never reported as an error: it is an expected part of
//! the lock-free algorithms and always completes.

use thiserror::Error;

/// Errors surfaced by rivulet core operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum EngineError {
    /// Allocation failed or a fixed-capacity pool is exhausted.
    #[error("memory error")]
    Memory,

    /// A required reference (source unit, callback target) was missing.
    #[error("a null reference was passed where this is invalid")]
    NullPointer,

    /// An index for a unit, container or output was out of range.
    #[error("index {index} out of range for length {len}")]
    IndexOutOfRange {
        /// The offending index.
        index: usize,
        /// Length of the indexed collection.
        len: usize,
    },

    /// An item count was invalid for the context (e.g. zero channels).
    #[error("item count {0} is invalid in this context")]
    ItemCountInvalid(usize),

    /// A container was de-initialised while still holding elements.
    #[error("container is being de-initialised but holds {0} item(s)")]
    ContainerNotEmptyOnDeInit(usize),

    /// A required callback function was not provided.
    #[error("one or more callback functions were missing")]
    FunctionsInvalid,

    /// An attempt to start a worker failed because it is already running.
    #[error("thread is already running")]
    ThreadAlreadyRunning,

    /// The operating system refused to start a worker thread.
    #[error("failed to start thread")]
    ThreadStartFailed,

    /// An operation targeted a worker that was never started or already joined.
    #[error("operation on an invalid thread")]
    ThreadInvalid,

    /// Joining a worker failed (the worker panicked).
    #[error("waiting for thread failed")]
    ThreadWaitFailed,

    /// A worker was signalled to exit more than once.
    #[error("thread was already signalled to exit")]
    ThreadShouldExitAlreadySet,
}

/// Convenience result type for rivulet core operations.
pub type Result<T> = core::result::Result<T, EngineError>;
