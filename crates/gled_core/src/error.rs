//! # Memory Error Types
//!
//! All errors that can occur while carving memory out of an allocator.

use thiserror::Error;

/// Errors that can occur in the allocator family.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MemoryError {
    /// The allocator cannot satisfy the request.
    #[error("{allocator} allocator out of memory: requested {requested} bytes, {available} available")]
    OutOfMemory {
        /// Label of the allocator that refused.
        allocator: &'static str,
        /// Bytes the request needed (including alignment slack).
        requested: usize,
        /// Bytes still available at the time of the request.
        available: usize,
    },

    /// The backing pool of a bump allocator could not be obtained.
    #[error("unable to reserve a backing pool of {capacity} bytes")]
    PoolUnavailable {
        /// Requested pool size.
        capacity: usize,
    },

    /// The size of a request does not fit in `usize`.
    #[error("allocation size overflow")]
    SizeOverflow,

    /// `reset()` was called while objects created from the allocator are alive.
    #[error("cannot reset {allocator} allocator: {live} live objects")]
    LiveObjects {
        /// Label of the allocator that refused to reset.
        allocator: &'static str,
        /// Number of objects still alive.
        live: usize,
    },

    /// `reset()` was called on a heap allocator with raw blocks still out.
    #[error("cannot reset {allocator} allocator: {blocks} blocks ({bytes} bytes) outstanding")]
    OutstandingBlocks {
        /// Label of the allocator that refused to reset.
        allocator: &'static str,
        /// Blocks not yet released.
        blocks: usize,
        /// Bytes held by those blocks.
        bytes: usize,
    },
}

/// Result type for allocator operations.
pub type MemoryResult<T> = Result<T, MemoryError>;
