//! Error types for pagecache.

use thiserror::Error;

use crate::common::BufferId;

/// Convenient Result type alias.
///
/// Instead of writing `Result<T, Error>` everywhere, we can write `Result<T>`.
pub type Result<T> = std::result::Result<T, Error>;

/// All possible errors in pagecache.
///
/// Argument faults are reported before any state is touched. State faults
/// (`Disposed`, pin count faults, foreign items) indicate a bug in the caller
/// and are never retried.
#[derive(Debug, Error)]
pub enum Error {
    /// I/O error from a byte source.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A page number below zero was requested.
    #[error("Page number {0} is out of range")]
    PageOutOfRange(i64),

    /// `page × page_size` does not fit in a byte offset.
    #[error("Byte offset of page {page} overflows with page size {page_size}")]
    OffsetOverflow { page: u64, page_size: usize },

    /// Configured page size is zero or negative.
    #[error("Invalid page size: {0}")]
    InvalidPageSize(i64),

    /// Configured cache capacity is negative.
    #[error("Invalid cache capacity: {0}")]
    InvalidCapacity(i64),

    /// Buffer pool hands out buffers of a different size than the page size.
    #[error("Buffer pool capacity {pool} does not match page size {page_size}")]
    PageSizeMismatch { pool: usize, page_size: usize },

    /// The object was already torn down.
    #[error("{0} has already been disposed")]
    Disposed(&'static str),

    /// Pinning would exceed the representable pin count.
    #[error("Pin count overflow")]
    PinOverflow,

    /// Unpinning an object that is not pinned.
    #[error("Pin count underflow")]
    PinUnderflow,

    /// An item was handed to a pool that did not create it.
    #[error("Item does not belong to this pool")]
    ForeignPoolItem,

    /// A page was released to a cache that does not own it.
    #[error("Page does not belong to this cache")]
    ForeignPage,

    /// A pooled buffer no longer has its pool's capacity.
    #[error("Buffer length {actual} does not match pool capacity {expected}")]
    BufferSizeMismatch { expected: usize, actual: usize },

    /// A rented buffer is still referenced somewhere else.
    #[error("Buffer is still referenced elsewhere")]
    BufferInUse,

    /// A source with the same id is already registered.
    #[error("Source {0} is already registered")]
    AlreadyRegistered(BufferId),

    /// The operation was cancelled before it completed.
    #[error("Operation was cancelled")]
    Cancelled,
}
