//! Storage layer - random-access byte sources.
//!
//! This module defines what the page cache reads from:
//! - [`ByteSource`] - the `{length, load_at}` capability
//! - [`FileSource`] - a file on disk, opened per load
//! - [`StreamSource`] - any seekable async stream
//! - [`MemorySource`] - bytes already in memory
//!
//! # Layout
//! ```text
//! ┌─────────┬─────────┬─────────┬─────────┬──────┐
//! │ Page 0  │ Page 1  │ Page 2  │  ...    │ Last │
//! └─────────┴─────────┴─────────┴─────────┴──────┘
//! Offset:  0     P       2P       ...     N×P
//! ```
//! Page N starts at byte `N × page_size`. Only the last page may be short.

mod file_source;
mod memory_source;
mod stream_source;

pub use file_source::FileSource;
pub use memory_source::MemorySource;
pub use stream_source::StreamSource;

use async_trait::async_trait;
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio_util::sync::CancellationToken;

use crate::common::{Error, Result};

/// A random-access byte source the cache reads pages from.
///
/// # Thread Safety
/// Implementations must be `Send + Sync`. The owning
/// [`SourceCache`](crate::cache::SourceCache) serializes loads through its
/// gate, but `length()` may be called concurrently with a load.
#[async_trait]
pub trait ByteSource: Send + Sync {
    /// Total length of the source in bytes.
    async fn length(&self) -> Result<u64>;

    /// Read up to `buf.len()` bytes starting at `offset` into `buf`.
    ///
    /// Implementations fill `buf` completely unless the end of the source
    /// is reached, and return the number of bytes read (0 at or past the
    /// end).
    ///
    /// # Errors
    /// - `Error::Cancelled` if `cancel` fires first
    /// - `Error::Io` for any read failure
    async fn load_at(&self, offset: u64, buf: &mut [u8], cancel: &CancellationToken)
        -> Result<usize>;
}

/// Read until `buf` is full or the reader hits end of file.
pub(crate) async fn read_full<R>(
    reader: &mut R,
    buf: &mut [u8],
    cancel: &CancellationToken,
) -> Result<usize>
where
    R: AsyncRead + Unpin + ?Sized,
{
    let mut filled = 0;
    while filled < buf.len() {
        let n = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(Error::Cancelled),
            n = reader.read(&mut buf[filled..]) => n?,
        };
        if n == 0 {
            break;
        }
        filled += n;
    }
    Ok(filled)
}
