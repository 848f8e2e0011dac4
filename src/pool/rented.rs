//! RAII handle for a rented byte buffer.
//!
//! A [`RentedBuffer`] holds one pin on its buffer and releases it when
//! dropped, which returns the buffer to its pool once no pins remain.

use std::ops::Deref;
use std::sync::Arc;

use crate::common::{Error, Result};
use crate::pool::byte_buffer::{ByteBuffer, ByteBufferPool};
use crate::pool::object_pool::PoolItem;

/// Guard for one rented buffer.
///
/// # Example
/// ```
/// use std::sync::Arc;
/// use pagecache::pool::ByteBufferPool;
///
/// let pool = Arc::new(ByteBufferPool::new(4));
/// let mut buffer = pool.rent().unwrap();
/// buffer.bytes_mut().unwrap().copy_from_slice(b"abcd");
/// assert_eq!(buffer.read(|data| data.to_vec()), b"abcd");
/// // buffer drops here, cleared and returned to the pool
/// ```
pub struct RentedBuffer {
    /// Pool to release into on drop.
    pool: Arc<ByteBufferPool>,
    /// `Some` until `drop` takes it.
    buffer: Option<Arc<ByteBuffer>>,
}

impl RentedBuffer {
    /// Wrap a buffer that was just rented from `pool`.
    pub(crate) fn new(pool: Arc<ByteBufferPool>, buffer: Arc<ByteBuffer>) -> Self {
        Self {
            pool,
            buffer: Some(buffer),
        }
    }

    /// Exclusive access to the bytes, for loading.
    ///
    /// # Errors
    /// `Error::BufferInUse` if any other handle still references the buffer.
    pub fn bytes_mut(&mut self) -> Result<&mut [u8]> {
        self.buffer
            .as_mut()
            .and_then(Arc::get_mut)
            .map(ByteBuffer::bytes_mut)
            .ok_or(Error::BufferInUse)
    }

    /// Check if the buffer is pinned.
    pub fn is_pinned(&self) -> Result<bool> {
        (**self).slot().usage().is_pinned()
    }
}

impl Deref for RentedBuffer {
    type Target = ByteBuffer;

    #[inline]
    fn deref(&self) -> &ByteBuffer {
        match self.buffer.as_deref() {
            Some(buffer) => buffer,
            None => unreachable!("rented buffer used after drop"),
        }
    }
}

impl Drop for RentedBuffer {
    fn drop(&mut self) {
        // Move the only handle out so the pool receives it unshared
        if let Some(buffer) = self.buffer.take() {
            if let Err(e) = self.pool.release(buffer) {
                tracing::warn!(error = %e, "failed to return buffer to pool");
            }
        }
    }
}
