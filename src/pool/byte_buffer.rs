//! Fixed-capacity byte buffers and their pool.
//!
//! A [`ByteBuffer`] is only ever zero-filled when it goes back to the pool;
//! while rented, its contents are whatever the last load left there.

use std::fmt;
use std::sync::Arc;

use parking_lot::RwLock;

use crate::common::{Error, Result};
use crate::pool::object_pool::{ObjectPool, PoolId, PoolItem, PoolSlot};
use crate::pool::rented::RentedBuffer;

/// A pooled byte array of one fixed capacity.
pub struct ByteBuffer {
    slot: PoolSlot,
    capacity: usize,
    data: RwLock<Box<[u8]>>,
}

impl ByteBuffer {
    fn new(slot: PoolSlot, capacity: usize) -> Self {
        Self {
            slot,
            capacity,
            data: RwLock::new(vec![0u8; capacity].into_boxed_slice()),
        }
    }

    /// Capacity in bytes.
    #[inline]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Run `f` over the buffer contents.
    pub fn read<R>(&self, f: impl FnOnce(&[u8]) -> R) -> R {
        f(&self.data.read())
    }

    /// Exclusive access without locking.
    #[inline]
    pub(crate) fn bytes_mut(&mut self) -> &mut [u8] {
        self.data.get_mut()
    }
}

impl PoolItem for ByteBuffer {
    fn slot(&self) -> &PoolSlot {
        &self.slot
    }

    fn clear(&self) -> Result<()> {
        let mut data = self.data.write();
        if data.len() != self.capacity {
            return Err(Error::BufferSizeMismatch {
                expected: self.capacity,
                actual: data.len(),
            });
        }
        data.fill(0);
        Ok(())
    }
}

impl fmt::Debug for ByteBuffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ByteBuffer")
            .field("capacity", &self.capacity)
            .field("slot", &self.slot)
            .finish()
    }
}

/// Pool handing out [`ByteBuffer`]s of one capacity.
///
/// A single pool is shared by every [`SourceCache`](crate::cache::SourceCache)
/// of a registry, so page buffers are recycled across sources.
///
/// # Example
/// ```
/// use std::sync::Arc;
/// use pagecache::pool::ByteBufferPool;
///
/// let pool = Arc::new(ByteBufferPool::new(512));
/// let buffer = pool.rent().unwrap();
/// assert_eq!(buffer.capacity(), 512);
/// assert_eq!(pool.count(), 0);
///
/// drop(buffer); // returned and zero-filled
/// assert_eq!(pool.count(), 1);
/// ```
pub struct ByteBufferPool {
    inner: ObjectPool<ByteBuffer>,
    capacity: usize,
}

impl ByteBufferPool {
    /// Create a pool of buffers holding exactly `capacity` bytes.
    pub fn new(capacity: usize) -> Self {
        Self {
            inner: ObjectPool::new(move |slot| ByteBuffer::new(slot, capacity)),
            capacity,
        }
    }

    /// Buffer capacity in bytes.
    #[inline]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Identity of the underlying pool.
    #[inline]
    pub fn id(&self) -> PoolId {
        self.inner.id()
    }

    /// Rent a buffer, pinned once, that goes back to the pool on drop.
    pub fn rent(self: &Arc<Self>) -> Result<RentedBuffer> {
        let buffer = self.inner.rent()?;
        Ok(RentedBuffer::new(Arc::clone(self), buffer))
    }

    /// Unpin a buffer; at zero pins it is cleared and returned.
    pub(crate) fn release(&self, buffer: Arc<ByteBuffer>) -> Result<u32> {
        self.inner.release(buffer)
    }

    /// Number of idle buffers.
    #[inline]
    pub fn count(&self) -> usize {
        self.inner.count()
    }

    /// Number of buffers ever allocated by this pool.
    #[inline]
    pub fn created(&self) -> usize {
        self.inner.created()
    }
}

impl fmt::Debug for ByteBufferPool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ByteBufferPool")
            .field("capacity", &self.capacity)
            .field("pool", &self.inner)
            .finish()
    }
}
