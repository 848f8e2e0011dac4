//! Generic object pool over a lock-free free list.
//!
//! Items are shared as `Arc<T>`. Each item carries a [`PoolSlot`] that
//! records which pool built it, whether it is currently idle, and its pin
//! count. The idle flag is claimed with a single compare-and-set before an
//! item is pushed back, so one item can never sit on the free list twice and
//! two renters can never receive the same item.

use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;

use crossbeam_queue::SegQueue;

use crate::common::{Error, Result, UsageCounter};

/// Identifies one pool instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PoolId(u64);

impl PoolId {
    fn next() -> Self {
        static NEXT: AtomicU64 = AtomicU64::new(0);
        PoolId(NEXT.fetch_add(1, Ordering::Relaxed))
    }
}

impl fmt::Display for PoolId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Pool({})", self.0)
    }
}

/// Per-item bookkeeping owned by the pool.
#[derive(Debug)]
pub struct PoolSlot {
    owner: PoolId,
    idle: AtomicBool,
    usage: UsageCounter,
}

impl PoolSlot {
    fn new(owner: PoolId) -> Self {
        Self {
            owner,
            idle: AtomicBool::new(false),
            usage: UsageCounter::new("PoolItem"),
        }
    }

    /// Pool that built this item.
    #[inline]
    pub fn owner(&self) -> PoolId {
        self.owner
    }

    /// Check if the item is on its pool's free list.
    #[inline]
    pub fn is_idle(&self) -> bool {
        self.idle.load(Ordering::Acquire)
    }

    /// Pin count of the item.
    #[inline]
    pub fn usage(&self) -> &UsageCounter {
        &self.usage
    }
}

/// An object that can be rented from and returned to exactly one pool.
pub trait PoolItem: Send + Sync + 'static {
    /// Bookkeeping handed to the factory that built this item.
    fn slot(&self) -> &PoolSlot;

    /// Reset the item before it goes back on the free list.
    fn clear(&self) -> Result<()>;
}

type Factory<T> = Box<dyn Fn(PoolSlot) -> T + Send + Sync>;

/// Thread-safe pool of reusable items.
///
/// # Thread Safety
/// - `idle`: `SegQueue` - lock-free, independent of any cache lock
/// - per-item `idle` flag: `AtomicBool` claimed by compare-and-set
/// - `created`: atomic counter
pub struct ObjectPool<T: PoolItem> {
    id: PoolId,
    idle: SegQueue<Arc<T>>,
    factory: Factory<T>,
    created: AtomicUsize,
}

impl<T: PoolItem> ObjectPool<T> {
    /// Create an empty pool. `factory` builds a new item around the slot
    /// the pool provides.
    pub fn new(factory: impl Fn(PoolSlot) -> T + Send + Sync + 'static) -> Self {
        Self {
            id: PoolId::next(),
            idle: SegQueue::new(),
            factory: Box::new(factory),
            created: AtomicUsize::new(0),
        }
    }

    /// Identity of this pool.
    #[inline]
    pub fn id(&self) -> PoolId {
        self.id
    }

    /// Rent an item, reusing an idle one when available.
    ///
    /// The returned item is checked out and pinned once.
    pub fn rent(&self) -> Result<Arc<T>> {
        let item = match self.idle.pop() {
            Some(item) => {
                item.slot().idle.store(false, Ordering::Release);
                tracing::trace!(pool = %self.id, "reused idle item");
                item
            }
            None => {
                self.created.fetch_add(1, Ordering::Relaxed);
                tracing::trace!(pool = %self.id, "created new item");
                Arc::new((self.factory)(PoolSlot::new(self.id)))
            }
        };

        item.slot().usage.pin()?;
        Ok(item)
    }

    /// Return an item to the free list.
    ///
    /// Giving back an item that is already idle is a no-op.
    ///
    /// # Errors
    /// - `Error::ForeignPoolItem` if another pool built the item
    /// - any error from [`PoolItem::clear`]; the item stays checked out
    pub fn give_back(&self, item: Arc<T>) -> Result<()> {
        let slot = item.slot();
        if slot.owner != self.id {
            return Err(Error::ForeignPoolItem);
        }

        if slot
            .idle
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            tracing::trace!(pool = %self.id, "ignored give back of idle item");
            return Ok(());
        }

        if let Err(e) = item.clear() {
            slot.idle.store(false, Ordering::Release);
            return Err(e);
        }

        slot.usage.reset();
        self.idle.push(item);
        Ok(())
    }

    /// Unpin an item; at zero pins it returns itself to the pool.
    ///
    /// Returns the remaining pin count.
    pub fn release(&self, item: Arc<T>) -> Result<u32> {
        if item.slot().owner != self.id {
            return Err(Error::ForeignPoolItem);
        }

        let remaining = item.slot().usage.unpin()?;
        if remaining == 0 {
            self.give_back(item)?;
        }
        Ok(remaining)
    }

    /// Number of idle items. Never includes checked-out items.
    #[inline]
    pub fn count(&self) -> usize {
        self.idle.len()
    }

    /// Number of items the factory has built.
    #[inline]
    pub fn created(&self) -> usize {
        self.created.load(Ordering::Relaxed)
    }
}

impl<T: PoolItem> fmt::Debug for ObjectPool<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ObjectPool")
            .field("id", &self.id)
            .field("idle", &self.count())
            .field("created", &self.created())
            .finish()
    }
}
