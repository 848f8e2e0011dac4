//! Page - one cached chunk of a byte source.
//!
//! A [`Page`] owns exactly one rented buffer while it is resident, plus
//! metadata needed for cache management:
//! - Which source and page number it holds
//! - How many bytes the load actually produced
//! - Pin count for reference counting

use std::fmt;

use parking_lot::RwLock;

use crate::common::{BufferId, Error, PageNumber, Result, UsageCounter};
use crate::pool::RentedBuffer;

/// A cached page.
///
/// Pages are handed out pinned by
/// [`SourceCache::get_page`](crate::cache::SourceCache::get_page) and must
/// be given back through
/// [`SourceCache::release_page`](crate::cache::SourceCache::release_page).
/// Only the cache tears a page down; afterwards every accessor fails with
/// `Error::Disposed`.
///
/// # Thread Safety
/// - `buffer`: `RwLock` - shared readers, taken once on teardown
/// - `usage`: atomic pin count, readable without the cache gate
pub struct Page {
    number: PageNumber,
    source: BufferId,
    /// Owning cache instance, checked on release.
    cache: u64,
    /// Bytes actually read; short only for the final page.
    len: usize,
    usage: UsageCounter,
    buffer: RwLock<Option<RentedBuffer>>,
}

impl Page {
    /// Create a page pinned once around a loaded buffer.
    pub(crate) fn new(
        number: PageNumber,
        source: BufferId,
        cache: u64,
        buffer: RentedBuffer,
        len: usize,
    ) -> Self {
        Self {
            number,
            source,
            cache,
            len,
            usage: UsageCounter::pinned("Page"),
            buffer: RwLock::new(Some(buffer)),
        }
    }

    /// Page number within its source.
    #[inline]
    pub fn number(&self) -> PageNumber {
        self.number
    }

    /// Source this page was read from.
    #[inline]
    pub fn source(&self) -> &BufferId {
        &self.source
    }

    /// Number of valid bytes.
    #[inline]
    pub fn len(&self) -> usize {
        self.len
    }

    /// Check if the load produced no bytes.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Current pin count.
    pub fn pin_count(&self) -> Result<u32> {
        self.usage.count()
    }

    /// Check if anybody holds this page.
    pub fn is_pinned(&self) -> Result<bool> {
        self.usage.is_pinned()
    }

    /// Check if the cache has torn this page down.
    #[inline]
    pub fn is_disposed(&self) -> bool {
        self.usage.is_disposed()
    }

    /// Run `f` over the valid bytes of the page.
    pub fn read<R>(&self, f: impl FnOnce(&[u8]) -> R) -> Result<R> {
        let slot = self.buffer.read();
        match slot.as_ref() {
            Some(buffer) if !self.is_disposed() => Ok(buffer.read(|data| f(&data[..self.len]))),
            _ => Err(Error::Disposed("Page")),
        }
    }

    /// Byte at `index`, or `None` past the valid length.
    pub fn get(&self, index: usize) -> Result<Option<u8>> {
        self.read(|data| data.get(index).copied())
    }

    /// Copy the valid bytes out.
    pub fn to_vec(&self) -> Result<Vec<u8>> {
        self.read(<[u8]>::to_vec)
    }

    #[inline]
    pub(crate) fn cache_id(&self) -> u64 {
        self.cache
    }

    #[inline]
    pub(crate) fn pin(&self) -> Result<u32> {
        self.usage.pin()
    }

    #[inline]
    pub(crate) fn unpin(&self) -> Result<u32> {
        self.usage.unpin()
    }

    /// Pin count without the disposed check. Caller holds the cache gate.
    #[inline]
    pub(crate) fn is_evictable(&self) -> bool {
        self.usage.current() == 0
    }

    /// Tear the page down and return its buffer. Only the first call acts.
    pub(crate) fn dispose(&self) -> bool {
        if !self.usage.begin_dispose() {
            return false;
        }
        // Dropping the rented buffer releases it to the pool
        let buffer = self.buffer.write().take();
        drop(buffer);
        true
    }
}

impl fmt::Debug for Page {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Page")
            .field("number", &self.number)
            .field("source", &self.source)
            .field("len", &self.len)
            .field("pins", &self.usage.current())
            .field("disposed", &self.is_disposed())
            .finish()
    }
}
