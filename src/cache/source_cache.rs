//! Source Cache - the per-source page caching layer.
//!
//! The [`SourceCache`] provides:
//! - Page caching between a byte source and memory
//! - Pin-based reference counting
//! - FIFO capacity eviction of unpinned pages
//! - Cancellable, gate-serialized loads

use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;

use tokio::sync::{Mutex, MutexGuard};
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace};

use crate::cache::{AdmissionQueue, CacheStats, Page};
use crate::common::{BufferId, DisposeFlag, Error, PageNumber, Result};
use crate::pool::ByteBufferPool;
use crate::storage::ByteSource;

static NEXT_CACHE_ID: AtomicU64 = AtomicU64::new(1);

/// Everything the gate protects.
#[derive(Default)]
struct CacheState {
    /// Resident pages by number.
    pages: HashMap<PageNumber, Arc<Page>>,

    /// Eviction candidates in admission order.
    admission: AdmissionQueue,
}

/// Caches fixed-size pages of one byte source.
///
/// # Architecture
/// ```text
/// ┌──────────────────────────────────────────────────────────┐
/// │                       SourceCache                        │
/// │  ┌────────────────────── gate ───────────────────────┐   │
/// │  │  pages: PageNumber → Arc<Page>   admission: FIFO  │   │
/// │  └───────────────────────────────────────────────────┘   │
/// │  ┌──────────────┐  ┌──────────────┐  ┌──────────────┐    │
/// │  │    source    │  │     pool     │  │    stats     │    │
/// │  │ dyn ByteSrc  │  │ shared, lock │  │   atomics    │    │
/// │  │              │  │     free     │  │              │    │
/// │  └──────────────┘  └──────────────┘  └──────────────┘    │
/// └──────────────────────────────────────────────────────────┘
/// ```
///
/// # Thread Safety
/// - `state`: async `Mutex` - every table and queue mutation, and every load
/// - `pool`: lock-free free list shared with other caches
/// - `resident`: atomic mirror of the table size, readable without the gate
/// - `stats`: no lock, all atomic counters
///
/// # Capacity
/// Capacity bounds the unpinned working set. A pinned page is never evicted,
/// so while pages are held the table may exceed capacity; it shrinks back as
/// they are released.
pub struct SourceCache {
    id: u64,
    source_id: BufferId,
    source: Box<dyn ByteSource>,
    pool: Arc<ByteBufferPool>,
    page_size: usize,
    capacity: usize,
    state: Mutex<CacheState>,
    resident: AtomicUsize,
    stats: CacheStats,
    lifecycle: DisposeFlag,
}

impl SourceCache {
    /// Create a cache over `source`, renting page buffers from `pool`.
    ///
    /// # Errors
    /// - `Error::InvalidPageSize` if `page_size` is 0
    /// - `Error::PageSizeMismatch` if the pool's buffers are not `page_size` long
    pub fn new(
        source_id: BufferId,
        source: Box<dyn ByteSource>,
        pool: Arc<ByteBufferPool>,
        page_size: usize,
        capacity: usize,
    ) -> Result<Self> {
        if page_size == 0 {
            return Err(Error::InvalidPageSize(0));
        }
        if pool.capacity() != page_size {
            return Err(Error::PageSizeMismatch {
                pool: pool.capacity(),
                page_size,
            });
        }

        Ok(Self {
            id: NEXT_CACHE_ID.fetch_add(1, Ordering::Relaxed),
            source_id,
            source,
            pool,
            page_size,
            capacity,
            state: Mutex::new(CacheState::default()),
            resident: AtomicUsize::new(0),
            stats: CacheStats::new(),
            lifecycle: DisposeFlag::new("SourceCache"),
        })
    }

    // ========================================================================
    // Public API: Pages
    // ========================================================================

    /// Get page `number`, pinned once for the caller.
    ///
    /// If the page is resident, pins it and returns immediately. Otherwise
    /// makes room for it and loads it from the source. Every returned page
    /// must be handed back through [`release_page`](Self::release_page).
    ///
    /// A page past the end of the source loads as an empty page.
    ///
    /// # Errors
    /// - `Error::OffsetOverflow` if the page's byte offset does not fit in `u64`
    /// - `Error::Cancelled` if `cancel` fires while waiting or loading
    /// - `Error::Disposed` if the cache was torn down
    /// - any error from the source; nothing is inserted in that case
    pub async fn get_page(
        &self,
        number: PageNumber,
        cancel: &CancellationToken,
    ) -> Result<Arc<Page>> {
        let offset = number.byte_offset(self.page_size)?;
        self.lifecycle.ensure_live()?;

        let mut state = self.lock_state(cancel).await?;
        self.lifecycle.ensure_live()?;

        if let Some(page) = state.pages.get(&number) {
            page.pin()?;
            self.stats.record_hit();
            trace!(source = %self.source_id, page = number.0, "cache hit");
            return Ok(Arc::clone(page));
        }

        self.stats.record_miss();
        self.reclaim(&mut state);

        let page = self.load_page(number, offset, cancel).await?;
        state.pages.insert(number, Arc::clone(&page));
        state.admission.admit(number);
        self.resident.store(state.pages.len(), Ordering::Release);

        Ok(page)
    }

    /// Hand a page back.
    ///
    /// Unpins the page. When nobody holds it any more the cache reclaims
    /// down to capacity, which may tear this page down. Returns the
    /// remaining pin count.
    ///
    /// `cancel` is only honored before the unpin. Once the pin is dropped the
    /// reclaim always runs, so a `Cancelled` result means nothing changed.
    ///
    /// # Errors
    /// - `Error::ForeignPage` if the page came from another cache
    /// - `Error::Cancelled` if `cancel` had fired; the page stays pinned
    /// - `Error::PinUnderflow` if the page was already fully released
    /// - `Error::Disposed` if the page was torn down
    pub async fn release_page(&self, page: &Arc<Page>, cancel: &CancellationToken) -> Result<u32> {
        if page.cache_id() != self.id {
            return Err(Error::ForeignPage);
        }
        if cancel.is_cancelled() {
            return Err(Error::Cancelled);
        }

        let remaining = page.unpin()?;
        if remaining == 0 {
            // Reclaim does not suspend; wait for the gate uncancelled
            let mut state = self.state.lock().await;
            if !self.lifecycle.is_disposed() {
                self.reclaim(&mut state);
            }
        }
        Ok(remaining)
    }

    // ========================================================================
    // Public API: Source and info
    // ========================================================================

    /// Total length of the source in bytes.
    pub async fn length(&self) -> Result<u64> {
        self.lifecycle.ensure_live()?;
        self.source.length().await
    }

    /// Number of pages the source spans, the last one possibly short.
    pub async fn page_count(&self) -> Result<u64> {
        let length = self.length().await?;
        Ok(length.div_ceil(self.page_size as u64))
    }

    /// Number of pages currently in the table.
    pub fn resident_count(&self) -> usize {
        self.resident.load(Ordering::Acquire)
    }

    /// Configured capacity.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Page size in bytes.
    pub fn page_size(&self) -> usize {
        self.page_size
    }

    /// Id the cache was registered under.
    pub fn source_id(&self) -> &BufferId {
        &self.source_id
    }

    /// Get cache statistics.
    pub fn stats(&self) -> &CacheStats {
        &self.stats
    }

    /// Pool the cache rents buffers from.
    pub fn pool(&self) -> &Arc<ByteBufferPool> {
        &self.pool
    }

    /// Check if the cache was torn down.
    pub fn is_disposed(&self) -> bool {
        self.lifecycle.is_disposed()
    }

    /// Tear down every resident page, pinned or not, and return their
    /// buffers. Returns `false` if the cache was already torn down.
    pub async fn dispose(&self) -> bool {
        if !self.lifecycle.begin() {
            return false;
        }

        let mut state = self.state.lock().await;
        let evicted = state.pages.len();
        for (_, page) in state.pages.drain() {
            page.dispose();
        }
        state.admission.clear();
        self.resident.store(0, Ordering::Release);

        debug!(source = %self.source_id, pages = evicted, "source cache disposed");
        true
    }

    // ========================================================================
    // Internal
    // ========================================================================

    /// Acquire the gate unless `cancel` fires first.
    async fn lock_state(&self, cancel: &CancellationToken) -> Result<MutexGuard<'_, CacheState>> {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(Error::Cancelled),
            state = self.state.lock() => Ok(state),
        }
    }

    /// Rent a buffer and fill it from the source. The buffer goes back to
    /// the pool if the load fails.
    async fn load_page(
        &self,
        number: PageNumber,
        offset: u64,
        cancel: &CancellationToken,
    ) -> Result<Arc<Page>> {
        let mut buffer = self.pool.rent()?;
        let len = self.source.load_at(offset, buffer.bytes_mut()?, cancel).await?;

        self.stats.record_load(len);
        debug!(source = %self.source_id, page = number.0, bytes = len, "page loaded");

        Ok(Arc::new(Page::new(
            number,
            self.source_id.clone(),
            self.id,
            buffer,
            len,
        )))
    }

    /// Evict unpinned pages, oldest admission first, until the table is
    /// within capacity.
    ///
    /// Pinned candidates go to the back of the queue. Each queued page is
    /// looked at once per call.
    fn reclaim(&self, state: &mut CacheState) {
        let mut budget = state.admission.len();
        while state.pages.len() > self.capacity && budget > 0 && !state.admission.is_empty() {
            budget -= 1;
            let Some(number) = state.admission.pop_oldest() else {
                break;
            };

            let evictable = match state.pages.get(&number) {
                Some(page) => page.is_evictable(),
                None => continue,
            };
            if !evictable {
                state.admission.requeue(number);
                continue;
            }

            if let Some(page) = state.pages.remove(&number) {
                page.dispose();
                self.stats.record_eviction();
                debug!(source = %self.source_id, page = number.0, "page evicted");
            }
        }
        self.resident.store(state.pages.len(), Ordering::Release);
    }
}

impl fmt::Debug for SourceCache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SourceCache")
            .field("source_id", &self.source_id)
            .field("page_size", &self.page_size)
            .field("capacity", &self.capacity)
            .field("resident", &self.resident_count())
            .field("disposed", &self.is_disposed())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemorySource;
    use async_trait::async_trait;
    use std::sync::atomic::AtomicUsize;

    /// Counts loads and can be told to fail.
    struct CountingSource {
        inner: MemorySource,
        loads: Arc<AtomicUsize>,
        fail: bool,
    }

    #[async_trait]
    impl ByteSource for CountingSource {
        async fn length(&self) -> Result<u64> {
            self.inner.length().await
        }

        async fn load_at(
            &self,
            offset: u64,
            buf: &mut [u8],
            cancel: &CancellationToken,
        ) -> Result<usize> {
            self.loads.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                return Err(Error::Io(std::io::Error::other("boom")));
            }
            self.inner.load_at(offset, buf, cancel).await
        }
    }

    fn create_cache(len: usize, page_size: usize, capacity: usize) -> (SourceCache, Arc<AtomicUsize>) {
        create_cache_with(len, page_size, capacity, false)
    }

    fn create_cache_with(
        len: usize,
        page_size: usize,
        capacity: usize,
        fail: bool,
    ) -> (SourceCache, Arc<AtomicUsize>) {
        let data: Vec<u8> = (0..len).map(|i| (i % 251) as u8).collect();
        let loads = Arc::new(AtomicUsize::new(0));
        let source = CountingSource {
            inner: MemorySource::new(data),
            loads: Arc::clone(&loads),
            fail,
        };
        let pool = Arc::new(ByteBufferPool::new(page_size));
        let cache = SourceCache::new(
            BufferId::random("test"),
            Box::new(source),
            pool,
            page_size,
            capacity,
        )
        .unwrap();
        (cache, loads)
    }

    #[test]
    fn test_new_rejects_pool_mismatch() {
        let pool = Arc::new(ByteBufferPool::new(64));
        let result = SourceCache::new(
            BufferId::random("test"),
            Box::new(MemorySource::new(vec![0u8; 10])),
            pool,
            100,
            4,
        );
        assert!(matches!(
            result,
            Err(Error::PageSizeMismatch { pool: 64, page_size: 100 })
        ));
    }

    #[tokio::test]
    async fn test_get_page_miss_then_hit() {
        let (cache, loads) = create_cache(150, 100, 4);
        let cancel = CancellationToken::new();

        let first = cache.get_page(PageNumber::new(0), &cancel).await.unwrap();
        let second = cache.get_page(PageNumber::new(0), &cancel).await.unwrap();

        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(first.pin_count().unwrap(), 2);
        assert_eq!(loads.load(Ordering::SeqCst), 1);
        assert_eq!(cache.resident_count(), 1);

        let stats = cache.stats().snapshot();
        assert_eq!(stats.cache_hits, 1);
        assert_eq!(stats.cache_misses, 1);
    }

    #[tokio::test]
    async fn test_last_page_is_short() {
        let (cache, _) = create_cache(150, 100, 4);
        let cancel = CancellationToken::new();

        assert_eq!(cache.page_count().await.unwrap(), 2);
        let last = cache.get_page(PageNumber::new(1), &cancel).await.unwrap();
        assert_eq!(last.len(), 50);
        assert_eq!(last.get(0).unwrap(), Some(100));
    }

    #[tokio::test]
    async fn test_page_past_end_is_empty() {
        let (cache, _) = create_cache(150, 100, 4);
        let cancel = CancellationToken::new();

        let page = cache.get_page(PageNumber::new(9), &cancel).await.unwrap();
        assert!(page.is_empty());
    }

    #[tokio::test]
    async fn test_offset_overflow_touches_nothing() {
        let (cache, loads) = create_cache(150, 100, 4);
        let cancel = CancellationToken::new();

        let result = cache.get_page(PageNumber::new(u64::MAX), &cancel).await;
        assert!(matches!(result, Err(Error::OffsetOverflow { .. })));
        assert_eq!(loads.load(Ordering::SeqCst), 0);
        assert_eq!(cache.pool().created(), 0);
    }

    #[tokio::test]
    async fn test_release_evicts_oldest_unpinned() {
        let (cache, _) = create_cache(1000, 10, 2);
        let cancel = CancellationToken::new();

        for n in 0..3 {
            let page = cache.get_page(PageNumber::new(n), &cancel).await.unwrap();
            cache.release_page(&page, &cancel).await.unwrap();
        }

        // Page 0 went first
        assert_eq!(cache.resident_count(), 2);
        assert_eq!(cache.stats().snapshot().evictions, 1);
        assert_eq!(cache.pool().count(), 1);
    }

    #[tokio::test]
    async fn test_pinned_page_requeued_not_evicted() {
        let (cache, loads) = create_cache(1000, 10, 2);
        let cancel = CancellationToken::new();

        let held = cache.get_page(PageNumber::new(0), &cancel).await.unwrap();
        for n in 1..3 {
            let page = cache.get_page(PageNumber::new(n), &cancel).await.unwrap();
            cache.release_page(&page, &cancel).await.unwrap();
        }

        // Page 0 was pinned, so page 1 was evicted instead
        assert_eq!(cache.resident_count(), 2);
        assert!(!held.is_disposed());
        cache.release_page(&held, &cancel).await.unwrap();

        // Page 0 now sits behind page 2, so page 2 goes next
        let page = cache.get_page(PageNumber::new(3), &cancel).await.unwrap();
        cache.release_page(&page, &cancel).await.unwrap();
        assert!(!held.is_disposed());

        let again = cache.get_page(PageNumber::new(0), &cancel).await.unwrap();
        assert!(Arc::ptr_eq(&held, &again));
        assert_eq!(loads.load(Ordering::SeqCst), 4);
    }

    #[tokio::test]
    async fn test_capacity_zero_keeps_only_pinned() {
        let (cache, _) = create_cache(100, 10, 0);
        let cancel = CancellationToken::new();

        let page = cache.get_page(PageNumber::new(0), &cancel).await.unwrap();
        assert_eq!(cache.resident_count(), 1);

        cache.release_page(&page, &cancel).await.unwrap();
        assert_eq!(cache.resident_count(), 0);
        assert!(page.is_disposed());
        assert_eq!(cache.pool().count(), 1);
    }

    #[tokio::test]
    async fn test_failed_load_inserts_nothing() {
        let (cache, loads) = create_cache_with(100, 10, 4, true);
        let cancel = CancellationToken::new();

        let result = cache.get_page(PageNumber::new(0), &cancel).await;
        assert!(matches!(result, Err(Error::Io(_))));
        assert_eq!(loads.load(Ordering::SeqCst), 1);
        assert_eq!(cache.resident_count(), 0);
        assert_eq!(cache.pool().count(), 1);
    }

    #[tokio::test]
    async fn test_cancelled_before_gate() {
        let (cache, loads) = create_cache(100, 10, 4);
        let cancel = CancellationToken::new();
        cancel.cancel();

        let result = cache.get_page(PageNumber::new(0), &cancel).await;
        assert!(matches!(result, Err(Error::Cancelled)));
        assert_eq!(loads.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_release_twice_faults() {
        let (cache, _) = create_cache(100, 10, 4);
        let cancel = CancellationToken::new();

        let page = cache.get_page(PageNumber::new(0), &cancel).await.unwrap();
        assert_eq!(cache.release_page(&page, &cancel).await.unwrap(), 0);

        let result = cache.release_page(&page, &cancel).await;
        assert!(matches!(result, Err(Error::PinUnderflow)));
    }

    #[tokio::test]
    async fn test_cancelled_release_changes_nothing() {
        let (cache, _) = create_cache(100, 10, 0);
        let page = cache.get_page(PageNumber::new(0), &CancellationToken::new()).await.unwrap();

        let cancelled = CancellationToken::new();
        cancelled.cancel();
        let result = cache.release_page(&page, &cancelled).await;
        assert!(matches!(result, Err(Error::Cancelled)));
        assert_eq!(page.pin_count().unwrap(), 1);
        assert_eq!(cache.resident_count(), 1);

        // Retrying with a live token completes the release
        let fresh = CancellationToken::new();
        assert_eq!(cache.release_page(&page, &fresh).await.unwrap(), 0);
        assert_eq!(cache.resident_count(), 0);
        assert!(page.is_disposed());
        assert_eq!(cache.pool().count(), 1);
    }

    #[tokio::test]
    async fn test_release_foreign_page() {
        let (cache, _) = create_cache(100, 10, 4);
        let (other, _) = create_cache(100, 10, 4);
        let cancel = CancellationToken::new();

        let page = other.get_page(PageNumber::new(0), &cancel).await.unwrap();
        let result = cache.release_page(&page, &cancel).await;
        assert!(matches!(result, Err(Error::ForeignPage)));
        assert_eq!(page.pin_count().unwrap(), 1);
    }

    #[tokio::test]
    async fn test_dispose_returns_buffers() {
        let (cache, _) = create_cache(100, 10, 4);
        let cancel = CancellationToken::new();

        let held = cache.get_page(PageNumber::new(0), &cancel).await.unwrap();
        let page = cache.get_page(PageNumber::new(1), &cancel).await.unwrap();
        cache.release_page(&page, &cancel).await.unwrap();

        assert!(cache.dispose().await);
        assert!(!cache.dispose().await);

        assert!(held.is_disposed());
        assert_eq!(cache.resident_count(), 0);
        assert_eq!(cache.pool().count(), 2);

        let result = cache.get_page(PageNumber::new(0), &cancel).await;
        assert!(matches!(result, Err(Error::Disposed("SourceCache"))));
        assert!(matches!(cache.length().await, Err(Error::Disposed(_))));
    }
}
