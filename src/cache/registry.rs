//! Registry of named source caches sharing one buffer pool.

use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

use bytes::Bytes;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use tokio::io::{AsyncRead, AsyncSeek};
use tracing::{debug, warn};

use crate::cache::SourceCache;
use crate::common::{BufferId, CacheOptions, DisposeFlag, Error, Result};
use crate::pool::ByteBufferPool;
use crate::storage::{ByteSource, FileSource, MemorySource, StreamSource};

/// Owns the shared [`ByteBufferPool`] and one [`SourceCache`] per
/// registered source.
///
/// Page size and capacity are read from [`CacheOptions`] once, at
/// construction. Every cache built by the registry uses them.
///
/// # Usage
/// ```no_run
/// # async fn demo() -> pagecache::Result<()> {
/// use pagecache::{BufferId, CacheOptions, CacheRegistry, PageNumber};
/// use tokio_util::sync::CancellationToken;
///
/// let registry = CacheRegistry::new(&CacheOptions::with_values(4096, 16))?;
/// let cache = registry
///     .register_file(BufferId::random("data"), "data.bin")
///     .await?;
///
/// let cancel = CancellationToken::new();
/// let page = cache.get_page(PageNumber::new(0), &cancel).await?;
/// let first = page.get(0)?;
/// cache.release_page(&page, &cancel).await?;
/// # let _ = first;
/// # Ok(())
/// # }
/// ```
pub struct CacheRegistry {
    caches: DashMap<BufferId, Arc<SourceCache>>,
    pool: Arc<ByteBufferPool>,
    page_size: usize,
    capacity: usize,
    lifecycle: DisposeFlag,
}

impl CacheRegistry {
    /// Create a registry with its own buffer pool.
    ///
    /// # Errors
    /// - `Error::InvalidPageSize` if the page size is not positive
    /// - `Error::InvalidCapacity` if the capacity is negative
    pub fn new(options: &CacheOptions) -> Result<Self> {
        Self::with_pool(options, None)
    }

    /// Create a registry, optionally sharing an existing buffer pool.
    ///
    /// # Errors
    /// Same as [`new`](Self::new), plus `Error::PageSizeMismatch` if `pool`
    /// hands out buffers of a different size than the page size.
    pub fn with_pool(options: &CacheOptions, pool: Option<Arc<ByteBufferPool>>) -> Result<Self> {
        let raw_page_size = options.page_size().value();
        let page_size = match usize::try_from(raw_page_size) {
            Ok(size) if size > 0 => size,
            _ => return Err(Error::InvalidPageSize(raw_page_size)),
        };

        let raw_capacity = options.cache_capacity().value();
        let capacity =
            usize::try_from(raw_capacity).map_err(|_| Error::InvalidCapacity(raw_capacity))?;

        let pool = match pool {
            Some(pool) if pool.capacity() != page_size => {
                return Err(Error::PageSizeMismatch {
                    pool: pool.capacity(),
                    page_size,
                });
            }
            Some(pool) => pool,
            None => Arc::new(ByteBufferPool::new(page_size)),
        };

        Ok(Self {
            caches: DashMap::new(),
            pool,
            page_size,
            capacity,
            lifecycle: DisposeFlag::new("CacheRegistry"),
        })
    }

    // ========================================================================
    // Registration
    // ========================================================================

    /// Build a cache over `source` and register it under `id`.
    ///
    /// # Errors
    /// - `Error::AlreadyRegistered` if `id` is taken; the new cache is torn
    ///   down and the existing one is untouched
    /// - `Error::Disposed` if the registry was torn down
    pub async fn register(
        &self,
        id: BufferId,
        source: Box<dyn ByteSource>,
    ) -> Result<Arc<SourceCache>> {
        self.lifecycle.ensure_live()?;

        let cache = Arc::new(SourceCache::new(
            id.clone(),
            source,
            Arc::clone(&self.pool),
            self.page_size,
            self.capacity,
        )?);

        let inserted = match self.caches.entry(id.clone()) {
            Entry::Occupied(_) => false,
            Entry::Vacant(entry) => {
                entry.insert(Arc::clone(&cache));
                true
            }
        };

        if !inserted {
            warn!(source = %id, "source already registered");
            cache.dispose().await;
            return Err(Error::AlreadyRegistered(id));
        }

        // Lost a race with dispose(): take the entry back out
        if self.lifecycle.is_disposed() {
            self.caches
                .remove_if(&id, |_, registered| Arc::ptr_eq(registered, &cache));
            cache.dispose().await;
            return Err(Error::Disposed("CacheRegistry"));
        }

        debug!(source = %id, page_size = self.page_size, capacity = self.capacity, "source registered");
        Ok(cache)
    }

    /// Register a file on disk.
    pub async fn register_file(
        &self,
        id: BufferId,
        path: impl Into<PathBuf>,
    ) -> Result<Arc<SourceCache>> {
        self.register(id, Box::new(FileSource::new(path.into()))).await
    }

    /// Register a seekable stream.
    pub async fn register_stream<S>(&self, id: BufferId, stream: S) -> Result<Arc<SourceCache>>
    where
        S: AsyncRead + AsyncSeek + Unpin + Send + 'static,
    {
        self.register(id, Box::new(StreamSource::new(stream))).await
    }

    /// Register bytes already in memory.
    pub async fn register_memory(
        &self,
        id: BufferId,
        data: impl Into<Bytes>,
    ) -> Result<Arc<SourceCache>> {
        self.register(id, Box::new(MemorySource::new(data))).await
    }

    /// Remove the cache registered under `id` and tear it down.
    ///
    /// Returns `false` if nothing was registered under `id`.
    pub async fn unregister(&self, id: &BufferId) -> bool {
        let Some((_, cache)) = self.caches.remove(id) else {
            return false;
        };
        cache.dispose().await;
        debug!(source = %id, "source unregistered");
        true
    }

    // ========================================================================
    // Lookup and info
    // ========================================================================

    /// Cache registered under `id`.
    pub fn get(&self, id: &BufferId) -> Option<Arc<SourceCache>> {
        self.caches.get(id).map(|entry| Arc::clone(entry.value()))
    }

    /// Check if `id` is registered.
    pub fn contains(&self, id: &BufferId) -> bool {
        self.caches.contains_key(id)
    }

    /// Ids of every registered source.
    pub fn ids(&self) -> Vec<BufferId> {
        self.caches.iter().map(|entry| entry.key().clone()).collect()
    }

    /// Number of registered sources.
    pub fn len(&self) -> usize {
        self.caches.len()
    }

    /// Check if no source is registered.
    pub fn is_empty(&self) -> bool {
        self.caches.is_empty()
    }

    /// Shared buffer pool.
    pub fn pool(&self) -> &Arc<ByteBufferPool> {
        &self.pool
    }

    /// Page size used by every cache.
    pub fn page_size(&self) -> usize {
        self.page_size
    }

    /// Capacity given to every cache.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Check if the registry was torn down.
    pub fn is_disposed(&self) -> bool {
        self.lifecycle.is_disposed()
    }

    /// Tear down every registered cache. Returns `false` if the registry was
    /// already torn down.
    pub async fn dispose(&self) -> bool {
        if !self.lifecycle.begin() {
            return false;
        }

        // Remove one by one so every cache that leaves the map is disposed
        let mut disposed = 0;
        loop {
            let ids = self.ids();
            if ids.is_empty() {
                break;
            }
            for id in ids {
                if let Some((_, cache)) = self.caches.remove(&id) {
                    cache.dispose().await;
                    disposed += 1;
                }
            }
        }

        debug!(caches = disposed, "cache registry disposed");
        true
    }
}

impl fmt::Debug for CacheRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CacheRegistry")
            .field("caches", &self.caches.len())
            .field("page_size", &self.page_size)
            .field("capacity", &self.capacity)
            .field("pool", &self.pool)
            .field("disposed", &self.is_disposed())
            .finish()
    }
}
