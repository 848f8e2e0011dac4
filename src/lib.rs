//! pagecache - A bounded, concurrent page cache over random-access byte sources.
//!
//! # Architecture
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                         CacheRegistry                           │
//! │          BufferId → SourceCache, shared ByteBufferPool          │
//! ├─────────────────────────────────────────────────────────────────┤
//! │  ┌─────────────────────────────────────────────────────────┐   │
//! │  │              Cache Layer (cache/)                        │   │
//! │  │   SourceCache: gate + page table + FIFO admission        │   │
//! │  │   Page: pinned view of one rented buffer                 │   │
//! │  └─────────────────────────────────────────────────────────┘   │
//! │                   ↓ rent / release      ↓ load_at               │
//! │  ┌──────────────────────────┐  ┌──────────────────────────┐    │
//! │  │     Pool Layer (pool/)    │  │  Storage Layer (storage/) │    │
//! │  │ ObjectPool, ByteBuffer-   │  │  ByteSource: File,        │    │
//! │  │ Pool, RentedBuffer        │  │  Stream, Memory           │    │
//! │  └──────────────────────────┘  └──────────────────────────┘    │
//! └─────────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Modules
//! - [`common`] - Shared primitives (BufferId, PageNumber, config)
//! - [`error`] - Error type and `Result` alias
//! - [`pool`] - Object and byte buffer pooling
//! - [`storage`] - Byte sources pages are read from
//! - [`cache`] - Source caches and the registry
//!
//! # Quick Start
//! ```no_run
//! # async fn demo() -> pagecache::Result<()> {
//! use pagecache::{BufferId, CacheOptions, CacheRegistry, PageNumber};
//! use tokio_util::sync::CancellationToken;
//!
//! let registry = CacheRegistry::new(&CacheOptions::with_values(100, 5))?;
//! let cache = registry
//!     .register_memory(BufferId::random("demo"), vec![7u8; 150])
//!     .await?;
//!
//! let cancel = CancellationToken::new();
//! assert_eq!(cache.page_count().await?, 2);
//!
//! let page = cache.get_page(PageNumber::new(1), &cancel).await?;
//! assert_eq!(page.len(), 50);
//! cache.release_page(&page, &cancel).await?;
//!
//! registry.dispose().await;
//! # Ok(())
//! # }
//! ```

pub mod cache;
pub mod common;
pub mod error;
pub mod pool;
pub mod storage;

// Re-export commonly used items at crate root for convenience
pub use common::config::{DEFAULT_CACHE_CAPACITY, DEFAULT_PAGE_SIZE};
pub use common::{BufferId, CacheOptions, Error, IntOption, PageNumber, Result};

pub use cache::{CacheRegistry, CacheStats, Page, SourceCache, StatsSnapshot};
pub use pool::{ByteBuffer, ByteBufferPool, ObjectPool, RentedBuffer};
pub use storage::{ByteSource, FileSource, MemorySource, StreamSource};
