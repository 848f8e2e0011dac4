//! Page caching.
//!
//! Sits between byte sources and readers. Each source gets its own
//! [`SourceCache`]; all caches of a [`CacheRegistry`] rent page buffers from
//! one shared pool.
//!
//! # Components
//! - [`CacheRegistry`] - named caches plus the shared buffer pool
//! - [`SourceCache`] - per-source page table, gate and eviction
//! - [`Page`] - one cached page, pinned while in use
//! - `AdmissionQueue` - FIFO eviction order (internal)
//! - [`CacheStats`] - hit, miss and eviction counters

mod admission;
mod page;
mod registry;
mod source_cache;
mod stats;

pub(crate) use admission::AdmissionQueue;
pub use page::Page;
pub use registry::CacheRegistry;
pub use source_cache::SourceCache;
pub use stats::{CacheStats, StatsSnapshot};
