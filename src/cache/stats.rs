//! Per-source counters.
//!
//! Every `get_page` call is either a hit or a miss. A miss that reaches the
//! source and succeeds also counts as a load; failed or cancelled loads only
//! count as misses.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

/// Counters of one [`SourceCache`](crate::cache::SourceCache).
///
/// Updated with relaxed atomics; read them through [`snapshot`].
///
/// ```
/// use pagecache::CacheStats;
///
/// let stats = CacheStats::new();
/// assert_eq!(stats.snapshot().requests(), 0);
/// ```
///
/// [`snapshot`]: CacheStats::snapshot
#[derive(Debug, Default)]
pub struct CacheStats {
    pub cache_hits: AtomicU64,
    pub cache_misses: AtomicU64,
    /// Pages dropped by capacity reclaim. Pages freed by `dispose` are not counted.
    pub evictions: AtomicU64,
    pub pages_loaded: AtomicU64,
    pub bytes_loaded: AtomicU64,
}

impl CacheStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn record_hit(&self) {
        self.cache_hits.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_miss(&self) {
        self.cache_misses.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_eviction(&self) {
        self.evictions.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_load(&self, bytes: usize) {
        self.pages_loaded.fetch_add(1, Ordering::Relaxed);
        self.bytes_loaded.fetch_add(bytes as u64, Ordering::Relaxed);
    }

    /// Read every counter. The fields are loaded one at a time, so a
    /// snapshot taken under concurrent traffic may be slightly skewed.
    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            cache_hits: self.cache_hits.load(Ordering::Relaxed),
            cache_misses: self.cache_misses.load(Ordering::Relaxed),
            evictions: self.evictions.load(Ordering::Relaxed),
            pages_loaded: self.pages_loaded.load(Ordering::Relaxed),
            bytes_loaded: self.bytes_loaded.load(Ordering::Relaxed),
        }
    }
}

/// Plain copy of [`CacheStats`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StatsSnapshot {
    pub cache_hits: u64,
    pub cache_misses: u64,
    pub evictions: u64,
    pub pages_loaded: u64,
    pub bytes_loaded: u64,
}

impl StatsSnapshot {
    /// Total `get_page` calls seen.
    pub fn requests(&self) -> u64 {
        self.cache_hits + self.cache_misses
    }

    /// Share of requests served without touching the source, `0.0` when idle.
    pub fn hit_rate(&self) -> f64 {
        match self.requests() {
            0 => 0.0,
            total => self.cache_hits as f64 / total as f64,
        }
    }

    /// Misses that did not end in a loaded page.
    pub fn failed_loads(&self) -> u64 {
        self.cache_misses.saturating_sub(self.pages_loaded)
    }
}

impl fmt::Display for StatsSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} requests ({:.1}% hits), {} loaded ({} bytes), {} failed, {} evicted",
            self.requests(),
            self.hit_rate() * 100.0,
            self.pages_loaded,
            self.bytes_loaded,
            self.failed_loads(),
            self.evictions,
        )
    }
}
