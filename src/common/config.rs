//! Configuration for pagecache.
//!
//! Settings are plain integers with parent fallback: an unset option reads
//! its parent's *current* value (or the built-in default at the root), and
//! setting a value makes it authoritative until [`IntOption::reset`].
//!
//! # Example
//! ```
//! use pagecache::CacheOptions;
//!
//! let global = CacheOptions::new();
//! let local = CacheOptions::child_of(&global);
//!
//! global.page_size().set(4096);
//! assert_eq!(local.page_size().value(), 4096);
//!
//! local.page_size().set(512);
//! assert_eq!(local.page_size().value(), 512);
//! local.page_size().reset();
//! assert_eq!(local.page_size().value(), 4096);
//! ```

use std::sync::Arc;

use parking_lot::RwLock;

/// Default page size in bytes (100KB).
pub const DEFAULT_PAGE_SIZE: usize = 100 * 1024;

/// Default number of unpinned pages kept resident per source.
pub const DEFAULT_CACHE_CAPACITY: usize = 10;

/// Option name of the page size setting.
pub const PAGE_SIZE_OPTION: &str = "PageSize";

/// Option name of the cache capacity setting.
pub const CACHE_CAPACITY_OPTION: &str = "NumberOfPages";

/// A named integer setting with parent fallback.
#[derive(Debug)]
pub struct IntOption {
    name: &'static str,
    value: RwLock<Option<i64>>,
    default: i64,
    parent: Option<Arc<IntOption>>,
}

impl IntOption {
    /// Create a root option.
    pub fn new(name: &'static str, default: i64) -> Self {
        Self {
            name,
            value: RwLock::new(None),
            default,
            parent: None,
        }
    }

    /// Create an option that falls back to `parent` while unset.
    pub fn with_parent(parent: &Arc<IntOption>) -> Self {
        Self {
            name: parent.name,
            value: RwLock::new(None),
            default: parent.default,
            parent: Some(Arc::clone(parent)),
        }
    }

    /// Option name.
    #[inline]
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Effective value: own value, else the parent's, else the default.
    pub fn value(&self) -> i64 {
        if let Some(value) = *self.value.read() {
            return value;
        }
        match &self.parent {
            Some(parent) => parent.value(),
            None => self.default,
        }
    }

    /// Set the value, making it authoritative.
    pub fn set(&self, value: i64) {
        *self.value.write() = Some(value);
    }

    /// Forget the own value and fall back again.
    pub fn reset(&self) {
        *self.value.write() = None;
    }

    /// Check if this option carries its own value.
    pub fn is_set(&self) -> bool {
        self.value.read().is_some()
    }
}

/// Settings consumed by [`CacheRegistry`](crate::cache::CacheRegistry).
///
/// Values are validated when a registry is built, not here.
#[derive(Debug)]
pub struct CacheOptions {
    page_size: Arc<IntOption>,
    cache_capacity: Arc<IntOption>,
}

impl CacheOptions {
    /// Root options with the built-in defaults.
    pub fn new() -> Self {
        Self {
            page_size: Arc::new(IntOption::new(PAGE_SIZE_OPTION, DEFAULT_PAGE_SIZE as i64)),
            cache_capacity: Arc::new(IntOption::new(
                CACHE_CAPACITY_OPTION,
                DEFAULT_CACHE_CAPACITY as i64,
            )),
        }
    }

    /// Root options with both values set.
    pub fn with_values(page_size: i64, cache_capacity: i64) -> Self {
        let options = Self::new();
        options.page_size.set(page_size);
        options.cache_capacity.set(cache_capacity);
        options
    }

    /// Options that fall back to `parent` for every unset value.
    pub fn child_of(parent: &CacheOptions) -> Self {
        Self {
            page_size: Arc::new(IntOption::with_parent(&parent.page_size)),
            cache_capacity: Arc::new(IntOption::with_parent(&parent.cache_capacity)),
        }
    }

    /// Page size in bytes.
    pub fn page_size(&self) -> &IntOption {
        &self.page_size
    }

    /// Number of unpinned pages kept resident per source.
    pub fn cache_capacity(&self) -> &IntOption {
        &self.cache_capacity
    }

    /// Look up an option by its name.
    pub fn option(&self, name: &str) -> Option<&IntOption> {
        [&self.page_size, &self.cache_capacity]
            .into_iter()
            .find(|option| option.name == name)
            .map(|option| option.as_ref())
    }
}

impl Default for CacheOptions {
    fn default() -> Self {
        Self::new()
    }
}
