//! Pin counting and one-shot teardown.
//!
//! - [`DisposeFlag`] - atomic `Active → Disposed` transition
//! - [`UsageCounter`] - pin count layered on a [`DisposeFlag`]
//!
//! Pooled buffers and cached pages both embed a [`UsageCounter`]. What
//! happens when the count drops to zero is up to the owner: a pooled buffer
//! goes back to its pool, a page becomes an eviction candidate.

use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};

use crate::common::{Error, Result};

/// One-shot teardown guard.
///
/// [`begin`](Self::begin) is a compare-and-set from live to disposed and
/// reports whether *this* call won, so the teardown body runs exactly once
/// even when several callers race.
#[derive(Debug)]
pub struct DisposeFlag {
    disposed: AtomicBool,
    /// Type name reported in `Error::Disposed`.
    kind: &'static str,
}

impl DisposeFlag {
    /// Create a live flag.
    pub const fn new(kind: &'static str) -> Self {
        Self {
            disposed: AtomicBool::new(false),
            kind,
        }
    }

    /// Transition to disposed. Returns `true` only for the winning caller.
    #[inline]
    pub fn begin(&self) -> bool {
        self.disposed
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    /// Check if teardown has started.
    #[inline]
    pub fn is_disposed(&self) -> bool {
        self.disposed.load(Ordering::Acquire)
    }

    /// Fail with `Error::Disposed` once torn down.
    #[inline]
    pub fn ensure_live(&self) -> Result<()> {
        if self.is_disposed() {
            Err(Error::Disposed(self.kind))
        } else {
            Ok(())
        }
    }
}

/// Atomic pin count with a disposed state.
///
/// The count never wraps and never goes below zero; both are reported as
/// errors and leave the count unchanged.
#[derive(Debug)]
pub struct UsageCounter {
    count: AtomicU32,
    lifecycle: DisposeFlag,
}

impl UsageCounter {
    /// Create an unpinned counter.
    pub const fn new(kind: &'static str) -> Self {
        Self::with_count(kind, 0)
    }

    /// Create a counter that starts pinned once.
    pub const fn pinned(kind: &'static str) -> Self {
        Self::with_count(kind, 1)
    }

    const fn with_count(kind: &'static str, count: u32) -> Self {
        Self {
            count: AtomicU32::new(count),
            lifecycle: DisposeFlag::new(kind),
        }
    }

    /// Increment the pin count. Returns the new pin count.
    pub fn pin(&self) -> Result<u32> {
        self.lifecycle.ensure_live()?;
        self.count
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |c| c.checked_add(1))
            .map(|old| old + 1)
            .map_err(|_| Error::PinOverflow)
    }

    /// Decrement the pin count. Returns the new pin count.
    pub fn unpin(&self) -> Result<u32> {
        self.lifecycle.ensure_live()?;
        self.count
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |c| c.checked_sub(1))
            .map(|old| old - 1)
            .map_err(|_| Error::PinUnderflow)
    }

    /// Get the current pin count.
    pub fn count(&self) -> Result<u32> {
        self.lifecycle.ensure_live()?;
        Ok(self.current())
    }

    /// Check if the object is currently pinned.
    pub fn is_pinned(&self) -> Result<bool> {
        Ok(self.count()? > 0)
    }

    /// Pin count without the disposed check, for owners holding their own lock.
    #[inline]
    pub(crate) fn current(&self) -> u32 {
        self.count.load(Ordering::Acquire)
    }

    /// Drop every pin. Used when an item goes back on a free list.
    #[inline]
    pub(crate) fn reset(&self) {
        self.count.store(0, Ordering::Release);
    }

    /// Start teardown. Returns `true` only for the winning caller.
    #[inline]
    pub fn begin_dispose(&self) -> bool {
        self.lifecycle.begin()
    }

    /// Check if the counter was torn down.
    #[inline]
    pub fn is_disposed(&self) -> bool {
        self.lifecycle.is_disposed()
    }
}
