//! FIFO admission queue.
//!
//! Records the order in which pages were admitted to a cache. Eviction
//! candidates are taken from the front; re-accessing a page does not
//! reorder it (admission order, not access order).

use std::collections::{HashSet, VecDeque};

use crate::common::PageNumber;

/// Admission order of resident pages.
///
/// Every resident page appears exactly once. A pinned page popped as an
/// eviction candidate is pushed to the back again with [`requeue`], so it
/// stays a candidate for later.
///
/// [`requeue`]: AdmissionQueue::requeue
#[derive(Debug, Default)]
pub struct AdmissionQueue {
    /// Page numbers in admission order (front = oldest).
    queue: VecDeque<PageNumber>,

    /// Set for O(1) membership check.
    queued: HashSet<PageNumber>,
}

impl AdmissionQueue {
    /// Create an empty queue.
    #[cfg(test)]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a newly admitted page. Re-admitting a queued page is ignored.
    pub fn admit(&mut self, number: PageNumber) {
        if self.queued.insert(number) {
            self.queue.push_back(number);
        }
    }

    /// Take the oldest page number.
    pub fn pop_oldest(&mut self) -> Option<PageNumber> {
        let number = self.queue.pop_front()?;
        self.queued.remove(&number);
        Some(number)
    }

    /// Put a popped candidate back at the end of the line.
    pub fn requeue(&mut self, number: PageNumber) {
        self.admit(number);
    }

    /// Check if a page is tracked.
    #[cfg(test)]
    pub fn contains(&self, number: PageNumber) -> bool {
        self.queued.contains(&number)
    }

    /// Number of tracked pages.
    pub fn len(&self) -> usize {
        self.queue.len()
    }

    /// Check if nothing is tracked.
    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    /// Forget every page.
    pub fn clear(&mut self) {
        self.queue.clear();
        self.queued.clear();
    }
}
