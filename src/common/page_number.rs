//! Page number type.

use std::fmt;

use crate::common::{Error, Result};

/// Index of a page within one byte source.
///
/// Page `n` covers the bytes `n × page_size .. (n + 1) × page_size`. Page
/// numbers are scoped to a single [`SourceCache`](crate::cache::SourceCache);
/// the same number in two caches names two different pages.
///
/// # Example
/// ```
/// use pagecache::PageNumber;
///
/// let number = PageNumber::new(3);
/// assert_eq!(number.byte_offset(100).unwrap(), 300);
/// assert!(PageNumber::try_from(-1i64).is_err());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PageNumber(pub u64);

impl PageNumber {
    /// Create a new PageNumber.
    #[inline]
    pub fn new(number: u64) -> Self {
        PageNumber(number)
    }

    /// Byte offset of this page for the given page size.
    ///
    /// # Errors
    /// Returns `Error::OffsetOverflow` instead of wrapping.
    pub fn byte_offset(&self, page_size: usize) -> Result<u64> {
        u64::try_from(page_size)
            .ok()
            .and_then(|size| self.0.checked_mul(size))
            .ok_or(Error::OffsetOverflow {
                page: self.0,
                page_size,
            })
    }
}

impl From<u64> for PageNumber {
    fn from(number: u64) -> Self {
        PageNumber(number)
    }
}

impl TryFrom<i64> for PageNumber {
    type Error = Error;

    fn try_from(number: i64) -> Result<Self> {
        u64::try_from(number)
            .map(PageNumber)
            .map_err(|_| Error::PageOutOfRange(number))
    }
}

impl fmt::Display for PageNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Page({})", self.0)
    }
}
