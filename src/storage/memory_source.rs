//! In-memory byte source.

use async_trait::async_trait;
use bytes::Bytes;
use tokio_util::sync::CancellationToken;

use crate::common::{Error, Result};
use crate::storage::ByteSource;

/// Serves pages from bytes already held in memory.
///
/// Mostly useful for tests and for data that arrived over the network.
#[derive(Debug, Clone)]
pub struct MemorySource {
    data: Bytes,
}

impl MemorySource {
    /// Create a source over `data`.
    pub fn new(data: impl Into<Bytes>) -> Self {
        Self { data: data.into() }
    }
}

#[async_trait]
impl ByteSource for MemorySource {
    async fn length(&self) -> Result<u64> {
        Ok(self.data.len() as u64)
    }

    async fn load_at(
        &self,
        offset: u64,
        buf: &mut [u8],
        cancel: &CancellationToken,
    ) -> Result<usize> {
        if cancel.is_cancelled() {
            return Err(Error::Cancelled);
        }

        let start = match usize::try_from(offset) {
            Ok(start) if start < self.data.len() => start,
            _ => return Ok(0),
        };
        let n = buf.len().min(self.data.len() - start);
        buf[..n].copy_from_slice(&self.data[start..start + n]);
        Ok(n)
    }
}
