//! Seekable stream byte source.

use std::io::SeekFrom;

use async_trait::async_trait;
use tokio::io::{AsyncRead, AsyncSeek, AsyncSeekExt};
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;

use crate::common::{Error, Result};
use crate::storage::{read_full, ByteSource};

/// Reads pages from any seekable async stream.
///
/// Seek and read share one stream position, so both happen under an async
/// mutex. `std::io::Cursor<Vec<u8>>` works out of the box.
pub struct StreamSource<S> {
    stream: Mutex<S>,
}

impl<S> StreamSource<S>
where
    S: AsyncRead + AsyncSeek + Unpin + Send,
{
    /// Wrap a stream.
    pub fn new(stream: S) -> Self {
        Self {
            stream: Mutex::new(stream),
        }
    }

    /// Unwrap the stream again.
    pub fn into_inner(self) -> S {
        self.stream.into_inner()
    }
}

#[async_trait]
impl<S> ByteSource for StreamSource<S>
where
    S: AsyncRead + AsyncSeek + Unpin + Send,
{
    async fn length(&self) -> Result<u64> {
        let mut stream = self.stream.lock().await;
        Ok(stream.seek(SeekFrom::End(0)).await?)
    }

    async fn load_at(
        &self,
        offset: u64,
        buf: &mut [u8],
        cancel: &CancellationToken,
    ) -> Result<usize> {
        let mut stream = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(Error::Cancelled),
            stream = self.stream.lock() => stream,
        };

        stream.seek(SeekFrom::Start(offset)).await?;
        read_full(&mut *stream, buf, cancel).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[tokio::test]
    async fn test_stream_length_and_load() {
        let data: Vec<u8> = (0..150u8).collect();
        let source = StreamSource::new(Cursor::new(data));
        let cancel = CancellationToken::new();

        assert_eq!(source.length().await.unwrap(), 150);

        // Loading after length() must seek back
        let mut buf = [0u8; 100];
        assert_eq!(source.load_at(0, &mut buf, &cancel).await.unwrap(), 100);
        assert_eq!(buf[0], 0);
        assert_eq!(buf[99], 99);

        assert_eq!(source.load_at(100, &mut buf, &cancel).await.unwrap(), 50);
        assert_eq!(buf[49], 149);
    }

    #[tokio::test]
    async fn test_stream_cancelled_before_lock() {
        let source = StreamSource::new(Cursor::new(vec![1u8; 10]));
        let cancel = CancellationToken::new();
        cancel.cancel();

        let mut buf = [0u8; 4];
        let result = source.load_at(0, &mut buf, &cancel).await;
        assert!(matches!(result, Err(Error::Cancelled)));
    }
}
