//! File-backed byte source.

use std::io::SeekFrom;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::fs::File;
use tokio::io::AsyncSeekExt;
use tokio_util::sync::CancellationToken;

use crate::common::{Error, Result};
use crate::storage::{read_full, ByteSource};

/// Reads pages straight from a file on disk.
///
/// The file is opened for every load and closed again afterwards, so no
/// handle is held while pages sit in the cache. Length is read from the
/// file metadata on each call and follows the file if it grows.
#[derive(Debug, Clone)]
pub struct FileSource {
    path: PathBuf,
}

impl FileSource {
    /// Create a source for the file at `path`. The file is not opened yet.
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    /// Path of the file.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl ByteSource for FileSource {
    async fn length(&self) -> Result<u64> {
        Ok(tokio::fs::metadata(&self.path).await?.len())
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

        let mut file = File::open(&self.path).await?;
        file.seek(SeekFrom::Start(offset)).await?;
        let n = read_full(&mut file, buf, cancel).await?;

        tracing::trace!(path = %self.path.display(), offset, bytes = n, "read file page");
        Ok(n)
    }
}
