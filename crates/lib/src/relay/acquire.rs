//! Image acquisition into a temp file that is removed when the handle drops.

use crate::channels::{ContentSource, ImageHandle, PlatformError};
use futures_util::StreamExt;
use std::path::Path;
use tempfile::NamedTempFile;
use tokio::io::AsyncWriteExt;

#[derive(Debug, thiserror::Error)]
pub enum AcquisitionError {
    #[error("content fetch failed: {0}")]
    Fetch(#[from] PlatformError),
    #[error("content stream was empty")]
    Empty,
    #[error("writing temp file failed: {0}")]
    Io(#[from] std::io::Error),
}

/// Downloaded image bytes on disk. The file is deleted when this value is dropped.
#[derive(Debug)]
pub struct ScopedImage {
    file: NamedTempFile,
    len: u64,
}

impl ScopedImage {
    pub fn path(&self) -> &Path {
        self.file.path()
    }

    pub fn len(&self) -> u64 {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub async fn read(&self) -> std::io::Result<Vec<u8>> {
        tokio::fs::read(self.file.path()).await
    }
}

/// Stream the content behind `handle` into a new temp file (in `dir`, or the system temp dir).
/// On any error the partially written file is removed before returning.
pub async fn acquire(
    source: &dyn ContentSource,
    handle: &ImageHandle,
    dir: Option<&Path>,
) -> Result<ScopedImage, AcquisitionError> {
    let mut builder = tempfile::Builder::new();
    builder.prefix("linebridge-").suffix(".jpg");
    let file = match dir {
        Some(d) => builder.tempfile_in(d)?,
        None => builder.tempfile()?,
    };
    let mut out = tokio::fs::File::from_std(file.reopen()?);
    let mut stream = source.fetch_content(&handle.content_id).await?;
    let mut len: u64 = 0;
    while let Some(chunk) = stream.next().await {
        let chunk = chunk?;
        out.write_all(&chunk).await?;
        len += chunk.len() as u64;
    }
    out.flush().await?;
    if len == 0 {
        return Err(AcquisitionError::Empty);
    }
    log::debug!(
        "relay: acquired {} bytes for content {}",
        len,
        handle.content_id
    );
    Ok(ScopedImage { file, len })
}
