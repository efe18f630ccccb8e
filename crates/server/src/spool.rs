//! Spooling of multipart file parts to anonymous temporary files.
//!
//! Multipart parts arrive one after the other on a single connection, so
//! they can't be streamed into storage concurrently. Each part is copied to
//! a temporary file first; the pipeline then streams from those.

use axum::extract::multipart::{Field, MultipartError};
use bytes::Bytes;
use depot_config::UploadConfig;
use depot_upload::UploadFile;
use depot_upload::validate::check_extension;
use futures::{Stream, StreamExt, future, pin_mut, stream};
use std::io::{self, SeekFrom};
use tokio::fs::File;
use tokio::io::{AsyncSeekExt, AsyncWriteExt};
use tracing::{debug, warn};

/// Copy `field` to a temporary file and hand it back as an [`UploadFile`].
pub(crate) async fn spool(field: Field<'_>, config: &UploadConfig) -> Result<UploadFile, MultipartError> {
    let filename = field.file_name().unwrap_or_default().to_string();
    spool_part(filename, field, config).await
}

/// Spool one part's content.
///
/// A part whose name is already disallowed is drained without touching
/// the disk, and comes back empty for the pipeline to reject. Otherwise at
/// most `max_file_size + 1` bytes are kept: enough for the pipeline to see
/// that the file is too large. The rest is read and thrown away. A
/// temporary file that can't be written becomes an upload whose content
/// fails to read, so only that file fails.
async fn spool_part<S>(filename: String, chunks: S, config: &UploadConfig) -> Result<UploadFile, MultipartError>
where
    S: Stream<Item = Result<Bytes, MultipartError>>,
{
    pin_mut!(chunks);
    if check_extension(&filename, config).is_err() {
        let mut received: u64 = 0;
        while let Some(chunk) = chunks.next().await {
            received += chunk?.len() as u64;
        }
        debug!(%filename, received, "discarded part with a disallowed name");
        return Ok(UploadFile::from_bytes(filename, Bytes::new()));
    }

    let capacity = config.max_file_size.saturating_add(1);
    let mut spooled = create().await;
    let mut kept: u64 = 0;
    let mut received: u64 = 0;
    while let Some(chunk) = chunks.next().await {
        let chunk = chunk?;
        received += chunk.len() as u64;
        let Ok(file) = spooled.as_mut() else { continue };
        let take = usize::try_from(capacity - kept).unwrap_or(usize::MAX).min(chunk.len());
        if take == 0 {
            continue;
        }
        match file.write_all(&chunk[..take]).await {
            Ok(()) => kept += take as u64,
            Err(err) => spooled = Err(err),
        }
    }

    let spooled = match spooled {
        Ok(mut file) => rewind(&mut file).await.map(|()| file),
        Err(err) => Err(err),
    };
    Ok(match spooled {
        Ok(file) => {
            debug!(%filename, received, kept, "spooled file part");
            UploadFile::from_reader(filename, file, config.chunk_size)
        },
        Err(err) => {
            warn!(%filename, "could not spool file part: {err}");
            UploadFile::new(filename, stream::once(future::ready(Err(err))))
        },
    })
}

async fn create() -> io::Result<File> {
    let file = tokio::task::spawn_blocking(tempfile::tempfile).await.map_err(io::Error::other)??;
    Ok(File::from_std(file))
}

async fn rewind(file: &mut File) -> io::Result<()> {
    file.flush().await?;
    file.seek(SeekFrom::Start(0)).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn config() -> UploadConfig {
        UploadConfig { max_file_size: 10, chunk_size: 4, ..UploadConfig::default() }
    }

    /// `count` chunks of `size` bytes, counting how many were pulled.
    fn part(count: usize, size: usize, pulled: Arc<AtomicUsize>) -> impl Stream<Item = Result<Bytes, MultipartError>> {
        stream::iter((0..count).map(move |_| {
            pulled.fetch_add(1, Ordering::SeqCst);
            Ok(Bytes::from(vec![b'x'; size]))
        }))
    }

    async fn content(file: UploadFile) -> Vec<u8> {
        let mut stream = file.into_stream();
        let mut content = Vec::new();
        while let Some(chunk) = stream.next().await {
            content.extend_from_slice(&chunk.unwrap());
        }
        content
    }

    #[tokio::test]
    async fn test_disallowed_name_is_drained_not_kept() {
        let pulled = Arc::new(AtomicUsize::new(0));
        let file = spool_part("b.exe".into(), part(5, 1000, pulled.clone()), &config()).await.unwrap();
        assert_eq!(pulled.load(Ordering::SeqCst), 5);
        assert_eq!(file.filename(), "b.exe");
        assert!(content(file).await.is_empty());
    }

    #[tokio::test]
    async fn test_allowed_name_is_kept() {
        let pulled = Arc::new(AtomicUsize::new(0));
        let file = spool_part("a.txt".into(), part(2, 3, pulled), &config()).await.unwrap();
        assert_eq!(content(file).await, b"xxxxxx");
    }

    #[tokio::test]
    async fn test_oversize_part_keeps_one_byte_too_many() {
        let pulled = Arc::new(AtomicUsize::new(0));
        let file = spool_part("a.txt".into(), part(8, 4, pulled.clone()), &config()).await.unwrap();
        assert_eq!(pulled.load(Ordering::SeqCst), 8);
        assert_eq!(content(file).await.len(), 11);
    }
}
