//! Upload validation: an extension check that reads nothing, and a size
//! ceiling enforced chunk by chunk while the content streams through.

use crate::error::{ErrorKind, Result};
use crate::file::{ByteStream, UploadFile};
use crate::naming::sanitize;
use bytes::Bytes;
use depot_config::UploadConfig;
use exn::ResultExt;
use tokio::io::AsyncReadExt;
use tokio_util::io::StreamReader;

/// Lowercased text after the last `.` of the sanitized filename.
pub fn extension(filename: &str) -> Option<String> {
    let name = sanitize(filename);
    let (_, ext) = name.rsplit_once('.')?;
    (!ext.is_empty()).then(|| ext.to_ascii_lowercase())
}

/// Reject a file by name alone, before any of its content is read.
pub fn check_extension(filename: &str, config: &UploadConfig) -> Result<String> {
    match extension(filename) {
        Some(ext) if config.is_allowed(&ext) => Ok(ext),
        _ => exn::bail!(ErrorKind::InvalidExtension),
    }
}

/// Running byte count that fails the moment it passes `max`.
#[derive(Debug, Clone, Copy)]
pub struct SizeLimit {
    max: u64,
    seen: u64,
}
impl SizeLimit {
    pub fn new(max: u64) -> Self {
        Self { max, seen: 0 }
    }

    /// Count `bytes` more. Fails with [`ErrorKind::TooLarge`] once the total
    /// exceeds the limit.
    pub fn admit(&mut self, bytes: usize) -> Result<u64> {
        self.seen = self.seen.saturating_add(bytes as u64);
        if self.seen > self.max {
            exn::bail!(ErrorKind::TooLarge(self.max));
        }
        Ok(self.seen)
    }

    pub fn seen(&self) -> u64 {
        self.seen
    }
}

/// Reads an upload in `chunk_size` pieces, counting every byte against the
/// size limit as it goes.
pub(crate) struct MeteredReader {
    reader: StreamReader<ByteStream, Bytes>,
    buf: Vec<u8>,
    limit: SizeLimit,
}
impl MeteredReader {
    pub(crate) fn new(file: UploadFile, config: &UploadConfig) -> Self {
        Self {
            reader: file.into_reader(),
            buf: vec![0; config.chunk_size.max(1)],
            limit: SizeLimit::new(config.max_file_size),
        }
    }

    /// The next chunk, or `None` once the stream is exhausted. Nothing past
    /// the limit is ever handed out.
    pub(crate) async fn next_chunk(&mut self) -> Result<Option<&[u8]>> {
        let read = self.reader.read(&mut self.buf).await.or_raise(|| ErrorKind::Read)?;
        if read == 0 {
            return Ok(None);
        }
        self.limit.admit(read)?;
        Ok(Some(&self.buf[..read]))
    }

    pub(crate) fn total(&self) -> u64 {
        self.limit.seen()
    }
}

/// Check a file without storing it: extension first, then its content is
/// read and counted until it ends or passes the size limit.
///
/// Returns the file's size. The content is consumed either way; to validate
/// and store in one pass, use [`Uploader`](crate::Uploader).
pub async fn validate(file: UploadFile, config: &UploadConfig) -> Result<u64> {
    check_extension(file.filename(), config)?;
    let mut reader = MeteredReader::new(file, config);
    while reader.next_chunk().await?.is_some() {}
    Ok(reader.total())
}
