use bytes::Bytes;
use futures::stream::{self, Stream};
use std::fmt;
use std::io;
use std::pin::Pin;
use tokio::io::AsyncRead;
use tokio_util::io::{ReaderStream, StreamReader};

/// Bytes of an upload as they arrive from the client.
pub type ByteStream = Pin<Box<dyn Stream<Item = io::Result<Bytes>> + Send>>;

/// One file of an upload request: the name the client declared and a stream
/// of its content, of unknown length.
///
/// The stream is consumed at most once, by whichever task processes the file.
pub struct UploadFile {
    filename: String,
    stream: ByteStream,
}
impl UploadFile {
    pub fn new(filename: impl Into<String>, stream: impl Stream<Item = io::Result<Bytes>> + Send + 'static) -> Self {
        Self { filename: filename.into(), stream: Box::pin(stream) }
    }

    /// Stream the content out of any async reader (such as a spooled
    /// temporary file), `chunk_size` bytes at a time.
    pub fn from_reader(filename: impl Into<String>, reader: impl AsyncRead + Send + 'static, chunk_size: usize) -> Self {
        Self::new(filename, ReaderStream::with_capacity(reader, chunk_size.max(1)))
    }

    /// Content that is already in memory.
    pub fn from_bytes(filename: impl Into<String>, content: impl Into<Bytes>) -> Self {
        let content = content.into();
        Self::new(filename, stream::iter((!content.is_empty()).then_some(Ok(content))))
    }

    /// The filename as declared by the client, unsanitized.
    pub fn filename(&self) -> &str {
        &self.filename
    }

    /// Take the content stream, consuming the file.
    pub fn into_stream(self) -> ByteStream {
        self.stream
    }

    pub(crate) fn into_reader(self) -> StreamReader<ByteStream, Bytes> {
        StreamReader::new(self.stream)
    }
}
impl fmt::Debug for UploadFile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UploadFile").field("filename", &self.filename).finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::StreamExt;

    #[tokio::test]
    async fn test_from_reader_reads_in_chunks() {
        let file = UploadFile::from_reader("a.txt", &b"0123456789"[..], 4);
        let chunks: Vec<Bytes> = file.stream.map(|chunk| chunk.unwrap()).collect().await;
        assert!(chunks.len() >= 3);
        assert!(chunks.iter().all(|chunk| chunk.len() <= 4));
        assert_eq!(chunks.concat(), b"0123456789");
    }

    #[tokio::test]
    async fn test_empty_bytes_yield_nothing() {
        let file = UploadFile::from_bytes("a.txt", Bytes::new());
        assert_eq!(file.stream.count().await, 0);
    }
}
