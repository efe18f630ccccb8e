//! In-memory storage backend for testing.

use crate::backend::BoxAsyncWrite;
use crate::error::{ErrorKind, Result};
use crate::file::FileInfo;
use crate::path::validate as validate_path;
use crate::StorageBackend;
use async_trait::async_trait;
use std::collections::HashMap;
use std::io;
use std::path::{Path, PathBuf};
use std::pin::Pin;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::task::{Context, Poll};
use time::OffsetDateTime;
use tokio::io::AsyncWrite;

type Files = Arc<Mutex<HashMap<PathBuf, (OffsetDateTime, Vec<u8>)>>>;

/// Counts writers that are currently open, and the most that ever were.
#[derive(Default)]
struct Gauge {
    open: AtomicUsize,
    peak: AtomicUsize,
}
impl Gauge {
    fn enter(&self) {
        let now = self.open.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
    }

    fn leave(&self) {
        self.open.fetch_sub(1, Ordering::SeqCst);
    }
}

/// In-memory storage backend for testing.
///
/// Files are stored in a `HashMap` behind a [`Mutex`] shared with every
/// writer handed out, so bytes show up as they are written (a partially
/// written file is observable, the same as on a real disk).
///
/// The backend also keeps an instrumented count of open writers, which is how
/// tests observe how many uploads were in flight at the same time, and can be
/// told to fail writes for particular files.
///
/// # Examples
///
/// ```
/// use depot_storage::backend::{MockBackend, StorageBackend};
/// use std::path::Path;
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let backend = MockBackend::with_files([
///     ("proj123/abc_notes.txt", b"some notes"),
/// ]);
/// assert!(backend.exists(Path::new("proj123/abc_notes.txt")).await?);
/// assert_eq!(backend.peak_writers(), 0);
/// # Ok(())
/// # }
/// ```
pub struct MockBackend {
    name: String,
    storage: Files,
    writers: Arc<Gauge>,
    failing: Vec<String>,
}

impl MockBackend {
    /// Create a mock backend pre-populated with files.
    ///
    /// Panics if any path fails validation (e.g. path traversal). If test
    /// setup is wrong, then test should not pass.
    pub fn with_files(files: impl IntoIterator<Item = (impl Into<PathBuf>, impl Into<Vec<u8>>)>) -> Self {
        let mut map = HashMap::new();
        let now = OffsetDateTime::now_utc();
        for (path, data) in files {
            let path = path.into();
            let Ok(validated) = validate_path(&path) else {
                // The panic here is DELIBERATE. MockBackend is intended to be
                // used in tests; panics are expected. There is no error result.
                panic!("MockBackend::with_files: invalid path {}", path.display());
            };
            map.insert(validated, (now, data.into()));
        }
        Self {
            name: "mock".to_string(),
            storage: Arc::new(Mutex::new(map)),
            writers: Arc::default(),
            failing: Vec::new(),
        }
    }

    /// Change the name of the mock backend.
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Make every write to a file whose name contains `needle` fail with an
    /// I/O error. The file itself is still created when the writer is opened.
    pub fn fail_writes_matching(mut self, needle: impl Into<String>) -> Self {
        self.failing.push(needle.into());
        self
    }

    /// Number of writers currently open.
    pub fn open_writers(&self) -> usize {
        self.writers.open.load(Ordering::SeqCst)
    }

    /// Highest number of writers that were ever open at the same time.
    pub fn peak_writers(&self) -> usize {
        self.writers.peak.load(Ordering::SeqCst)
    }

    /// Number of files currently stored.
    pub fn len(&self) -> usize {
        self.files().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Paths of every stored file, sorted.
    pub fn paths(&self) -> Vec<PathBuf> {
        let mut paths: Vec<_> = self.files().keys().cloned().collect();
        paths.sort();
        paths
    }

    fn files(&self) -> MutexGuard<'_, HashMap<PathBuf, (OffsetDateTime, Vec<u8>)>> {
        self.storage.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn should_fail(&self, path: &Path) -> bool {
        let name = path.file_name().map(|n| n.to_string_lossy()).unwrap_or_default();
        self.failing.iter().any(|needle| name.contains(needle.as_str()))
    }
}
impl Default for MockBackend {
    fn default() -> Self {
        let files: [(&str, &str); 0] = [];
        Self::with_files(files)
    }
}

struct MockWriter {
    path: PathBuf,
    storage: Files,
    gauge: Arc<Gauge>,
    fail: bool,
}
impl MockWriter {
    fn new(path: PathBuf, storage: Files, gauge: Arc<Gauge>, fail: bool) -> Self {
        gauge.enter();
        Self { path, storage, gauge, fail }
    }
}
impl Drop for MockWriter {
    fn drop(&mut self) {
        self.gauge.leave();
    }
}
impl AsyncWrite for MockWriter {
    fn poll_write(self: Pin<&mut Self>, _cx: &mut Context<'_>, buf: &[u8]) -> Poll<io::Result<usize>> {
        if self.fail {
            return Poll::Ready(Err(io::Error::other("injected write failure")));
        }
        let mut files = self.storage.lock().unwrap_or_else(PoisonError::into_inner);
        match files.get_mut(&self.path) {
            Some((modified, data)) => {
                data.extend_from_slice(buf);
                *modified = OffsetDateTime::now_utc();
                Poll::Ready(Ok(buf.len()))
            },
            // Deleted out from under an open writer.
            None => Poll::Ready(Err(io::Error::from(io::ErrorKind::NotFound))),
        }
    }

    fn poll_flush(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Poll::Ready(Ok(()))
    }

    fn poll_shutdown(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Poll::Ready(Ok(()))
    }
}

#[async_trait]
impl StorageBackend for MockBackend {
    fn name(&self) -> &str {
        &self.name
    }

    async fn exists(&self, path: &Path) -> Result<bool> {
        let path = validate_path(path)?;
        Ok(self.files().contains_key(&path))
    }

    async fn read(&self, path: &Path) -> Result<Vec<u8>> {
        let path = validate_path(path)?;
        let (_modified, data) = self.files().get(&path).cloned().ok_or_else(|| exn::Exn::from(ErrorKind::NotFound(path)))?;
        Ok(data)
    }

    async fn writer(&self, path: &Path) -> Result<BoxAsyncWrite> {
        let path = validate_path(path)?;
        {
            let mut files = self.files();
            if files.contains_key(&path) {
                exn::bail!(ErrorKind::AlreadyExists(path));
            }
            files.insert(path.clone(), (OffsetDateTime::now_utc(), Vec::new()));
        }
        let fail = self.should_fail(&path);
        Ok(Box::pin(MockWriter::new(path, self.storage.clone(), self.writers.clone(), fail)))
    }

    async fn delete(&self, path: &Path) -> Result<()> {
        let path = validate_path(path)?;
        self.files().remove(&path).map(|_| ()).ok_or_else(|| exn::Exn::from(ErrorKind::NotFound(path)))
    }

    async fn stat(&self, path: &Path) -> Result<FileInfo> {
        let path = validate_path(path)?;
        let files = self.files();
        let (modified, data) = files.get(&path).ok_or_else(|| exn::Exn::from(ErrorKind::NotFound(path.clone())))?;
        Ok(FileInfo::new(path.clone(), data.len() as u64, *modified))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::AsyncWriteExt;

    #[tokio::test]
    async fn test_writer_and_read() {
        let backend = MockBackend::default();
        let mut writer = backend.writer(Path::new("proj1/notes.txt")).await.unwrap();
        writer.write_all(b"hello ").await.unwrap();
        writer.write_all(b"world").await.unwrap();
        writer.shutdown().await.unwrap();
        assert_eq!(backend.read(Path::new("proj1/notes.txt")).await.unwrap(), b"hello world");
    }

    #[tokio::test]
    async fn test_writer_is_exclusive() {
        let backend = MockBackend::with_files([("proj1/notes.txt", Vec::from(*b"taken"))]);
        let err = backend.writer(Path::new("proj1/notes.txt")).await.err().unwrap();
        assert!(matches!(&*err, ErrorKind::AlreadyExists(_)));
    }

    #[tokio::test]
    async fn test_writer_gauge() {
        let backend = MockBackend::default();
        let first = backend.writer(Path::new("a.txt")).await.unwrap();
        let second = backend.writer(Path::new("b.txt")).await.unwrap();
        assert_eq!(backend.open_writers(), 2);
        drop(first);
        assert_eq!(backend.open_writers(), 1);
        drop(second);
        assert_eq!(backend.open_writers(), 0);
        assert_eq!(backend.peak_writers(), 2);
    }

    #[tokio::test]
    async fn test_injected_failure() {
        let backend = MockBackend::default().fail_writes_matching("broken");
        let mut writer = backend.writer(Path::new("proj1/xyz_broken.txt")).await.unwrap();
        assert!(writer.write_all(b"data").await.is_err());
        // The file was created by opening the writer and is left for the caller to clean up
        assert!(backend.exists(Path::new("proj1/xyz_broken.txt")).await.unwrap());
        let mut writer = backend.writer(Path::new("proj1/fine.txt")).await.unwrap();
        assert!(writer.write_all(b"data").await.is_ok());
    }

    #[tokio::test]
    async fn test_delete_and_stat() {
        let backend = MockBackend::with_files([("proj1/file.txt", Vec::from(*b"12345"))]);
        assert_eq!(backend.stat(Path::new("proj1/file.txt")).await.unwrap().size, 5);
        backend.delete(Path::new("proj1/file.txt")).await.unwrap();
        assert!(backend.is_empty());
        let err = backend.delete(Path::new("proj1/file.txt")).await.unwrap_err();
        assert!(matches!(&*err, ErrorKind::NotFound(_)));
    }

    #[tokio::test]
    async fn test_path_traversal_rejected() {
        let backend = MockBackend::default();
        assert!(backend.read(Path::new("../etc/passwd")).await.is_err());
        assert!(backend.writer(Path::new("../escape")).await.is_err());
    }

    #[test]
    #[should_panic(expected = "invalid path")]
    fn test_with_files_panics_on_bad_path() {
        MockBackend::with_files([("../escape", Vec::from(*b"bad"))]);
    }
}
