//! Storage backend trait and implementations.
//!
//! This module defines the `StorageBackend` trait, the narrow interface the
//! upload pipeline writes through. Backends are async end-to-end so that a
//! slow disk never blocks sibling uploads running on the same runtime.

mod local;
#[cfg(feature = "mock")]
mod mock;

pub use self::local::LocalBackend;
#[cfg(feature = "mock")]
pub use self::mock::MockBackend;
use crate::error::Result;
use crate::file::FileInfo;
use async_trait::async_trait;
use std::path::Path;
use std::pin::Pin;
use tokio::io::AsyncWrite;

/// A writer returned by [`StorageBackend::writer`].
///
/// The file behind it is released when the writer is dropped, whatever state
/// the write was left in.
pub type BoxAsyncWrite = Pin<Box<dyn AsyncWrite + Send + 'static>>;

/// Unified interface for storage backends.
///
/// # Path Handling
/// All paths are relative to the storage root and must be validated using
/// [`validate_path`](crate::validate_path) before use. Implementations should
/// enforce this validation.
///
/// # Examples
///
/// ```
/// use std::path::Path;
/// use tokio::io::AsyncWriteExt;
/// use depot_storage::{backend::StorageBackend, error::Result};
///
/// async fn store_greeting(backend: &dyn StorageBackend) -> Result<u64> {
///     let path = Path::new("proj123/hello.txt");
///     let mut writer = backend.writer(path).await?;
///     writer.write_all(b"hello").await.map_err(depot_storage::error::ErrorKind::Io)?;
///     writer.shutdown().await.map_err(depot_storage::error::ErrorKind::Io)?;
///     Ok(backend.stat(path).await?.size)
/// }
/// ```
#[async_trait]
pub trait StorageBackend: Send + Sync {
    /// Name of the configured backend (used for logging only).
    fn name(&self) -> &str;

    /// Check if a file exists.
    async fn exists(&self, path: &Path) -> Result<bool>;

    /// Read file contents.
    ///
    /// Returns [`NotFound`](crate::error::ErrorKind::NotFound) if the file
    /// does not exist.
    async fn read(&self, path: &Path) -> Result<Vec<u8>>;

    /// Open a brand new file for streaming writes.
    ///
    /// # Notes
    /// - Implementations must create parent directories as needed; a
    ///   project's directory comes into existence with its first file.
    /// - The file is created exclusively. If something already lives at
    ///   `path`, [`AlreadyExists`](crate::error::ErrorKind::AlreadyExists) is
    ///   returned and the existing file is left untouched.
    /// - Callers should `shutdown()` the writer once finished so that buffered
    ///   data is flushed and errors are propagated.
    async fn writer(&self, path: &Path) -> Result<BoxAsyncWrite>;

    /// Delete a file.
    ///
    /// Returns [`NotFound`](crate::error::ErrorKind::NotFound) if the file
    /// does not exist.
    async fn delete(&self, path: &Path) -> Result<()>;

    /// Get file metadata without reading contents.
    ///
    /// Returns [`NotFound`](crate::error::ErrorKind::NotFound) if the file
    /// does not exist.
    async fn stat(&self, path: &Path) -> Result<FileInfo>;
}
