//! Storage backends for uploaded files.
//!
//! Everything in here deals in paths relative to a backend root. The upload
//! pipeline only ever asks for three things: an exclusive writer for a freshly
//! generated path, a way to delete a partial file after a rejected upload, and
//! (mostly in tests) a way to look at what ended up on disk.

pub mod backend;
pub mod error;
mod file;
mod path;

pub use crate::backend::StorageBackend;
pub use crate::file::FileInfo;
pub use crate::path::validate as validate_path;
use std::sync::Arc;

pub type BackendHandle = Arc<dyn StorageBackend + Send + Sync>;
