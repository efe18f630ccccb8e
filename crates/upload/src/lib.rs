//! The upload pipeline.
//!
//! Every file of a request goes through the same steps, concurrently with
//! its siblings:
//!
//! 1. Its declared extension is checked against the allowed set, before a
//!    single byte is read.
//! 2. A fresh destination is generated inside the project's directory.
//! 3. Its content is streamed to storage in chunks, counted as it goes, and
//!    abandoned (then deleted) the moment it passes the size limit.
//! 4. An asset record is inserted for it.
//!
//! Each step can fail for that file alone. The [`Uploader`] collects one
//! [`FileOutcome`] per file, in request order, into an [`UploadSummary`].

mod coordinator;
pub mod error;
mod file;
pub mod naming;
mod outcome;
mod recorder;
mod task;
pub mod validate;

pub use crate::coordinator::Uploader;
pub use crate::file::{ByteStream, UploadFile};
pub use crate::outcome::{FileOutcome, Signal, Status, StoredFile, UploadSummary};
pub use crate::recorder::AssetRecorder;
