//! Per-file outcomes and the per-request summary built from them.

use depot_store::RecordId;
use serde::ser::SerializeStruct;
use serde::{Serialize, Serializer};
use std::fmt;
use std::path::PathBuf;

/// Why a file (or a whole request) didn't make it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Signal {
    /// The filename had no extension, or one that isn't allowed.
    InvalidExtension,
    /// More bytes arrived than the configured maximum file size.
    FileTooLarge,
    /// The file could not be read from the client or written to storage.
    WriteFailed,
    /// The file is on disk, but its asset record could not be inserted.
    PersistFailed,
    /// The project identifier isn't non-empty ASCII alphanumeric.
    MalformedProjectId,
}
impl Signal {
    /// The identifier clients see in response bodies.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::InvalidExtension => "file_type_not_supported",
            Self::FileTooLarge => "file_size_exceeded",
            Self::WriteFailed => "file_upload_failed",
            Self::PersistFailed => "file_persist_failed",
            Self::MalformedProjectId => "project_id_invalid",
        }
    }
}
impl fmt::Display for Signal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
impl Serialize for Signal {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

/// A file that was written to storage in full.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredFile {
    /// Generated identifier, also the asset name.
    pub file_id: String,
    /// Storage path, relative to the backend root.
    pub path: PathBuf,
    pub bytes: u64,
    /// The asset record, if it could be inserted.
    pub asset: Option<RecordId>,
}

/// What happened to one file of a request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileOutcome {
    /// The filename as the client declared it.
    pub filename: String,
    pub result: Result<StoredFile, Signal>,
}
impl FileOutcome {
    pub fn stored(filename: impl Into<String>, file: StoredFile) -> Self {
        Self { filename: filename.into(), result: Ok(file) }
    }

    pub fn failed(filename: impl Into<String>, signal: Signal) -> Self {
        Self { filename: filename.into(), result: Err(signal) }
    }

    /// Whether the file was written to storage. A missing asset record does
    /// not change this.
    pub fn is_success(&self) -> bool {
        self.result.is_ok()
    }

    /// Whether an asset record exists for this file.
    pub fn is_persisted(&self) -> bool {
        matches!(&self.result, Ok(StoredFile { asset: Some(_), .. }))
    }

    pub fn file_id(&self) -> Option<&str> {
        self.result.as_ref().ok().map(|file| file.file_id.as_str())
    }

    /// The signal reported for this file, if anything went wrong.
    pub fn signal(&self) -> Option<Signal> {
        match &self.result {
            Err(signal) => Some(*signal),
            Ok(StoredFile { asset: None, .. }) => Some(Signal::PersistFailed),
            Ok(_) => None,
        }
    }
}
impl Serialize for FileOutcome {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut detail = serializer.serialize_struct("FileOutcome", 4)?;
        detail.serialize_field("filename", &self.filename)?;
        detail.serialize_field("success", &self.is_success())?;
        detail.serialize_field("file_id", &self.file_id())?;
        detail.serialize_field("error", &self.signal())?;
        detail.end()
    }
}

/// How much of a request was satisfied.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    /// No file was written.
    Failed,
    /// Some files were written, some weren't.
    Partial,
    /// Every file was written.
    Success,
}

/// The aggregated result of one upload request, in request order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadSummary {
    outcomes: Vec<FileOutcome>,
    uploaded: usize,
    persisted: usize,
    persist_failed: usize,
}
impl UploadSummary {
    pub fn new(outcomes: Vec<FileOutcome>) -> Self {
        let uploaded = outcomes.iter().filter(|o| o.is_success()).count();
        let persisted = outcomes.iter().filter(|o| o.is_persisted()).count();
        Self { outcomes, uploaded, persisted, persist_failed: uploaded - persisted }
    }

    pub fn total(&self) -> usize {
        self.outcomes.len()
    }

    /// Files written to storage.
    pub fn uploaded(&self) -> usize {
        self.uploaded
    }

    /// Files rejected or not written.
    pub fn not_uploaded(&self) -> usize {
        self.total() - self.uploaded
    }

    /// Asset records inserted.
    pub fn persisted(&self) -> usize {
        self.persisted
    }

    /// Files written to storage whose asset record could not be inserted.
    pub fn persist_failed(&self) -> usize {
        self.persist_failed
    }

    pub fn outcomes(&self) -> &[FileOutcome] {
        &self.outcomes
    }

    pub fn into_outcomes(self) -> Vec<FileOutcome> {
        self.outcomes
    }

    /// "All failed" wins over "all succeeded", so an empty request counts as
    /// failed.
    pub fn status(&self) -> Status {
        if self.uploaded == 0 {
            Status::Failed
        } else if self.uploaded == self.total() {
            Status::Success
        } else {
            Status::Partial
        }
    }

    /// Top-level signal for the response body.
    pub fn signal(&self) -> &'static str {
        match self.status() {
            Status::Failed => "file_upload_failed",
            Status::Partial | Status::Success => "file_upload_success",
        }
    }
}
impl Serialize for UploadSummary {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut body = serializer.serialize_struct("UploadSummary", 6)?;
        body.serialize_field("signal", self.signal())?;
        body.serialize_field("uploaded_files", &self.uploaded())?;
        body.serialize_field("non_uploaded_files", &self.not_uploaded())?;
        body.serialize_field("inserted_files_db", &self.persisted())?;
        body.serialize_field("non_inserted_files_db", &self.persist_failed())?;
        body.serialize_field("details", &self.outcomes)?;
        body.end()
    }
}
