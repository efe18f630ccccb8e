//! Upload Error Types
//!
//! Structured errors using `exn` for automatic location tracking and error
//! tree construction.
//!
//! Only request-level failures ever reach a caller as an [`Error`]. Per-file
//! failures are raised inside a single file's task like any other error, then
//! flattened into a [`Signal`] on that file's outcome at the task boundary.

use crate::outcome::Signal;
use derive_more::{Display, Error};

/// An upload error with automatic location tracking.
pub type Error = exn::Exn<ErrorKind>;
/// Result type alias for upload operations.
pub type Result<T> = std::result::Result<T, Error>;

/// ### Request-level
/// - [`ErrorKind::MalformedProjectId`]
/// - [`ErrorKind::ProjectStore`]
///
/// ### Per-file
/// - [`ErrorKind::InvalidExtension`]
/// - [`ErrorKind::TooLarge`]
/// - [`ErrorKind::Read`]
/// - [`ErrorKind::Storage`]
/// - [`ErrorKind::Persist`]
#[derive(Debug, Display, Error)]
pub enum ErrorKind {
    /// The external project identifier isn't non-empty ASCII alphanumeric.
    #[display("malformed project id: {_0:?}")]
    MalformedProjectId(#[error(not(source))] String),
    /// The project could not be looked up or created.
    #[display("project store unavailable")]
    ProjectStore,
    /// Missing or disallowed file extension.
    #[display("file type not supported")]
    InvalidExtension,
    /// More than this many bytes were read from the file.
    #[display("file exceeds {_0} bytes")]
    TooLarge(#[error(not(source))] u64),
    /// The client's byte stream broke off.
    #[display("failed to read uploaded file")]
    Read,
    /// The storage backend could not open, write or close the destination.
    #[display("failed to write file to storage")]
    Storage,
    /// The asset record could not be inserted.
    #[display("failed to record asset")]
    Persist,
}

impl ErrorKind {
    /// Returns `true` if retrying might succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::ProjectStore | Self::Read | Self::Storage | Self::Persist)
    }

    /// The signal reported to the client for this failure.
    pub fn signal(&self) -> Signal {
        match self {
            Self::MalformedProjectId(_) => Signal::MalformedProjectId,
            Self::InvalidExtension => Signal::InvalidExtension,
            Self::TooLarge(_) => Signal::FileTooLarge,
            Self::ProjectStore | Self::Read | Self::Storage => Signal::WriteFailed,
            Self::Persist => Signal::PersistFailed,
        }
    }
}
