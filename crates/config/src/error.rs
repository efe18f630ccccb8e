//! Config Error Types
//!
//! Structured errors using `exn` for automatic location tracking and error
//! tree construction.

use derive_more::{Display, Error};
use std::path::PathBuf;

/// A configuration error with automatic location tracking.
pub type Error = exn::Exn<ErrorKind>;
/// Result type alias for configuration operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Actionable error categories.
///
/// Neither is retryable: configuration is read once, at startup, and a bad
/// value has to be fixed by whoever deployed the service.
#[derive(Debug, Display, Error)]
pub enum ErrorKind {
    /// The configuration sources could not be read or merged.
    #[display("could not load configuration")]
    Load,
    /// An explicitly requested configuration file does not exist, or has an
    /// extension that doesn't name a supported format.
    #[display("unusable configuration file: {}", _0.display())]
    File(#[error(not(source))] PathBuf),
    /// The configuration was loaded but describes something that can't work.
    #[display("invalid configuration: {_0}")]
    Invalid(#[error(not(source))] String),
}

impl ErrorKind {
    /// Returns `true` if retrying might succeed.
    pub fn is_retryable(&self) -> bool {
        false
    }
}
