//! Store Error Types
//!
//! Structured errors using `exn` for automatic location tracking and error
//! tree construction.

use derive_more::{Display, Error};

/// A store error with automatic location tracking.
pub type Error = exn::Exn<ErrorKind>;
/// Result type alias for store operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Actionable error categories.
///
/// These describe what the caller should *do*, not what went wrong internally.
#[derive(Debug, Display, Error)]
pub enum ErrorKind {
    /// The database could not be reached, or rejected the query.
    #[display("database error")]
    Database,
    #[display("database migration error")]
    Migration,
    /// A unique index rejected the record.
    #[display("duplicate record in {_0}")]
    Duplicate(#[error(not(source))] &'static str),
    /// External project identifiers must be non-empty and ASCII alphanumeric.
    #[display("malformed project id: {_0:?}")]
    MalformedProjectId(#[error(not(source))] String),
    /// A record is missing a required value, or a stored row couldn't be
    /// turned back into a record.
    #[display("invalid record data: {_0}")]
    InvalidData(#[error(not(source))] &'static str),
}

impl ErrorKind {
    /// Returns `true` if retrying might succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Database)
    }
}
