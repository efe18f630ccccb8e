//! API error types.

use axum::Json;
use axum::extract::multipart::MultipartError;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use depot_upload::error::{Error as UploadError, ErrorKind as UploadErrorKind};
use derive_more::{Display, Error};
use serde::Serialize;

/// Body of every request-level error response.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    /// Identifier for programmatic handling.
    pub signal: &'static str,
    /// Human-readable error message.
    pub message: String,
}

/// Failures that abort a whole request before any file is processed.
///
/// Anything that goes wrong with an individual file is reported in that
/// file's entry of a normal upload response instead.
#[derive(Debug, Display, Error)]
pub enum ApiError {
    #[display("project id must be non-empty and alphanumeric, got {_0:?}")]
    ProjectIdInvalid(#[error(not(source))] String),
    #[display("project store is unavailable")]
    DatabaseUnavailable,
    #[display("malformed multipart body: {_0}")]
    MultipartInvalid(#[error(not(source))] String),
    #[display("no files provided")]
    NoFilesProvided,
}

impl ApiError {
    pub fn signal(&self) -> &'static str {
        match self {
            Self::ProjectIdInvalid(_) => "project_id_invalid",
            Self::DatabaseUnavailable => "database_unavailable",
            Self::MultipartInvalid(_) => "multipart_invalid",
            Self::NoFilesProvided => "no_files_provided",
        }
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::DatabaseUnavailable => StatusCode::INTERNAL_SERVER_ERROR,
            Self::ProjectIdInvalid(_) | Self::MultipartInvalid(_) | Self::NoFilesProvided => StatusCode::BAD_REQUEST,
        }
    }
}

impl From<UploadError> for ApiError {
    fn from(err: UploadError) -> Self {
        match &*err {
            UploadErrorKind::MalformedProjectId(id) => Self::ProjectIdInvalid(id.clone()),
            _ => {
                tracing::error!("request aborted: {err:?}");
                Self::DatabaseUnavailable
            },
        }
    }
}

impl From<MultipartError> for ApiError {
    fn from(err: MultipartError) -> Self {
        Self::MultipartInvalid(err.body_text())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = ErrorResponse { signal: self.signal(), message: self.to_string() };
        (self.status_code(), Json(body)).into_response()
    }
}

/// Result type for API handlers.
pub type ApiResult<T> = std::result::Result<T, ApiError>;
