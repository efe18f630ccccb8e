//! HTTP request handlers.

use crate::error::{ApiError, ApiResult};
use crate::spool::spool;
use crate::state::AppState;
use axum::Json;
use axum::extract::{Multipart, Path, State};
use axum::http::StatusCode;
use depot_upload::Status;
use serde::Serialize;
use tracing::{info, instrument};

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
}

pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse { status: "ok" })
}

/// Upload every file part of a multipart body into a project.
///
/// The project is resolved first: a malformed identifier or an unreachable
/// store fails the request before any file is read. Parts without a
/// filename are ignored.
#[instrument(skip(state, multipart))]
pub async fn upload_files(
    State(state): State<AppState>,
    Path(project_id): Path<String>,
    mut multipart: Multipart,
) -> ApiResult<(StatusCode, Json<depot_upload::UploadSummary>)> {
    let project = state.uploader.resolve(&project_id).await?;

    let mut files = Vec::new();
    while let Some(field) = multipart.next_field().await? {
        if field.file_name().is_none() {
            continue;
        }
        files.push(spool(field, state.uploader.config()).await?);
    }
    if files.is_empty() {
        return Err(ApiError::NoFilesProvided);
    }
    info!(files = files.len(), "received upload");

    let summary = state.uploader.run(&project, files).await;
    let status = match summary.status() {
        Status::Failed => StatusCode::BAD_REQUEST,
        Status::Partial => StatusCode::MULTI_STATUS,
        Status::Success => StatusCode::OK,
    };
    Ok((status, Json(summary)))
}
