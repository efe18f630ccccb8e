//! Route configuration.

use crate::handlers;
use crate::state::AppState;
use axum::Router;
use axum::extract::DefaultBodyLimit;
use axum::routing::{get, post};
use tower_http::trace::TraceLayer;

/// Create the application router.
pub fn create_router(state: AppState) -> Router {
    let upload = post(handlers::upload_files).layer(DefaultBodyLimit::max(state.max_request_size));
    Router::new()
        .route("/health", get(handlers::health))
        .route("/api/v1/data/upload/{project_id}", upload.clone())
        .route("/projects/{project_id}/files", upload)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
