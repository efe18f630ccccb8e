//! Application state shared across handlers.

use depot_upload::Uploader;
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
    pub uploader: Arc<Uploader>,
    /// Largest request body accepted, in bytes.
    pub max_request_size: usize,
}
impl AppState {
    pub fn new(uploader: Uploader, max_request_size: usize) -> Self {
        Self { uploader: Arc::new(uploader), max_request_size }
    }
}
