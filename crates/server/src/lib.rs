//! HTTP surface of the upload pipeline.

pub mod error;
mod handlers;
mod routes;
mod spool;
mod state;

pub use crate::routes::create_router;
pub use crate::state::AppState;
