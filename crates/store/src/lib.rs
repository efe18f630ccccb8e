//! Document store for upload metadata.
//!
//! Two record types live here:
//! - **Projects**: one per external project identifier, created lazily the
//!   first time anything is uploaded for it.
//! - **Assets**: one per file written to disk, referencing its project. The
//!   `(project, asset name)` pair is unique.
//!
//! Callers never see a database handle. They get a [`Collection`] for the
//! record type they care about, which can do exactly three things: insert a
//! record, find one by its unique key, and create an index.

mod db;
pub mod error;
#[cfg(feature = "mock")]
mod memory;
mod models;
mod projects;
mod record;
mod sqlite;

pub use crate::db::Database;
#[cfg(feature = "mock")]
pub use crate::memory::MemoryCollection;
pub use crate::models::{Asset, AssetType, Project};
pub use crate::projects::ProjectResolver;
pub use crate::record::{Collection, Index, Record, RecordId, Stored};
pub use crate::sqlite::SqliteCollection;
