//! SQLite pool setup for the metadata store.

use exn::ResultExt;
use sqlx::SqliteConnection;
use sqlx::sqlite::{SqliteAutoVacuum, SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions, SqliteSynchronous};
use std::path::Path;
use std::time::Duration;
use tracing::{debug, instrument};

use crate::error::{ErrorKind, Result};
use crate::models::{Asset, Project};
use crate::sqlite::SqliteCollection;

static MIGRATOR: sqlx::migrate::Migrator = sqlx::migrate!("./migrations");

// A batch of uploads persists one asset per file, plus the odd project.
const POOL_SIZE: u32 = 5;
// Concurrent uploads each insert an asset row, and WAL mode only allows one
// writer at a time.
const BUSY_TIMEOUT: Duration = Duration::from_millis(1500);

/// Per-connection settings not covered by [`SqliteConnectOptions`].
const CONNECTION_PRAGMAS: &str = r#"
    PRAGMA locking_mode = NORMAL;
    PRAGMA wal_autocheckpoint = 800;
    PRAGMA cache_size = -8192;
    PRAGMA temp_store = MEMORY;
    PRAGMA analysis_limit = 1000;
"#;

/// Handle to the metadata database.
///
/// Owns the SQLite pool and hands out typed [`SqliteCollection`]s; nothing
/// outside this crate issues queries directly.
#[derive(Debug, Clone)]
pub struct Database {
    pool: SqlitePool,
}

impl Database {
    /// Open (creating if needed) the database file at `path`, along with
    /// any missing parent directories, and bring its schema up to date.
    #[instrument(skip_all, fields(path = %path.as_ref().display()))]
    pub async fn connect(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).or_raise(|| ErrorKind::Database)?;
        }
        let options = Self::options().filename(path).create_if_missing(true);
        Self::open(options, POOL_SIZE).await
    }

    /// Open a private in-memory database.
    ///
    /// Not gated behind `cfg(test)`: other crates use it in their tests.
    pub async fn connect_in_memory() -> Result<Self> {
        // Every connection to ":memory:" gets its own database, so the pool
        // must never hold more than one.
        Self::open(Self::options().filename(":memory:"), 1).await
    }

    async fn open(options: SqliteConnectOptions, pool_size: u32) -> Result<Self> {
        let pool = SqlitePoolOptions::new()
            // Runs for every connection the pool opens, not just the first.
            .after_connect(|conn, _meta| Box::pin(async move { Self::configure(conn).await }))
            .max_connections(pool_size)
            .connect_with(options)
            .await
            .or_raise(|| ErrorKind::Database)?;
        let db = Self { pool };
        db.migrate().await?;
        Ok(db)
    }

    fn options() -> SqliteConnectOptions {
        SqliteConnectOptions::new()
            .journal_mode(SqliteJournalMode::Wal)
            .foreign_keys(true)
            .synchronous(SqliteSynchronous::Normal)
            .busy_timeout(BUSY_TIMEOUT)
            .auto_vacuum(SqliteAutoVacuum::None)
    }

    async fn configure(conn: &mut SqliteConnection) -> sqlx::Result<()> {
        sqlx::query(CONNECTION_PRAGMAS).execute(conn).await?;
        Ok(())
    }

    #[instrument(skip(self))]
    async fn migrate(&self) -> Result<()> {
        MIGRATOR.run(&self.pool).await.or_raise(|| ErrorKind::Migration)?;
        debug!("schema up to date");
        Ok(())
    }

    pub(crate) fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// The collection of projects.
    pub fn projects(&self) -> SqliteCollection<Project> {
        SqliteCollection::new(self.pool.clone())
    }

    /// The collection of asset (file metadata) records.
    pub fn assets(&self) -> SqliteCollection<Asset> {
        SqliteCollection::new(self.pool.clone())
    }

    /// Wait for checked-out connections to come back, then close the pool.
    /// Collections handed out earlier fail with [`ErrorKind::Database`]
    /// afterwards.
    pub async fn close(&self) {
        _ = sqlx::query("PRAGMA optimize").execute(&self.pool).await;
        self.pool.close().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_in_memory_is_open_until_closed() {
        let db = Database::connect_in_memory().await.unwrap();
        assert!(!db.pool().is_closed());
        db.close().await;
        assert!(db.pool().is_closed());
    }

    #[tokio::test]
    async fn test_migrating_twice() {
        let db = Database::connect_in_memory().await.unwrap();
        db.migrate().await.unwrap();
        let tables: Vec<(String,)> =
            sqlx::query_as("SELECT name FROM sqlite_master WHERE type = 'table' AND name IN ('projects', 'assets') ORDER BY name")
                .fetch_all(db.pool())
                .await
                .unwrap();
        assert_eq!(tables, vec![("assets".to_string(),), ("projects".to_string(),)]);
        db.close().await;
    }

    #[tokio::test]
    async fn test_connection_settings() {
        let db = Database::connect_in_memory().await.unwrap();
        let (foreign_keys,): (i64,) = sqlx::query_as("PRAGMA foreign_keys").fetch_one(db.pool()).await.unwrap();
        assert_eq!(foreign_keys, 1);
        let (checkpoint,): (i64,) = sqlx::query_as("PRAGMA wal_autocheckpoint").fetch_one(db.pool()).await.unwrap();
        assert_eq!(checkpoint, 800);
        db.close().await;
    }

    #[tokio::test]
    async fn test_connect_creates_parent_directory() {
        let temp = tempfile::tempdir().unwrap();
        let path = temp.path().join("nested/dir/depot.sqlite3");
        let db = Database::connect(&path).await.unwrap();
        assert!(path.exists());
        db.close().await;
    }
}
