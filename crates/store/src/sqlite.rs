//! SQLite-backed collections.

use crate::error::{ErrorKind, Result};
use crate::models::{Asset, AssetRow, Project, ProjectRow};
use crate::record::{Collection, Index, Record, RecordId, Stored};
use async_trait::async_trait;
use exn::ResultExt;
use sqlx::SqlitePool;
use std::fmt;
use std::marker::PhantomData;
use tracing::instrument;

/// A [`Collection`] stored as one SQLite table, named after
/// [`Record::COLLECTION`].
///
/// Obtain one from [`Database::projects`](crate::Database::projects) or
/// [`Database::assets`](crate::Database::assets).
pub struct SqliteCollection<R> {
    pool: SqlitePool,
    _record: PhantomData<fn() -> R>,
}
impl<R> SqliteCollection<R> {
    pub(crate) fn new(pool: SqlitePool) -> Self {
        Self { pool, _record: PhantomData }
    }
}
impl<R> Clone for SqliteCollection<R> {
    fn clone(&self) -> Self {
        Self::new(self.pool.clone())
    }
}
impl<R: Record> fmt::Debug for SqliteCollection<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SqliteCollection").field("collection", &R::COLLECTION).finish()
    }
}

/// Unique index violations become [`ErrorKind::Duplicate`], everything else
/// is a database error.
fn raise_insert<T>(result: sqlx::Result<T>, collection: &'static str) -> Result<T> {
    let duplicate = matches!(&result, Err(sqlx::Error::Database(db)) if db.is_unique_violation());
    result.or_raise(|| match duplicate {
        true => ErrorKind::Duplicate(collection),
        false => ErrorKind::Database,
    })
}

fn is_identifier(name: &str) -> bool {
    !name.is_empty() && name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
}

async fn create_index(pool: &SqlitePool, table: &'static str, index: &Index) -> Result<()> {
    if !is_identifier(index.name) || index.fields.is_empty() || !index.fields.iter().all(|f| is_identifier(f)) {
        exn::bail!(ErrorKind::InvalidData("index definition"));
    }
    let sql = format!(
        "CREATE {unique}INDEX IF NOT EXISTS {name} ON {table} ({fields})",
        unique = if index.unique { "UNIQUE " } else { "" },
        name = index.name,
        fields = index.fields.join(", "),
    );
    sqlx::query(&sql).execute(pool).await.or_raise(|| ErrorKind::Database)?;
    Ok(())
}

#[async_trait]
impl Collection<Project> for SqliteCollection<Project> {
    #[instrument(skip_all, fields(project_id = %record.project_id))]
    async fn insert_one(&self, record: &Project) -> Result<RecordId> {
        let result = sqlx::query(include_str!("../queries/insert_project.sql"))
            .bind(&record.project_id)
            .execute(&self.pool)
            .await;
        Ok(RecordId(raise_insert(result, Project::COLLECTION)?.last_insert_rowid()))
    }

    async fn find_one(&self, key: &String) -> Result<Option<Stored<Project>>> {
        let row: Option<ProjectRow> = sqlx::query_as(include_str!("../queries/find_project.sql"))
            .bind(key)
            .fetch_optional(&self.pool)
            .await
            .or_raise(|| ErrorKind::Database)?;
        row.map(Stored::try_from).transpose()
    }

    async fn create_index(&self, index: &Index) -> Result<()> {
        create_index(&self.pool, Project::COLLECTION, index).await
    }
}

#[async_trait]
impl Collection<Asset> for SqliteCollection<Asset> {
    #[instrument(skip_all, fields(project = %record.project, name = %record.name))]
    async fn insert_one(&self, record: &Asset) -> Result<RecordId> {
        let row = AssetRow::try_from(record)?;
        let result = sqlx::query(include_str!("../queries/insert_asset.sql"))
            .bind(row.asset_project_id)
            .bind(row.asset_type)
            .bind(row.asset_name)
            .bind(row.asset_size)
            .bind(row.asset_config)
            .bind(row.asset_pushed_at)
            .execute(&self.pool)
            .await;
        Ok(RecordId(raise_insert(result, Asset::COLLECTION)?.last_insert_rowid()))
    }

    async fn find_one(&self, key: &(RecordId, String)) -> Result<Option<Stored<Asset>>> {
        let (project, name) = key;
        let row: Option<AssetRow> = sqlx::query_as(include_str!("../queries/find_asset.sql"))
            .bind(project.0)
            .bind(name)
            .fetch_optional(&self.pool)
            .await
            .or_raise(|| ErrorKind::Database)?;
        row.map(Stored::try_from).transpose()
    }

    async fn create_index(&self, index: &Index) -> Result<()> {
        create_index(&self.pool, Asset::COLLECTION, index).await
    }
}
