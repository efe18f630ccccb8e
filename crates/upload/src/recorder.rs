use crate::error::{ErrorKind, Result};
use depot_store::{Asset, Collection, Record, RecordId};
use exn::ResultExt;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, instrument};

/// Persists one asset record per stored file.
///
/// Failures stay with the file they belong to: a rejected insert (including
/// a duplicate name) is reported to the caller and never retried.
#[derive(Clone)]
pub struct AssetRecorder {
    assets: Arc<dyn Collection<Asset>>,
}
impl fmt::Debug for AssetRecorder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AssetRecorder").finish_non_exhaustive()
    }
}
impl AssetRecorder {
    /// Wrap an asset collection, making sure its unique index exists first.
    pub async fn new(assets: Arc<dyn Collection<Asset>>) -> depot_store::error::Result<Self> {
        for index in Asset::indexes() {
            assets.create_index(index).await?;
        }
        Ok(Self { assets })
    }

    /// Record a file of `size` bytes stored as `file_id` for `project`.
    #[instrument(skip(self))]
    pub async fn record(&self, project: RecordId, file_id: &str, size: u64) -> Result<RecordId> {
        let asset = Asset::file(project, file_id, size).or_raise(|| ErrorKind::Persist)?;
        let id = self.assets.insert_one(&asset).await.or_raise(|| ErrorKind::Persist)?;
        debug!(%id, "recorded asset");
        Ok(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use depot_store::{Database, MemoryCollection, Project};

    #[tokio::test]
    async fn test_creates_index() {
        let assets = MemoryCollection::<Asset>::new();
        AssetRecorder::new(Arc::new(assets.clone())).await.unwrap();
        assert_eq!(assets.indexes(), vec!["asset_project_id_name_index_1"]);
    }

    #[tokio::test]
    async fn test_record() {
        let assets = MemoryCollection::<Asset>::new();
        let recorder = AssetRecorder::new(Arc::new(assets.clone())).await.unwrap();
        recorder.record(RecordId(1), "abc_notes.txt", 500).await.unwrap();
        let stored = assets.records();
        assert_eq!(stored.len(), 1);
        assert_eq!(stored[0].name, "abc_notes.txt");
        assert_eq!(stored[0].size, Some(500));
        assert_eq!(stored[0].project, RecordId(1));
    }

    #[tokio::test]
    async fn test_duplicate_is_a_local_failure() {
        let db = Database::connect_in_memory().await.unwrap();
        let project = db.projects().insert_one(&Project::new("proj123").unwrap()).await.unwrap();
        let recorder = AssetRecorder::new(Arc::new(db.assets())).await.unwrap();
        recorder.record(project, "abc_notes.txt", 500).await.unwrap();
        let err = recorder.record(project, "abc_notes.txt", 500).await.unwrap_err();
        assert!(matches!(&*err, ErrorKind::Persist));
        // Same name, different project, is fine.
        let other = db.projects().insert_one(&Project::new("proj456").unwrap()).await.unwrap();
        recorder.record(other, "abc_notes.txt", 500).await.unwrap();
        db.close().await;
    }
}
