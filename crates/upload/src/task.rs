//! Everything that happens to a single file: validate, name, write, record.

use crate::error::{ErrorKind, Result};
use crate::file::UploadFile;
use crate::naming::{Destination, destination};
use crate::outcome::{FileOutcome, StoredFile};
use crate::recorder::AssetRecorder;
use crate::validate::{MeteredReader, check_extension};
use depot_config::UploadConfig;
use depot_storage::BackendHandle;
use depot_storage::error::ErrorKind as StorageErrorKind;
use depot_store::{Project, Stored};
use exn::ResultExt;
use std::path::Path;
use tokio::io::AsyncWriteExt;
use tracing::{error, info, instrument, warn};

/// What a single file's task needs besides the file itself.
pub(crate) struct TaskContext<'a> {
    pub(crate) backend: &'a BackendHandle,
    pub(crate) recorder: &'a AssetRecorder,
    pub(crate) config: &'a UploadConfig,
    pub(crate) project: &'a Stored<Project>,
}

/// Process one file to completion. Never fails: every problem ends up as a
/// signal on the returned outcome.
#[instrument(skip_all, fields(filename = %file.filename()))]
pub(crate) async fn upload_file(ctx: &TaskContext<'_>, file: UploadFile) -> FileOutcome {
    let filename = file.filename().to_string();
    if let Err(err) = check_extension(&filename, ctx.config) {
        warn!(signal = %err.signal(), "rejected upload");
        return FileOutcome::failed(filename, err.signal());
    }

    let Destination { file_id, path } = destination(&ctx.project.project_id, &filename);
    let bytes = match write(ctx, &path, file).await {
        Ok(bytes) => bytes,
        Err(err) => {
            match &*err {
                ErrorKind::TooLarge(max) => warn!(%file_id, max, signal = %err.signal(), "rejected upload"),
                _ => error!(%file_id, signal = %err.signal(), "upload failed: {err:?}"),
            }
            return FileOutcome::failed(filename, err.signal());
        },
    };
    info!(%file_id, bytes, "stored upload");

    let asset = match ctx.recorder.record(ctx.project.id, &file_id, bytes).await {
        Ok(id) => Some(id),
        // The file stays where it is, without an asset record.
        Err(err) => {
            error!(%file_id, signal = %err.signal(), "asset not recorded: {err:?}");
            None
        },
    };
    FileOutcome::stored(filename, StoredFile { file_id, path, bytes, asset })
}

/// Stream `file` into a brand new file at `path`, enforcing the size limit on
/// every chunk. Whatever was written is deleted if this fails.
async fn write(ctx: &TaskContext<'_>, path: &Path, file: UploadFile) -> Result<u64> {
    let mut writer = ctx.backend.writer(path).await.or_raise(|| ErrorKind::Storage)?;
    let mut reader = MeteredReader::new(file, ctx.config);
    let copied: Result<u64> = async {
        while let Some(chunk) = reader.next_chunk().await? {
            writer.write_all(chunk).await.or_raise(|| ErrorKind::Storage)?;
        }
        writer.shutdown().await.or_raise(|| ErrorKind::Storage)?;
        Ok(reader.total())
    }
    .await;
    // Closed on every path, before anything tries to delete it.
    drop(writer);
    if copied.is_err() {
        discard(ctx.backend, path).await;
    }
    copied
}

async fn discard(backend: &BackendHandle, path: &Path) {
    match backend.delete(path).await {
        Ok(()) => {},
        Err(err) if matches!(&*err, StorageErrorKind::NotFound(_)) => {},
        Err(err) => error!(path = %path.display(), "failed to remove partial upload: {err:?}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::outcome::Signal;
    use depot_storage::StorageBackend;
    use depot_storage::backend::MockBackend;
    use depot_store::{Asset, MemoryCollection, RecordId};
    use std::sync::Arc;

    struct Fixture {
        backend: Arc<MockBackend>,
        handle: BackendHandle,
        assets: MemoryCollection<Asset>,
        recorder: AssetRecorder,
        config: UploadConfig,
        project: Stored<Project>,
    }
    impl Fixture {
        async fn new(backend: MockBackend, assets: MemoryCollection<Asset>) -> Self {
            let backend = Arc::new(backend);
            let recorder = AssetRecorder::new(Arc::new(assets.clone())).await.unwrap();
            Self {
                handle: backend.clone(),
                backend,
                assets,
                recorder,
                config: UploadConfig { max_file_size: 1000, chunk_size: 64, ..UploadConfig::default() },
                project: Stored::new(RecordId(1), Project::new("proj123").unwrap()),
            }
        }

        async fn upload(&self, file: UploadFile) -> FileOutcome {
            let ctx = TaskContext {
                backend: &self.handle,
                recorder: &self.recorder,
                config: &self.config,
                project: &self.project,
            };
            upload_file(&ctx, file).await
        }
    }

    #[tokio::test]
    async fn test_stores_and_records() {
        let fx = Fixture::new(MockBackend::default(), MemoryCollection::new()).await;
        let outcome = fx.upload(UploadFile::from_bytes("docs/a.txt", vec![b'a'; 500])).await;
        let stored = outcome.result.as_ref().unwrap();
        assert_eq!(stored.bytes, 500);
        assert!(stored.file_id.ends_with("_a.txt"));
        assert_eq!(stored.path, Path::new("proj123").join(&stored.file_id));
        assert_eq!(fx.backend.read(&stored.path).await.unwrap(), vec![b'a'; 500]);
        assert_eq!(fx.assets.records()[0].name, stored.file_id);
        assert!(outcome.is_persisted());
        assert_eq!(outcome.filename, "docs/a.txt");
    }

    #[tokio::test]
    async fn test_invalid_extension_writes_nothing() {
        let fx = Fixture::new(MockBackend::default(), MemoryCollection::new()).await;
        let outcome = fx.upload(UploadFile::from_bytes("b.exe", vec![0; 10])).await;
        assert_eq!(outcome.result, Err(Signal::InvalidExtension));
        assert!(fx.backend.is_empty());
        assert!(fx.assets.is_empty());
        assert_eq!(fx.backend.peak_writers(), 0);
    }

    #[tokio::test]
    async fn test_too_large_is_removed() {
        let fx = Fixture::new(MockBackend::default(), MemoryCollection::new()).await;
        let outcome = fx.upload(UploadFile::from_bytes("c.txt", vec![0; 1001])).await;
        assert_eq!(outcome.result, Err(Signal::FileTooLarge));
        assert!(fx.backend.is_empty());
        assert!(fx.assets.is_empty());
        assert_eq!(fx.backend.open_writers(), 0);
    }

    #[tokio::test]
    async fn test_write_failure_is_removed() {
        let fx = Fixture::new(MockBackend::default().fail_writes_matching("broken"), MemoryCollection::new()).await;
        let outcome = fx.upload(UploadFile::from_bytes("broken.txt", vec![0; 10])).await;
        assert_eq!(outcome.result, Err(Signal::WriteFailed));
        assert!(fx.backend.is_empty());
        assert_eq!(fx.backend.open_writers(), 0);
    }

    #[tokio::test]
    async fn test_persist_failure_keeps_file() {
        let assets = MemoryCollection::new().with_insert_failure(|_: &Asset| true);
        let fx = Fixture::new(MockBackend::default(), assets).await;
        let outcome = fx.upload(UploadFile::from_bytes("a.txt", vec![0; 10])).await;
        assert!(outcome.is_success());
        assert!(!outcome.is_persisted());
        assert_eq!(outcome.signal(), Some(Signal::PersistFailed));
        assert_eq!(fx.backend.len(), 1);
    }

    #[tokio::test]
    async fn test_empty_file() {
        let fx = Fixture::new(MockBackend::default(), MemoryCollection::new()).await;
        let outcome = fx.upload(UploadFile::from_bytes("empty.txt", Vec::new())).await;
        assert_eq!(outcome.result.as_ref().unwrap().bytes, 0);
        assert!(outcome.is_persisted());
    }
}
