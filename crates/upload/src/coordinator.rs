use crate::error::{ErrorKind, Result};
use crate::file::UploadFile;
use crate::outcome::{FileOutcome, Signal, UploadSummary};
use crate::recorder::AssetRecorder;
use crate::task::{TaskContext, upload_file};
use depot_config::UploadConfig;
use depot_storage::BackendHandle;
use depot_store::error::ErrorKind as StoreErrorKind;
use depot_store::{Project, ProjectResolver, Stored};
use exn::ResultExt;
use futures::stream::FuturesUnordered;
use futures::{FutureExt, StreamExt};
use std::fmt;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use tracing::{error, info, instrument};

/// Runs the files of upload requests through the pipeline.
///
/// One `Uploader` is built at startup and shared by every request. Its
/// configuration is a snapshot: nothing here ever changes it.
#[derive(Clone)]
pub struct Uploader {
    backend: BackendHandle,
    resolver: ProjectResolver,
    recorder: AssetRecorder,
    config: Arc<UploadConfig>,
}
impl fmt::Debug for Uploader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Uploader").field("backend", &self.backend.name()).field("config", &self.config).finish()
    }
}
impl Uploader {
    pub fn new(
        backend: BackendHandle,
        resolver: ProjectResolver,
        recorder: AssetRecorder,
        config: Arc<UploadConfig>,
    ) -> Self {
        Self { backend, resolver, recorder, config }
    }

    pub fn config(&self) -> &UploadConfig {
        &self.config
    }

    /// Resolve (or create) the project, then upload every file into it.
    ///
    /// Only fails if the project can't be resolved, in which case no file
    /// has been touched.
    #[instrument(skip(self, files), fields(files = files.len()))]
    pub async fn upload(&self, project_id: &str, files: Vec<UploadFile>) -> Result<UploadSummary> {
        let project = self.resolve(project_id).await?;
        Ok(self.run(&project, files).await)
    }

    /// The project files for `project_id` are uploaded into, created on
    /// first use.
    pub async fn resolve(&self, project_id: &str) -> Result<Stored<Project>> {
        match self.resolver.get_or_create(project_id).await {
            Ok(project) => Ok(project),
            Err(err) if matches!(&*err, StoreErrorKind::MalformedProjectId(_)) => {
                Err(err).or_raise(|| ErrorKind::MalformedProjectId(project_id.to_string()))
            },
            Err(err) => Err(err).or_raise(|| ErrorKind::ProjectStore),
        }
    }

    /// Upload every file into `project`.
    ///
    /// At most `min(upper, max(lower, files))` files are in flight at once;
    /// the next one starts as soon as any finishes. A failing (or panicking)
    /// file never affects its siblings, and outcomes come back in the order
    /// the files were given.
    #[instrument(skip_all, fields(project = %project.project_id, files = files.len()))]
    pub async fn run(&self, project: &Stored<Project>, files: Vec<UploadFile>) -> UploadSummary {
        let total = files.len();
        let limit = self.config.concurrency.limit_for(total);
        let ctx = &TaskContext {
            backend: &self.backend,
            recorder: &self.recorder,
            config: &self.config,
            project,
        };

        let mut pending = files.into_iter().enumerate().map(move |(index, file)| guarded(ctx, index, file));
        let mut processing = FuturesUnordered::new();
        processing.extend(pending.by_ref().take(limit));
        let mut outcomes: Vec<Option<FileOutcome>> = vec![None; total];
        while let Some((index, outcome)) = processing.next().await {
            outcomes[index] = Some(outcome);
            // Pop-n-push, in request order.
            if let Some(next) = pending.next() {
                processing.push(next);
            }
        }

        let summary = UploadSummary::new(outcomes.into_iter().flatten().collect());
        info!(
            uploaded = summary.uploaded(),
            not_uploaded = summary.not_uploaded(),
            persisted = summary.persisted(),
            persist_failed = summary.persist_failed(),
            "upload finished",
        );
        summary
    }
}

/// One file's task, with a panic turned into a failed outcome instead of
/// tearing down every other file in the request.
async fn guarded(ctx: &TaskContext<'_>, index: usize, file: UploadFile) -> (usize, FileOutcome) {
    let filename = file.filename().to_string();
    match AssertUnwindSafe(upload_file(ctx, file)).catch_unwind().await {
        Ok(outcome) => (index, outcome),
        Err(_) => {
            error!(%filename, signal = %Signal::WriteFailed, "upload task panicked");
            (index, FileOutcome::failed(filename, Signal::WriteFailed))
        },
    }
}
