//! Resolve external project identifiers to stored projects.

use crate::error::{ErrorKind, Result};
use crate::models::Project;
use crate::record::{Collection, Record, Stored};
use exn::{OptionExt, ResultExt};
use std::fmt;
use std::sync::Arc;
use tracing::{debug, instrument};

/// Finds the project for an external identifier, creating it the first time
/// the identifier is seen.
#[derive(Clone)]
pub struct ProjectResolver {
    projects: Arc<dyn Collection<Project>>,
}
impl fmt::Debug for ProjectResolver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProjectResolver").finish_non_exhaustive()
    }
}
impl ProjectResolver {
    /// Wrap a project collection, making sure its unique index exists first.
    pub async fn new(projects: Arc<dyn Collection<Project>>) -> Result<Self> {
        for index in Project::indexes() {
            projects.create_index(index).await?;
        }
        Ok(Self { projects })
    }

    /// Return the project with this external identifier, inserting it if it
    /// doesn't exist yet.
    ///
    /// Calling this any number of times (concurrently or not) with the same
    /// identifier yields the same stored project. Fails with
    /// [`ErrorKind::MalformedProjectId`] before touching the store if the
    /// identifier isn't non-empty ASCII alphanumeric.
    #[instrument(skip(self))]
    pub async fn get_or_create(&self, project_id: &str) -> Result<Stored<Project>> {
        let project = Project::new(project_id)?;
        if let Some(found) = self.projects.find_one(&project.project_id).await? {
            return Ok(found);
        }
        match self.projects.insert_one(&project).await {
            Ok(id) => {
                debug!(%id, "created project");
                Ok(Stored::new(id, project))
            },
            // Somebody else created it between our find and insert.
            Err(err) if matches!(&*err, ErrorKind::Duplicate(_)) => self
                .projects
                .find_one(&project.project_id)
                .await
                .or_raise(|| ErrorKind::Database)?
                .ok_or_raise(|| ErrorKind::Database),
            Err(err) => Err(err),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Database;
    use crate::record::{Index, RecordId};
    use async_trait::async_trait;
    use rstest::rstest;
    use std::sync::atomic::{AtomicBool, Ordering};

    async fn resolver(db: &Database) -> ProjectResolver {
        ProjectResolver::new(Arc::new(db.projects())).await.unwrap()
    }

    #[tokio::test]
    async fn test_creates_then_reuses() {
        let db = Database::connect_in_memory().await.unwrap();
        let resolver = resolver(&db).await;
        let first = resolver.get_or_create("proj123").await.unwrap();
        let second = resolver.get_or_create("proj123").await.unwrap();
        assert_eq!(first.id, second.id);
        assert_eq!(second.project_id, "proj123");

        let other = resolver.get_or_create("proj456").await.unwrap();
        assert_ne!(first.id, other.id);
    }

    #[tokio::test]
    async fn test_concurrent_calls_agree() {
        let db = Database::connect_in_memory().await.unwrap();
        let resolver = resolver(&db).await;
        let (a, b, c) = tokio::join!(
            resolver.get_or_create("proj123"),
            resolver.get_or_create("proj123"),
            resolver.get_or_create("proj123"),
        );
        let (a, b, c) = (a.unwrap(), b.unwrap(), c.unwrap());
        assert_eq!(a.id, b.id);
        assert_eq!(b.id, c.id);
    }

    #[rstest]
    #[case("")]
    #[case("proj 123")]
    #[case("proj/../123")]
    #[tokio::test]
    async fn test_malformed_id(#[case] id: &str) {
        let db = Database::connect_in_memory().await.unwrap();
        let err = resolver(&db).await.get_or_create(id).await.unwrap_err();
        assert!(matches!(&*err, ErrorKind::MalformedProjectId(_)));
    }

    /// Pretends another caller inserted the project between `find_one` and
    /// `insert_one`.
    struct Racing {
        inner: crate::SqliteCollection<Project>,
        raced: AtomicBool,
    }
    #[async_trait]
    impl Collection<Project> for Racing {
        async fn insert_one(&self, record: &Project) -> Result<RecordId> {
            if !self.raced.swap(true, Ordering::SeqCst) {
                self.inner.insert_one(record).await?;
            }
            self.inner.insert_one(record).await
        }

        async fn find_one(&self, key: &String) -> Result<Option<Stored<Project>>> {
            self.inner.find_one(key).await
        }

        async fn create_index(&self, index: &Index) -> Result<()> {
            self.inner.create_index(index).await
        }
    }

    #[tokio::test]
    async fn test_lost_race_returns_winner() {
        let db = Database::connect_in_memory().await.unwrap();
        let racing = Racing { inner: db.projects(), raced: AtomicBool::new(false) };
        let resolver = ProjectResolver::new(Arc::new(racing)).await.unwrap();
        let project = resolver.get_or_create("proj123").await.unwrap();
        let again = resolver.get_or_create("proj123").await.unwrap();
        assert_eq!(project.id, again.id);
    }

    #[tokio::test]
    async fn test_store_unavailable() {
        let db = Database::connect_in_memory().await.unwrap();
        let resolver = resolver(&db).await;
        db.close().await;
        let err = resolver.get_or_create("proj123").await.unwrap_err();
        assert!(matches!(&*err, ErrorKind::Database));
    }
}
