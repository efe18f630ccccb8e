use crate::error::{Error, ErrorKind, Result};
use crate::record::{Index, Record, RecordId, Stored};

/// A project that files are uploaded into.
///
/// Identified externally by `project_id`, a non-empty ASCII alphanumeric
/// string chosen by the client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Project {
    pub project_id: String,
}
impl Project {
    /// Build a project record, rejecting malformed identifiers.
    pub fn new(project_id: impl Into<String>) -> Result<Self> {
        let project_id = project_id.into();
        if project_id.is_empty() || !project_id.chars().all(|c| c.is_ascii_alphanumeric()) {
            exn::bail!(ErrorKind::MalformedProjectId(project_id));
        }
        Ok(Self { project_id })
    }
}
impl Record for Project {
    type Key = String;
    const COLLECTION: &'static str = "projects";

    fn key(&self) -> String {
        self.project_id.clone()
    }

    fn indexes() -> &'static [Index] {
        &[Index {
            name: "project_id_index_1",
            fields: &["project_id"],
            unique: true,
        }]
    }
}

#[derive(sqlx::FromRow)]
pub(crate) struct ProjectRow {
    id: i64,
    project_id: String,
}
impl TryFrom<ProjectRow> for Stored<Project> {
    type Error = Error;
    fn try_from(row: ProjectRow) -> std::result::Result<Self, Self::Error> {
        Ok(Stored::new(RecordId(row.id), Project::new(row.project_id)?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("proj123")]
    #[case("A")]
    #[case("0042")]
    fn test_valid_project_ids(#[case] id: &str) {
        assert_eq!(Project::new(id).unwrap().project_id, id);
    }

    #[rstest]
    #[case("")]
    #[case("proj 123")]
    #[case("proj-123")]
    #[case("../etc")]
    #[case("proj/123")]
    #[case("prøj")]
    fn test_malformed_project_ids(#[case] id: &str) {
        let err = Project::new(id).unwrap_err();
        assert!(matches!(&*err, ErrorKind::MalformedProjectId(_)));
    }
}
