use crate::error::Result;
use async_trait::async_trait;
use serde::Serialize;
use std::fmt::{self, Debug, Display};
use std::hash::Hash;
use std::ops::Deref;

/// Identity assigned to a record by the store when it is inserted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct RecordId(pub i64);
impl Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        Display::fmt(&self.0, f)
    }
}

/// An index a record type expects its collection to have.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Index {
    pub name: &'static str,
    pub fields: &'static [&'static str],
    pub unique: bool,
}

/// A type that can be stored in a [`Collection`].
pub trait Record: Clone + Send + Sync + 'static {
    /// The value that uniquely identifies a record, mirroring its unique index.
    type Key: Clone + Eq + Hash + Debug + Send + Sync;

    /// Name of the collection (table) records are stored in.
    const COLLECTION: &'static str;

    fn key(&self) -> Self::Key;

    /// Indexes to create before the collection is used.
    fn indexes() -> &'static [Index];
}

/// A record together with the identity the store gave it.
///
/// Dereferences to the record itself.
#[derive(Debug, Clone, PartialEq)]
pub struct Stored<R> {
    pub id: RecordId,
    record: R,
}
impl<R> Stored<R> {
    pub fn new(id: RecordId, record: R) -> Self {
        Self { id, record }
    }

    pub fn into_inner(self) -> R {
        self.record
    }
}
impl<R> Deref for Stored<R> {
    type Target = R;
    fn deref(&self) -> &R {
        &self.record
    }
}

/// Capability to persist and look up records of one type.
///
/// Implementations must enforce every unique index that has been created
/// through [`create_index`](Self::create_index), reporting violations as
/// [`Duplicate`](crate::error::ErrorKind::Duplicate). That is the only
/// concurrency guarantee callers rely on.
#[async_trait]
pub trait Collection<R: Record>: Send + Sync {
    async fn insert_one(&self, record: &R) -> Result<RecordId>;

    async fn find_one(&self, key: &R::Key) -> Result<Option<Stored<R>>>;

    /// Create `index` if it doesn't exist yet. Idempotent.
    async fn create_index(&self, index: &Index) -> Result<()>;
}
