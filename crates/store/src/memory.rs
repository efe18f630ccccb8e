//! In-memory collections for tests in other crates.

use crate::error::{ErrorKind, Result};
use crate::record::{Collection, Index, Record, RecordId, Stored};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

type InsertFailure<R> = Arc<dyn Fn(&R) -> bool + Send + Sync>;

struct State<R: Record> {
    next_id: i64,
    records: Vec<Stored<R>>,
    by_key: HashMap<R::Key, usize>,
    indexes: Vec<Index>,
}

/// A [`Collection`] kept in memory.
///
/// Behaves like the SQLite one: records only clash once a unique index has
/// been created, and clashes are reported as [`ErrorKind::Duplicate`].
/// Every record type uses its [`Record::key`] as the one uniquely indexed
/// value.
#[derive(Clone)]
pub struct MemoryCollection<R: Record> {
    state: Arc<Mutex<State<R>>>,
    fail_insert: Option<InsertFailure<R>>,
}
impl<R: Record> Default for MemoryCollection<R> {
    fn default() -> Self {
        Self::new()
    }
}
impl<R: Record> MemoryCollection<R> {
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(State {
                next_id: 1,
                records: Vec::new(),
                by_key: HashMap::new(),
                indexes: Vec::new(),
            })),
            fail_insert: None,
        }
    }

    /// Make `insert_one` fail with a database error for every record
    /// `predicate` matches.
    pub fn with_insert_failure(mut self, predicate: impl Fn(&R) -> bool + Send + Sync + 'static) -> Self {
        self.fail_insert = Some(Arc::new(predicate));
        self
    }

    pub fn len(&self) -> usize {
        self.state.lock().map(|s| s.records.len()).unwrap_or_default()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn records(&self) -> Vec<Stored<R>> {
        self.state.lock().map(|s| s.records.clone()).unwrap_or_default()
    }

    /// Names of the indexes created so far.
    pub fn indexes(&self) -> Vec<&'static str> {
        self.state.lock().map(|s| s.indexes.iter().map(|i| i.name).collect()).unwrap_or_default()
    }
}

#[async_trait]
impl<R: Record> Collection<R> for MemoryCollection<R> {
    async fn insert_one(&self, record: &R) -> Result<RecordId> {
        if self.fail_insert.as_ref().is_some_and(|fail| fail(record)) {
            exn::bail!(ErrorKind::Database);
        }
        let Ok(mut state) = self.state.lock() else {
            exn::bail!(ErrorKind::Database);
        };
        let key = record.key();
        let unique = state.indexes.iter().any(|i| i.unique);
        if unique && state.by_key.contains_key(&key) {
            exn::bail!(ErrorKind::Duplicate(R::COLLECTION));
        }
        let id = RecordId(state.next_id);
        state.next_id += 1;
        let position = state.records.len();
        state.records.push(Stored::new(id, record.clone()));
        state.by_key.entry(key).or_insert(position);
        Ok(id)
    }

    async fn find_one(&self, key: &R::Key) -> Result<Option<Stored<R>>> {
        let Ok(state) = self.state.lock() else {
            exn::bail!(ErrorKind::Database);
        };
        Ok(state.by_key.get(key).map(|&position| state.records[position].clone()))
    }

    async fn create_index(&self, index: &Index) -> Result<()> {
        let Ok(mut state) = self.state.lock() else {
            exn::bail!(ErrorKind::Database);
        };
        if !state.indexes.iter().any(|i| i.name == index.name) {
            state.indexes.push(*index);
        }
        Ok(())
    }
}
