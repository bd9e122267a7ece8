//! In-memory student backend for testing.
//!
//! Provides a fast, non-persistent implementation of [`StudentBackend`] for
//! unit tests and embedding scenarios.

use crate::models::{RecordKey, RecordPredicate, RecordSpace, StudentRecord};
use crate::storage::traits::StudentBackend;
use crate::{Error, Result};
use std::collections::HashMap;
use std::sync::RwLock;
use tracing::instrument;

type Space = RwLock<HashMap<RecordKey, StudentRecord>>;

/// In-memory student backend.
///
/// Uses one `RwLock<HashMap>` per record space. Data is not persisted
/// between runs.
#[derive(Debug, Default)]
pub struct InMemoryStudentBackend {
    legacy: Space,
    scoped: Space,
}

impl InMemoryStudentBackend {
    /// Creates a new empty backend.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the number of records in a space.
    #[must_use]
    pub fn len(&self, space: RecordSpace) -> usize {
        self.space(space).read().map(|s| s.len()).unwrap_or(0)
    }

    /// Returns true if both spaces are empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len(RecordSpace::Legacy) == 0 && self.len(RecordSpace::Scoped) == 0
    }

    const fn space(&self, space: RecordSpace) -> &Space {
        match space {
            RecordSpace::Legacy => &self.legacy,
            RecordSpace::Scoped => &self.scoped,
        }
    }
}

fn poisoned(operation: &str) -> Error {
    Error::OperationFailed {
        operation: operation.to_string(),
        cause: "Lock poisoned".to_string(),
    }
}

impl StudentBackend for InMemoryStudentBackend {
    #[instrument(skip(self), fields(operation = "get", backend = "memory", space = %space, key = %key))]
    fn get(&self, space: RecordSpace, key: &RecordKey) -> Result<Option<StudentRecord>> {
        let records = self
            .space(space)
            .read()
            .map_err(|_| poisoned("get_student"))?;
        Ok(records.get(key).cloned())
    }

    #[instrument(skip(self, record), fields(operation = "put", backend = "memory", space = %space))]
    fn put(&self, space: RecordSpace, record: &StudentRecord) -> Result<()> {
        let mut records = self
            .space(space)
            .write()
            .map_err(|_| poisoned("put_student"))?;
        records.insert(RecordKey::for_record(space, record), record.clone());
        Ok(())
    }

    #[instrument(skip(self), fields(operation = "delete", backend = "memory", space = %space, key = %key))]
    fn delete(&self, space: RecordSpace, key: &RecordKey) -> Result<bool> {
        let mut records = self
            .space(space)
            .write()
            .map_err(|_| poisoned("delete_student"))?;
        Ok(records.remove(key).is_some())
    }

    #[instrument(skip(self), fields(operation = "query", backend = "memory", space = %space))]
    fn query(&self, space: RecordSpace, predicate: &RecordPredicate) -> Result<Vec<StudentRecord>> {
        let records = self
            .space(space)
            .read()
            .map_err(|_| poisoned("query_students"))?;
        let mut matched: Vec<StudentRecord> = records
            .values()
            .filter(|r| predicate.matches(r))
            .cloned()
            .collect();
        matched.sort_by(|a, b| (&a.course_id, &a.email).cmp(&(&b.course_id, &b.email)));
        Ok(matched)
    }

    fn count(&self, space: RecordSpace) -> Result<usize> {
        Ok(self.len(space))
    }
}
