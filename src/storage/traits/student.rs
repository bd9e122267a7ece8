//! Student record backend trait.
//!
//! The backend is the persistent store adapter: plain get/put/delete/query
//! primitives over the two record spaces. It knows nothing about fallback
//! order, uniqueness or migration; those live in
//! [`StudentStore`](crate::services::StudentStore).
//!
//! # Atomicity
//!
//! Each call against one space is assumed atomic. Nothing spans calls, so a
//! sequence such as "put into scoped, then delete from legacy" can be
//! observed half-done by a concurrent reader or left half-done by a crash.

use crate::Result;
use crate::models::{RecordKey, RecordPredicate, RecordSpace, StudentRecord};
use std::sync::Arc;

/// Trait for student record storage backends.
///
/// # Implementor Notes
///
/// - Methods use `&self` to enable sharing via `Arc<dyn StudentBackend>`
/// - Use interior mutability (e.g., `Mutex<Connection>`) for mutable state
/// - `put` inserts or replaces the record stored under
///   [`RecordKey::for_record`] in that space
/// - `delete` of a missing key returns `Ok(false)`, never an error
pub trait StudentBackend: Send + Sync {
    /// Retrieves the record stored under `key` in `space`.
    fn get(&self, space: RecordSpace, key: &RecordKey) -> Result<Option<StudentRecord>>;

    /// Inserts or replaces a record in `space`.
    fn put(&self, space: RecordSpace, record: &StudentRecord) -> Result<()>;

    /// Deletes the record stored under `key` in `space`.
    ///
    /// Returns true if a record was removed.
    fn delete(&self, space: RecordSpace, key: &RecordKey) -> Result<bool>;

    /// Returns every record in `space` that satisfies `predicate`.
    fn query(&self, space: RecordSpace, predicate: &RecordPredicate) -> Result<Vec<StudentRecord>>;

    /// Checks if a record exists under `key` in `space`.
    fn exists(&self, space: RecordSpace, key: &RecordKey) -> Result<bool> {
        Ok(self.get(space, key)?.is_some())
    }

    /// Returns the number of records in `space`.
    fn count(&self, space: RecordSpace) -> Result<usize> {
        Ok(self.query(space, &RecordPredicate::All)?.len())
    }
}

impl<T: StudentBackend + ?Sized> StudentBackend for Arc<T> {
    fn get(&self, space: RecordSpace, key: &RecordKey) -> Result<Option<StudentRecord>> {
        (**self).get(space, key)
    }

    fn put(&self, space: RecordSpace, record: &StudentRecord) -> Result<()> {
        (**self).put(space, record)
    }

    fn delete(&self, space: RecordSpace, key: &RecordKey) -> Result<bool> {
        (**self).delete(space, key)
    }

    fn query(&self, space: RecordSpace, predicate: &RecordPredicate) -> Result<Vec<StudentRecord>> {
        (**self).query(space, predicate)
    }

    fn exists(&self, space: RecordSpace, key: &RecordKey) -> Result<bool> {
        (**self).exists(space, key)
    }

    fn count(&self, space: RecordSpace) -> Result<usize> {
        (**self).count(space)
    }
}
