//! `SQLite`-based student backend.
//!
//! Each record space is its own table: `legacy_students` for legacy records
//! and `course_students` for scoped records. Both tables are keyed by the
//! physical [`RecordKey`] and carry the same logical columns.

use crate::models::{RecordKey, RecordPredicate, RecordSpace, StudentRecord};
use crate::storage::sqlite::{
    STUDENT_COLUMNS, acquire_lock, build_predicate_clause, configure_connection, op_failed,
    open_connection, open_in_memory, record_operation_metrics, status_of, student_from_row,
};
use crate::storage::traits::StudentBackend;
use crate::{Error, Result};
use rusqlite::{Connection, OptionalExtension, params, params_from_iter};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::Instant;
use tracing::instrument;

const BACKEND: &str = "sqlite";

/// Table backing a record space.
const fn table(space: RecordSpace) -> &'static str {
    match space {
        RecordSpace::Legacy => "legacy_students",
        RecordSpace::Scoped => "course_students",
    }
}

/// `SQLite`-based student backend.
///
/// # Concurrency Model
///
/// Uses a `Mutex<Connection>` for thread-safe access. WAL mode and the
/// `busy_timeout` pragma let a second process or a
/// [`SqliteCommentIndex`](crate::storage::SqliteCommentIndex) on the same file
/// proceed without immediate lock failures.
///
/// Each call is a single statement and therefore atomic on its own. No
/// transaction spans calls.
pub struct SqliteStudentBackend {
    /// Protected by Mutex because `rusqlite::Connection` is not `Sync`.
    conn: Mutex<Connection>,
    /// Path to the database (None for in-memory).
    db_path: Option<PathBuf>,
}

impl SqliteStudentBackend {
    /// Opens (or creates) a database file.
    ///
    /// # Errors
    ///
    /// Returns an error if the database cannot be opened or initialized.
    ///
    /// # Examples
    ///
    /// ```ignore
    /// use roster::storage::SqliteStudentBackend;
    ///
    /// let backend = SqliteStudentBackend::new("./roster.db")?;
    /// # Ok::<(), roster::Error>(())
    /// ```
    pub fn new(db_path: impl Into<PathBuf>) -> Result<Self> {
        let db_path = db_path.into();
        let conn = open_connection(&db_path)?;
        let backend = Self {
            conn: Mutex::new(conn),
            db_path: Some(db_path),
        };
        backend.initialize()?;
        Ok(backend)
    }

    /// Creates an in-memory backend (useful for testing).
    ///
    /// # Errors
    ///
    /// Returns an error if the schema cannot be created.
    pub fn in_memory() -> Result<Self> {
        let backend = Self {
            conn: Mutex::new(open_in_memory()?),
            db_path: None,
        };
        backend.initialize()?;
        Ok(backend)
    }

    /// Returns the database path (None for in-memory).
    #[must_use]
    pub fn db_path(&self) -> Option<&Path> {
        self.db_path.as_deref()
    }

    fn initialize(&self) -> Result<()> {
        let conn = acquire_lock(&self.conn);
        configure_connection(&conn)?;

        for space in [RecordSpace::Legacy, RecordSpace::Scoped] {
            let table = table(space);
            conn.execute_batch(&format!(
                "CREATE TABLE IF NOT EXISTS {table} (
                    record_key TEXT PRIMARY KEY,
                    course_id TEXT NOT NULL,
                    email TEXT NOT NULL,
                    name TEXT NOT NULL,
                    last_name TEXT NOT NULL,
                    team TEXT NOT NULL,
                    section TEXT NOT NULL,
                    comments TEXT NOT NULL,
                    google_id TEXT NOT NULL,
                    registration_key TEXT NOT NULL,
                    created_at INTEGER NOT NULL,
                    updated_at INTEGER NOT NULL
                );
                CREATE INDEX IF NOT EXISTS idx_{table}_course_email ON {table}(course_id, email);
                CREATE INDEX IF NOT EXISTS idx_{table}_google_id ON {table}(google_id);
                CREATE INDEX IF NOT EXISTS idx_{table}_registration_key ON {table}(registration_key);"
            ))
            .map_err(op_failed("create_student_tables"))?;
        }
        Ok(())
    }
}

impl StudentBackend for SqliteStudentBackend {
    #[instrument(skip(self), fields(operation = "get", backend = BACKEND, space = %space, key = %key))]
    fn get(&self, space: RecordSpace, key: &RecordKey) -> Result<Option<StudentRecord>> {
        let start = Instant::now();
        let result = (|| {
            let conn = acquire_lock(&self.conn);
            conn.query_row(
                &format!(
                    "SELECT {STUDENT_COLUMNS} FROM {} WHERE record_key = ?1",
                    table(space)
                ),
                params![key.as_str()],
                student_from_row,
            )
            .optional()
            .map_err(op_failed("get_student"))
        })();

        record_operation_metrics(BACKEND, "get", start, status_of(&result));
        result
    }

    #[instrument(skip(self, record), fields(operation = "put", backend = BACKEND, space = %space, student = %record.identification()))]
    fn put(&self, space: RecordSpace, record: &StudentRecord) -> Result<()> {
        let start = Instant::now();
        let result = (|| {
            let conn = acquire_lock(&self.conn);
            let key = RecordKey::for_record(space, record);
            conn.execute(
                &format!(
                    "INSERT OR REPLACE INTO {} (record_key, {STUDENT_COLUMNS})
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)",
                    table(space)
                ),
                params![
                    key.as_str(),
                    record.course_id,
                    record.email,
                    record.name,
                    record.last_name,
                    record.team,
                    record.section,
                    record.comments,
                    record.google_id,
                    record.registration_key.as_str(),
                    record.created_at.timestamp_micros(),
                    record.updated_at.timestamp_micros(),
                ],
            )
            .map_err(op_failed("put_student"))?;
            Ok(())
        })();

        record_operation_metrics(BACKEND, "put", start, status_of(&result));
        result
    }

    #[instrument(skip(self), fields(operation = "delete", backend = BACKEND, space = %space, key = %key))]
    fn delete(&self, space: RecordSpace, key: &RecordKey) -> Result<bool> {
        let start = Instant::now();
        let result = (|| {
            let conn = acquire_lock(&self.conn);
            let deleted = conn
                .execute(
                    &format!("DELETE FROM {} WHERE record_key = ?1", table(space)),
                    params![key.as_str()],
                )
                .map_err(op_failed("delete_student"))?;
            Ok(deleted > 0)
        })();

        record_operation_metrics(BACKEND, "delete", start, status_of(&result));
        result
    }

    #[instrument(skip(self), fields(operation = "query", backend = BACKEND, space = %space))]
    fn query(&self, space: RecordSpace, predicate: &RecordPredicate) -> Result<Vec<StudentRecord>> {
        let start = Instant::now();
        let result = (|| {
            let conn = acquire_lock(&self.conn);
            let (clause, params, _) = build_predicate_clause(predicate, 1);
            let sql = format!(
                "SELECT {STUDENT_COLUMNS} FROM {} WHERE {clause} ORDER BY course_id, email",
                table(space)
            );

            let mut stmt = conn.prepare(&sql).map_err(op_failed("prepare_query_students"))?;
            let rows = stmt
                .query_map(params_from_iter(params.iter()), student_from_row)
                .map_err(op_failed("query_students"))?;

            rows.collect::<std::result::Result<Vec<_>, _>>()
                .map_err(op_failed("read_student_row"))
        })();

        record_operation_metrics(BACKEND, "query", start, status_of(&result));
        result
    }

    fn count(&self, space: RecordSpace) -> Result<usize> {
        let conn = acquire_lock(&self.conn);
        let count: i64 = conn
            .query_row(&format!("SELECT COUNT(*) FROM {}", table(space)), [], |row| {
                row.get(0)
            })
            .map_err(op_failed("count_students"))?;
        usize::try_from(count).map_err(|e| Error::OperationFailed {
            operation: "count_students".to_string(),
            cause: e.to_string(),
        })
    }
}
