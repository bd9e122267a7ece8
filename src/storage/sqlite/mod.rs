//! Shared `SQLite` infrastructure for storage backends.
//!
//! Used by both [`crate::storage::SqliteStudentBackend`] and
//! [`crate::storage::SqliteCommentIndex`]. Each backend owns its own
//! connection; WAL mode lets them share a database file.
//!
//! - [`connection`]: lock acquisition and pragma configuration
//! - [`sql`]: translation of predicates and query expressions to SQL
//! - [`student_row`]: row conversion for [`StudentRecord`](crate::models::StudentRecord)
//! - [`metrics`]: shared metrics recording

mod connection;
mod metrics;
mod sql;
mod student_row;

pub use connection::{
    BUSY_TIMEOUT_MS, acquire_lock, configure_connection, op_failed, open_connection,
    open_in_memory,
};
pub use metrics::{record_operation_metrics, status_of};
pub use sql::{SqlParam, build_expr_clause, build_predicate_clause, fts_match_expression};
pub use student_row::{STUDENT_COLUMNS, student_from_row, timestamp_from_micros};
