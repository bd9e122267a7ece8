//! Storage layer.
//!
//! Two independent concerns:
//! - **Student backends**: the two record spaces behind
//!   [`StudentStore`](crate::services::StudentStore) (`SQLite`, in-memory)
//! - **Comment index**: field filters plus full-text search (`SQLite` + FTS5)

// Allow cast precision loss for score calculations where exact precision is not critical.
#![allow(clippy::cast_precision_loss)]
// Dropping database connections slightly early provides no meaningful benefit.
#![allow(clippy::significant_drop_tightening)]

pub mod index;
pub mod persistence;
pub mod sqlite;
pub mod traits;

pub use index::SqliteCommentIndex;
pub use persistence::{InMemoryStudentBackend, SqliteStudentBackend};
pub use traits::{CommentIndex, StudentBackend};
