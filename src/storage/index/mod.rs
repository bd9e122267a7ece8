//! Comment index implementations.

mod sqlite;

pub use sqlite::{DEFAULT_MAX_LIMIT, SqliteCommentIndex};
