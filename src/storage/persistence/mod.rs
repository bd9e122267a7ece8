//! Student backend implementations.

mod memory;
mod sqlite;

pub use memory::InMemoryStudentBackend;
pub use sqlite::SqliteStudentBackend;
