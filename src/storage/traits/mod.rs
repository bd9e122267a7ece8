//! Storage backend traits.

mod index;
mod student;

pub use index::CommentIndex;
pub use student::StudentBackend;
