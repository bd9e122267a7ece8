//! Data models for roster.
//!
//! Student records and their physical keys, instructor roles, and the
//! comment search query types.

mod instructor;
mod search;
mod student;

pub use instructor::InstructorRole;
pub use search::{
    CommentDocument, QueryExpr, QueryOptions, SearchField, SearchHit, SearchQuery, text_terms,
};
pub use student::{
    NewStudent, RecordKey, RecordPredicate, RecordSpace, RegistrationKey, StudentRecord,
    StudentUpdate, identification, split_name,
};
