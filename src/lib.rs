//! # Roster
//!
//! Student enrollment storage with a two-representation migration layer and
//! a visibility-scoped comment search query builder.
//!
//! A logical student is identified by `(course id, email)`. Physically it may
//! be backed by a record in the legacy space, the course-scoped space, or both
//! while a migration is in progress. [`StudentStore`] hides that from callers:
//! lookups walk the spaces in a fixed order, updates write back to whichever
//! record was found, and the registration key survives every migration step.
//!
//! ## Example
//!
//! ```rust,ignore
//! use roster::{NewStudent, RegistrationKeyCodec, StudentStore};
//! use roster::storage::InMemoryStudentBackend;
//!
//! let codec = RegistrationKeyCodec::from_secret("local-secret");
//! let store = StudentStore::new(InMemoryStudentBackend::new(), codec);
//!
//! let created = store.create(&NewStudent::new("CS101", "ada@example.com", "Ada Lovelace"))?;
//! let token = store.encoded_registration_key(&created)?;
//! assert!(store.get_by_registration_key(&token)?.is_some());
//! ```

#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]
#![warn(missing_docs)]
#![forbid(unsafe_code)]
#![allow(clippy::multiple_crate_versions)]

use thiserror::Error as ThisError;

pub mod config;
pub mod models;
pub mod observability;
pub mod security;
pub mod services;
pub mod storage;
pub mod validation;

pub use config::{RosterConfig, SearchConfig};
pub use models::{
    CommentDocument, InstructorRole, NewStudent, QueryExpr, QueryOptions, RecordKey,
    RecordPredicate, RecordSpace, RegistrationKey, SearchField, SearchHit, SearchQuery,
    StudentRecord, StudentUpdate,
};
pub use security::RegistrationKeyCodec;
pub use services::{CommentSearchQueryBuilder, RoleResolver, StaticRoleResolver, StudentStore};
pub use storage::{CommentIndex, StudentBackend};
pub use validation::{FieldValidator, ValidationError};

/// Diagnostic carried by the panic raised when a required identity argument is absent.
pub const NULL_INPUT_DIAGNOSTIC: &str = "Supplied parameter was null";

/// Error type for roster operations.
///
/// # Error Variant Triggers
///
/// | Variant | Raised When |
/// |---------|-------------|
/// | `Validation` | Malformed course id or email, update to an email already in use |
/// | `AlreadyExists` | Creating a scoped record whose `(course, email)` is taken |
/// | `NotFound` | Updating a student with no representation in either space |
/// | `InvalidInput` | Malformed registration key token, malformed configuration |
/// | `OperationFailed` | `SQLite` failures, lock failures, filesystem I/O |
///
/// Lookups that find nothing return `Ok(None)` and deletes tolerate absence,
/// so neither ever produces `NotFound`.
#[derive(Debug, ThisError)]
pub enum Error {
    /// A field failed validation.
    #[error("{0}")]
    Validation(ValidationError),

    /// A scoped record already exists for the identity.
    #[error("Trying to create a Student that exists: {identity}")]
    AlreadyExists {
        /// `<course>/<email>` of the existing student.
        identity: String,
    },

    /// No representation exists for the identity.
    #[error("Trying to update non-existent Student: {identity}")]
    NotFound {
        /// `<course>/<email>` that was looked up.
        identity: String,
    },

    /// Invalid input was provided.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// An operation failed.
    #[error("operation '{operation}' failed: {cause}")]
    OperationFailed {
        /// The operation that failed.
        operation: String,
        /// The underlying cause.
        cause: String,
    },
}

impl From<ValidationError> for Error {
    fn from(err: ValidationError) -> Self {
        Self::Validation(err)
    }
}

/// Result type alias for roster operations.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = Error::InvalidInput("test error".to_string());
        assert_eq!(err.to_string(), "invalid input: test error");

        let err = Error::OperationFailed {
            operation: "test".to_string(),
            cause: "failed".to_string(),
        };
        assert_eq!(err.to_string(), "operation 'test' failed: failed");

        let err = Error::AlreadyExists {
            identity: "CS101/ada@example.com".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "Trying to create a Student that exists: CS101/ada@example.com"
        );

        let err = Error::NotFound {
            identity: "CS101/ada@example.com".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "Trying to update non-existent Student: CS101/ada@example.com"
        );
    }

    #[test]
    fn test_validation_error_converts() {
        let err: Error =
            ValidationError::new("course ID", "bad id", "is not in the correct format").into();
        assert!(matches!(err, Error::Validation(ref v) if v.field == "course ID"));
        assert!(err.to_string().contains("bad id"));
    }
}
