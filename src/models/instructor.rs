//! Instructor role types.

use serde::{Deserialize, Serialize};

/// An instructor role held by a user in one course.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct InstructorRole {
    /// Course the role applies to.
    pub course_id: String,
    /// Email the user is known by in that course.
    pub email: String,
}

impl InstructorRole {
    /// Creates a new role.
    #[must_use]
    pub fn new(course_id: impl Into<String>, email: impl Into<String>) -> Self {
        Self {
            course_id: course_id.into(),
            email: email.into(),
        }
    }
}
