//! Field validation for student identity fields.
//!
//! Each check returns `None` for an acceptable value or a [`ValidationError`]
//! naming the field, the offending value and the reason.

use crate::models::NewStudent;
use crate::{Error, Result};
use regex::Regex;
use std::fmt;
use std::sync::LazyLock;

/// Field name reported for course id failures.
pub const COURSE_ID_FIELD_NAME: &str = "course ID";
/// Field name reported for email failures.
pub const EMAIL_FIELD_NAME: &str = "email";

/// Maximum course id length in characters.
pub const COURSE_ID_MAX_LENGTH: usize = 40;
/// Maximum email length in characters.
pub const EMAIL_MAX_LENGTH: usize = 254;

/// Reason reported for empty values.
pub const REASON_EMPTY: &str = "is empty";
/// Reason reported for values over the length limit.
pub const REASON_TOO_LONG: &str = "is too long";
/// Reason reported for values with disallowed characters or shape.
pub const REASON_INCORRECT_FORMAT: &str = "is not in the correct format";

static COURSE_ID_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[a-zA-Z0-9_.$-]+$").unwrap_or_else(|_| unreachable!()));

static EMAIL_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"^[\w+-][\w+!#$%&'*/=?^`{}~-]*(\.[\w+!#$%&'*/=?^`{}~-]+)*@([A-Za-z0-9-]+\.)+[A-Za-z]+$",
    )
    .unwrap_or_else(|_| unreachable!())
});

/// A field that failed validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    /// Name of the field.
    pub field: String,
    /// The rejected value.
    pub value: String,
    /// Why it was rejected, phrased to follow "because it".
    pub reason: String,
}

impl ValidationError {
    /// Creates a new validation error.
    #[must_use]
    pub fn new(
        field: impl Into<String>,
        value: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        Self {
            field: field.into(),
            value: value.into(),
            reason: reason.into(),
        }
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} \"{}\" is not acceptable because it {}",
            self.field, self.value, self.reason
        )
    }
}

impl std::error::Error for ValidationError {}

/// Validator for course ids and emails.
#[derive(Debug, Clone, Copy, Default)]
pub struct FieldValidator;

impl FieldValidator {
    /// Creates a new validator.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    /// Validates a course id.
    #[must_use]
    pub fn validate_course_id(&self, value: &str) -> Option<ValidationError> {
        check(
            COURSE_ID_FIELD_NAME,
            value,
            COURSE_ID_MAX_LENGTH,
            &COURSE_ID_PATTERN,
        )
    }

    /// Validates an email address.
    #[must_use]
    pub fn validate_email(&self, value: &str) -> Option<ValidationError> {
        check(EMAIL_FIELD_NAME, value, EMAIL_MAX_LENGTH, &EMAIL_PATTERN)
    }

    /// Validates the identity fields of a student, course id first.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Validation`] for the first failing field.
    pub fn validate_new_student(&self, student: &NewStudent) -> Result<()> {
        if let Some(err) = self.validate_course_id(&student.course_id) {
            return Err(Error::Validation(err));
        }
        if let Some(err) = self.validate_email(&student.email) {
            return Err(Error::Validation(err));
        }
        Ok(())
    }
}

fn check(field: &str, value: &str, max_length: usize, pattern: &Regex) -> Option<ValidationError> {
    let reason = if value.trim().is_empty() {
        REASON_EMPTY
    } else if value.chars().count() > max_length {
        REASON_TOO_LONG
    } else if !pattern.is_match(value) {
        REASON_INCORRECT_FORMAT
    } else {
        return None;
    };
    Some(ValidationError::new(field, value, reason))
}
