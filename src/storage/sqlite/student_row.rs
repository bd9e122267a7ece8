//! Row conversion for student records.
//!
//! Both student tables share the same logical columns. Timestamps are stored
//! as microseconds since the Unix epoch so that sub-second `updated_at`
//! advances survive a round trip.

use crate::models::{RegistrationKey, StudentRecord};
use chrono::{DateTime, Utc};
use rusqlite::Row;

/// Logical columns in the order [`student_from_row`] reads them.
pub const STUDENT_COLUMNS: &str = "course_id, email, name, last_name, team, section, comments, \
     google_id, registration_key, created_at, updated_at";

/// Converts stored microseconds back into a timestamp.
///
/// Out-of-range values fall back to the Unix epoch.
#[must_use]
pub fn timestamp_from_micros(micros: i64) -> DateTime<Utc> {
    DateTime::from_timestamp_micros(micros).unwrap_or_default()
}

/// Builds a [`StudentRecord`] from a row selected with [`STUDENT_COLUMNS`].
///
/// # Errors
///
/// Returns a `rusqlite` error if a column is missing or has the wrong type.
pub fn student_from_row(row: &Row<'_>) -> rusqlite::Result<StudentRecord> {
    Ok(StudentRecord {
        course_id: row.get(0)?,
        email: row.get(1)?,
        name: row.get(2)?,
        last_name: row.get(3)?,
        team: row.get(4)?,
        section: row.get(5)?,
        comments: row.get(6)?,
        google_id: row.get(7)?,
        registration_key: RegistrationKey::new(row.get::<_, String>(8)?),
        created_at: timestamp_from_micros(row.get(9)?),
        updated_at: timestamp_from_micros(row.get(10)?),
    })
}
