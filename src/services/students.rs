//! Student record store.
//!
//! A logical student `(course, email)` may be backed by a legacy record, a
//! scoped record, or both. Reads walk [`RecordSpace::LOOKUP_ORDER`] and
//! return the first hit. Writes go back to the space the record was found
//! in; nothing migrates implicitly.
//!
//! # Migration
//!
//! [`StudentStore::copy`] adds a scoped record derived from the current one.
//! [`StudentStore::move_to_scoped`] copies and then deletes any legacy
//! record, so retrying a move after a crash finishes the migration. Each
//! step is a separate backend call with no shared transaction: a crash
//! between them leaves both representations, and a concurrent reader may
//! observe either state. The registration key is carried over verbatim, so
//! [`StudentStore::get_by_registration_key`] resolves in every state.
//!
//! # Absent arguments
//!
//! Passing an empty course id or email to a lookup, update or delete is a
//! caller bug. It panics with [`NULL_INPUT_DIAGNOSTIC`] instead of returning
//! an error. Other arguments are ordinary values: an empty google id means
//! "no linked account", an empty team is a real team value, and an empty
//! registration key token is simply not found.

use crate::models::{
    NewStudent, RecordKey, RecordPredicate, RecordSpace, StudentRecord, StudentUpdate,
    identification,
};
use crate::security::RegistrationKeyCodec;
use crate::storage::StudentBackend;
use crate::validation::{EMAIL_FIELD_NAME, FieldValidator, ValidationError};
use crate::{Error, NULL_INPUT_DIAGNOSTIC, Result};
use chrono::Utc;
use std::collections::BTreeMap;
use tracing::instrument;

/// Student record store over a [`StudentBackend`].
pub struct StudentStore<B: StudentBackend> {
    backend: B,
    codec: RegistrationKeyCodec,
    validator: FieldValidator,
}

#[track_caller]
fn require_present(values: &[&str]) {
    assert!(values.iter().all(|v| !v.is_empty()), "{NULL_INPUT_DIAGNOSTIC}");
}

impl<B: StudentBackend> StudentStore<B> {
    /// Creates a store.
    pub const fn new(backend: B, codec: RegistrationKeyCodec) -> Self {
        Self {
            backend,
            codec,
            validator: FieldValidator::new(),
        }
    }

    /// Returns the backend.
    pub const fn backend(&self) -> &B {
        &self.backend
    }

    /// Returns the registration key codec.
    pub const fn codec(&self) -> &RegistrationKeyCodec {
        &self.codec
    }

    // ------------------------------------------------------------------
    // Create
    // ------------------------------------------------------------------

    /// Creates a scoped record.
    ///
    /// `created_at` and `updated_at` are both set to now and a registration
    /// key is generated unless `student` carries one.
    ///
    /// # Errors
    ///
    /// - [`Error::Validation`] if the course id or email is malformed
    /// - [`Error::AlreadyExists`] if a scoped record exists for the identity
    #[instrument(skip(self, student), fields(operation = "create", student = %identification(&student.course_id, &student.email)))]
    pub fn create(&self, student: &NewStudent) -> Result<StudentRecord> {
        self.validator.validate_new_student(student)?;

        let key = RecordKey::scoped(&student.course_id, &student.email);
        if self.backend.exists(RecordSpace::Scoped, &key)? {
            return Err(Error::AlreadyExists {
                identity: identification(&student.course_id, &student.email),
            });
        }

        self.persist(student, RecordSpace::Scoped)
    }

    /// Persists a record in `space`, replacing whatever is stored under its key.
    ///
    /// Used by migration and by back-compatibility paths that need a legacy
    /// record. Existing `registration_key` and `created_at` values on
    /// `student` are kept.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Validation`] if the course id or email is malformed.
    #[instrument(skip(self, student), fields(operation = "create_without_existence_check", space = %space, student = %identification(&student.course_id, &student.email)))]
    pub fn create_without_existence_check(
        &self,
        student: &NewStudent,
        space: RecordSpace,
    ) -> Result<StudentRecord> {
        self.validator.validate_new_student(student)?;
        self.persist(student, space)
    }

    fn persist(&self, student: &NewStudent, space: RecordSpace) -> Result<StudentRecord> {
        let record = student.clone().into_record(Utc::now());
        self.backend.put(space, &record)?;
        Ok(record)
    }

    // ------------------------------------------------------------------
    // Read
    // ------------------------------------------------------------------

    /// Returns the student, trying the scoped record first.
    ///
    /// # Errors
    ///
    /// Returns an error only if the backend fails.
    ///
    /// # Panics
    ///
    /// Panics with [`NULL_INPUT_DIAGNOSTIC`] if either argument is empty.
    #[instrument(skip(self), fields(operation = "get_by_email"))]
    pub fn get_by_email(&self, course_id: &str, email: &str) -> Result<Option<StudentRecord>> {
        require_present(&[course_id, email]);
        Ok(self.find(course_id, email)?.map(|(_, record)| record))
    }

    /// Returns the scoped record of the student linked to `google_id` in a course.
    ///
    /// Legacy records are not consulted. An empty `google_id` belongs to no
    /// account and finds nothing.
    ///
    /// # Panics
    ///
    /// Panics with [`NULL_INPUT_DIAGNOSTIC`] if `course_id` is empty.
    #[instrument(skip(self), fields(operation = "get_by_google_id"))]
    pub fn get_by_google_id(
        &self,
        course_id: &str,
        google_id: &str,
    ) -> Result<Option<StudentRecord>> {
        require_present(&[course_id]);
        if google_id.is_empty() {
            return Ok(None);
        }
        let predicate = RecordPredicate::CourseGoogleId {
            course_id: course_id.to_string(),
            google_id: google_id.to_string(),
        };
        Ok(self
            .backend
            .query(RecordSpace::Scoped, &predicate)?
            .into_iter()
            .next())
    }

    /// Returns every scoped record linked to `google_id`, across courses.
    ///
    /// An empty `google_id` belongs to no account and finds nothing.
    #[instrument(skip(self), fields(operation = "get_by_google_id_all"))]
    pub fn get_by_google_id_all(&self, google_id: &str) -> Result<Vec<StudentRecord>> {
        if google_id.is_empty() {
            return Ok(Vec::new());
        }
        self.backend.query(
            RecordSpace::Scoped,
            &RecordPredicate::GoogleId(google_id.to_string()),
        )
    }

    /// Returns the student holding an encoded registration key.
    ///
    /// A token that does not decode (including an empty one) is reported as
    /// not found, as is a key no record carries.
    ///
    /// # Errors
    ///
    /// Returns an error only if the backend fails.
    #[instrument(skip(self, token), fields(operation = "get_by_registration_key"))]
    pub fn get_by_registration_key(&self, token: &str) -> Result<Option<StudentRecord>> {
        if token.trim().is_empty() {
            tracing::debug!("empty registration key");
            return Ok(None);
        }
        let raw = match self.codec.decode(token) {
            Ok(raw) => raw,
            Err(e) => {
                tracing::debug!(error = %e, "registration key did not decode");
                return Ok(None);
            },
        };

        let predicate = RecordPredicate::RegistrationKey(raw);
        for space in RecordSpace::LOOKUP_ORDER {
            if let Some(record) = self.backend.query(space, &predicate)?.into_iter().next() {
                return Ok(Some(record));
            }
        }
        Ok(None)
    }

    /// Encodes the record's registration key for handing out.
    ///
    /// # Errors
    ///
    /// Returns an error if encoding fails.
    pub fn encoded_registration_key(&self, record: &StudentRecord) -> Result<String> {
        self.codec.encode(&record.registration_key)
    }

    /// Returns whether a record for `(course, email)` exists in `space`.
    ///
    /// # Panics
    ///
    /// Panics with [`NULL_INPUT_DIAGNOSTIC`] if either argument is empty.
    pub fn exists_in(&self, space: RecordSpace, course_id: &str, email: &str) -> Result<bool> {
        require_present(&[course_id, email]);
        self.backend
            .exists(space, &RecordKey::for_identity(space, course_id, email))
    }

    /// Returns the spaces currently holding a record for `(course, email)`,
    /// in lookup order.
    ///
    /// # Panics
    ///
    /// Panics with [`NULL_INPUT_DIAGNOSTIC`] if either argument is empty.
    pub fn representations(&self, course_id: &str, email: &str) -> Result<Vec<RecordSpace>> {
        let mut spaces = Vec::with_capacity(2);
        for space in RecordSpace::LOOKUP_ORDER {
            if self.exists_in(space, course_id, email)? {
                spaces.push(space);
            }
        }
        Ok(spaces)
    }

    fn find(&self, course_id: &str, email: &str) -> Result<Option<(RecordSpace, StudentRecord)>> {
        for space in RecordSpace::LOOKUP_ORDER {
            let key = RecordKey::for_identity(space, course_id, email);
            if let Some(record) = self.backend.get(space, &key)? {
                return Ok(Some((space, record)));
            }
        }
        Ok(None)
    }

    // ------------------------------------------------------------------
    // Update
    // ------------------------------------------------------------------

    /// Updates the student identified by `(course_id, email)`.
    ///
    /// The record is written back to the space it was found in. A changed
    /// email moves the record to its new key within that space: the new key
    /// is written before the old one is deleted.
    ///
    /// # Errors
    ///
    /// - [`Error::NotFound`] if the student has no record
    /// - [`Error::Validation`] if the new email is already used by another
    ///   student of the course in either space; neither student changes
    ///
    /// # Panics
    ///
    /// Panics with [`NULL_INPUT_DIAGNOSTIC`] if either argument is empty.
    #[instrument(skip(self, update), fields(operation = "update", student = %identification(course_id, email)))]
    pub fn update(
        &self,
        course_id: &str,
        email: &str,
        update: &StudentUpdate,
    ) -> Result<StudentRecord> {
        require_present(&[course_id, email]);

        let Some((space, mut record)) = self.find(course_id, email)? else {
            return Err(Error::NotFound {
                identity: identification(course_id, email),
            });
        };

        if let Some(new_email) = update.email.as_deref().filter(|e| *e != email) {
            if let Some((_, other)) = self.find(course_id, new_email)? {
                return Err(Error::Validation(ValidationError::new(
                    EMAIL_FIELD_NAME,
                    new_email,
                    format!("is already used by {} ({})", other.name, other.email),
                )));
            }
        }

        let old_key = RecordKey::for_record(space, &record);
        let email_changed = update.apply_to(&mut record, Utc::now());

        self.backend.put(space, &record)?;
        if email_changed {
            self.backend.delete(space, &old_key)?;
            tracing::debug!(space = %space, new_email = %record.email, "moved record to new email key");
        }
        Ok(record)
    }

    // ------------------------------------------------------------------
    // Delete
    // ------------------------------------------------------------------

    /// Deletes every record of the student. Deleting an absent student is a
    /// no-op.
    ///
    /// Returns the number of records removed (0, 1 or 2).
    ///
    /// # Panics
    ///
    /// Panics with [`NULL_INPUT_DIAGNOSTIC`] if either argument is empty.
    #[instrument(skip(self), fields(operation = "delete"))]
    pub fn delete(&self, course_id: &str, email: &str) -> Result<usize> {
        require_present(&[course_id, email]);
        let mut removed = 0;
        for space in RecordSpace::LOOKUP_ORDER {
            let key = RecordKey::for_identity(space, course_id, email);
            if self.backend.delete(space, &key)? {
                removed += 1;
            }
        }
        if removed > 1 {
            tracing::debug!(removed, "deleted legacy and scoped records");
        }
        Ok(removed)
    }

    /// Deletes every record of a course, in both spaces.
    ///
    /// # Panics
    ///
    /// Panics with [`NULL_INPUT_DIAGNOSTIC`] if `course_id` is empty.
    #[instrument(skip(self), fields(operation = "delete_all_for_course"))]
    pub fn delete_all_for_course(&self, course_id: &str) -> Result<usize> {
        require_present(&[course_id]);
        let predicate = RecordPredicate::Course(course_id.to_string());
        let mut removed = 0;
        for space in RecordSpace::LOOKUP_ORDER {
            removed += self.delete_matching(space, &predicate)?;
        }
        Ok(removed)
    }

    /// Deletes every scoped record linked to `google_id`.
    ///
    /// An empty `google_id` belongs to no account and deletes nothing.
    #[instrument(skip(self), fields(operation = "delete_all_for_google_id"))]
    pub fn delete_all_for_google_id(&self, google_id: &str) -> Result<usize> {
        if google_id.is_empty() {
            return Ok(0);
        }
        self.delete_matching(
            RecordSpace::Scoped,
            &RecordPredicate::GoogleId(google_id.to_string()),
        )
    }

    fn delete_matching(&self, space: RecordSpace, predicate: &RecordPredicate) -> Result<usize> {
        let mut removed = 0;
        for record in self.backend.query(space, predicate)? {
            if self
                .backend
                .delete(space, &RecordKey::for_record(space, &record))?
            {
                removed += 1;
            }
        }
        Ok(removed)
    }

    // ------------------------------------------------------------------
    // List
    // ------------------------------------------------------------------

    /// Lists every student, ordered by course then email.
    pub fn list_all(&self) -> Result<Vec<StudentRecord>> {
        self.list_merged(&RecordPredicate::All)
    }

    /// Lists the students of a course, ordered by email.
    ///
    /// # Panics
    ///
    /// Panics with [`NULL_INPUT_DIAGNOSTIC`] if `course_id` is empty.
    pub fn list_by_course(&self, course_id: &str) -> Result<Vec<StudentRecord>> {
        require_present(&[course_id]);
        self.list_merged(&RecordPredicate::Course(course_id.to_string()))
    }

    /// Lists the students of a team in a course. An empty `team` lists the
    /// students with no team.
    ///
    /// # Panics
    ///
    /// Panics with [`NULL_INPUT_DIAGNOSTIC`] if `course_id` is empty.
    pub fn list_by_team(&self, team: &str, course_id: &str) -> Result<Vec<StudentRecord>> {
        require_present(&[course_id]);
        self.list_merged(&RecordPredicate::Team {
            course_id: course_id.to_string(),
            team: team.to_string(),
        })
    }

    /// Lists the students of a course who have not linked an account.
    ///
    /// # Panics
    ///
    /// Panics with [`NULL_INPUT_DIAGNOSTIC`] if `course_id` is empty.
    pub fn list_unregistered(&self, course_id: &str) -> Result<Vec<StudentRecord>> {
        require_present(&[course_id]);
        self.list_merged(&RecordPredicate::Unregistered(course_id.to_string()))
    }

    /// Lists raw legacy records.
    pub fn list_legacy(&self) -> Result<Vec<StudentRecord>> {
        self.backend.query(RecordSpace::Legacy, &RecordPredicate::All)
    }

    /// Lists raw scoped records.
    pub fn list_scoped(&self) -> Result<Vec<StudentRecord>> {
        self.backend.query(RecordSpace::Scoped, &RecordPredicate::All)
    }

    /// Queries both spaces and keeps one record per identity, preferring the
    /// scoped one.
    #[instrument(skip(self), fields(operation = "list"))]
    fn list_merged(&self, predicate: &RecordPredicate) -> Result<Vec<StudentRecord>> {
        let mut merged: BTreeMap<(String, String), StudentRecord> = BTreeMap::new();
        for space in RecordSpace::LOOKUP_ORDER {
            for record in self.backend.query(space, predicate)? {
                merged
                    .entry((record.course_id.clone(), record.email.clone()))
                    .or_insert(record);
            }
        }
        Ok(merged.into_values().collect())
    }

    // ------------------------------------------------------------------
    // Migration
    // ------------------------------------------------------------------

    /// Writes a scoped record derived from the student's current record.
    ///
    /// The source is left in place. Registration key and `created_at` are
    /// carried over; `updated_at` is refreshed.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotFound`] if the student has no record.
    ///
    /// # Panics
    ///
    /// Panics with [`NULL_INPUT_DIAGNOSTIC`] if either argument is empty.
    #[instrument(skip(self), fields(operation = "copy"))]
    pub fn copy(&self, course_id: &str, email: &str) -> Result<StudentRecord> {
        require_present(&[course_id, email]);
        let (source, record) = self.find_existing(course_id, email)?;
        let copied =
            self.create_without_existence_check(&NewStudent::from(&record), RecordSpace::Scoped)?;

        metrics::counter!("student_migrations_total", "step" => "copy", "source" => source.as_str())
            .increment(1);
        tracing::info!(source = %source, student = %copied.identification(), "copied student to scoped space");
        Ok(copied)
    }

    /// Copies the student to the scoped space, then deletes the legacy record.
    ///
    /// The legacy record is deleted whenever it exists, including when an
    /// earlier interrupted move already left a scoped copy. The two steps are
    /// separate backend calls; if the delete fails the copy remains and the
    /// error is returned.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotFound`] if the student has no record.
    ///
    /// # Panics
    ///
    /// Panics with [`NULL_INPUT_DIAGNOSTIC`] if either argument is empty.
    #[instrument(skip(self), fields(operation = "move_to_scoped"))]
    pub fn move_to_scoped(&self, course_id: &str, email: &str) -> Result<StudentRecord> {
        require_present(&[course_id, email]);
        let moved = self.copy(course_id, email)?;

        let source = RecordSpace::Legacy;
        if self
            .backend
            .delete(source, &RecordKey::for_identity(source, course_id, email))?
        {
            metrics::counter!("student_migrations_total", "step" => "delete_source", "source" => source.as_str())
                .increment(1);
            tracing::info!(source = %source, student = %moved.identification(), "removed legacy record after move");
        }
        Ok(moved)
    }

    fn find_existing(&self, course_id: &str, email: &str) -> Result<(RecordSpace, StudentRecord)> {
        self.find(course_id, email)?.ok_or_else(|| Error::NotFound {
            identity: identification(course_id, email),
        })
    }
}
