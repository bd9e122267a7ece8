//! Student record types, record spaces and physical keys.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;

/// Physical record space a student representation lives in.
///
/// A logical student may be backed by zero, one or both spaces at once.
/// Lookups walk [`RecordSpace::LOOKUP_ORDER`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordSpace {
    /// Original per-student records that predate course scoping.
    Legacy,
    /// Current records keyed by `(course id, email)`.
    Scoped,
}

impl RecordSpace {
    /// Priority order used by every fallback lookup.
    pub const LOOKUP_ORDER: [Self; 2] = [Self::Scoped, Self::Legacy];

    /// Returns the space as a string slice.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Legacy => "legacy",
            Self::Scoped => "scoped",
        }
    }

    /// Parses a space name.
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "legacy" => Some(Self::Legacy),
            "scoped" => Some(Self::Scoped),
            _ => None,
        }
    }
}

impl fmt::Display for RecordSpace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Stable per-student secret used for credential-free lookup.
///
/// Generated once at first persistence and copied verbatim whenever a
/// record is migrated between spaces.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RegistrationKey(String);

impl RegistrationKey {
    /// Wraps an existing raw key.
    #[must_use]
    pub fn new(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    /// Generates a fresh raw key.
    #[must_use]
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().simple().to_string())
    }

    /// Returns the raw key as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RegistrationKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for RegistrationKey {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Physical key of a representation within its space.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RecordKey(String);

impl RecordKey {
    /// Key of a scoped representation: `<email>%<course>`.
    #[must_use]
    pub fn scoped(course_id: &str, email: &str) -> Self {
        Self(format!("{email}%{course_id}"))
    }

    /// Key of a legacy representation.
    ///
    /// Legacy records carry a single opaque identifier derived from the email
    /// (salted with the course so that one address can be enrolled twice).
    #[must_use]
    pub fn legacy(course_id: &str, email: &str) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(email.as_bytes());
        hasher.update([0u8]);
        hasher.update(course_id.as_bytes());
        let digest = hasher.finalize();
        Self(format!("legacy-{}", hex::encode(&digest[..16])))
    }

    /// Key for `(course, email)` in the given space.
    #[must_use]
    pub fn for_identity(space: RecordSpace, course_id: &str, email: &str) -> Self {
        match space {
            RecordSpace::Legacy => Self::legacy(course_id, email),
            RecordSpace::Scoped => Self::scoped(course_id, email),
        }
    }

    /// Key a record would be stored under in the given space.
    #[must_use]
    pub fn for_record(space: RecordSpace, record: &StudentRecord) -> Self {
        Self::for_identity(space, &record.course_id, &record.email)
    }

    /// Returns the key as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RecordKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Logical view of a student, independent of the space that backs it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StudentRecord {
    /// Course the student is enrolled in.
    pub course_id: String,
    /// Email address, unique within a course.
    pub email: String,
    /// Full display name.
    pub name: String,
    /// Last name, derived from `name` unless given explicitly.
    pub last_name: String,
    /// Team name.
    pub team: String,
    /// Section name.
    pub section: String,
    /// Free-form instructor comments.
    pub comments: String,
    /// Linked account id; empty while unregistered.
    pub google_id: String,
    /// Stable registration secret.
    pub registration_key: RegistrationKey,
    /// Set once at first persistence.
    pub created_at: DateTime<Utc>,
    /// Advanced on every mutating write unless preservation is requested.
    pub updated_at: DateTime<Utc>,
}

impl StudentRecord {
    /// Returns `<course>/<email>`.
    #[must_use]
    pub fn identification(&self) -> String {
        identification(&self.course_id, &self.email)
    }

    /// Returns true once the student has linked an account.
    #[must_use]
    pub fn is_registered(&self) -> bool {
        !self.google_id.is_empty()
    }

    /// Compares the enrollment fields, ignoring key and timestamps.
    #[must_use]
    pub fn is_enroll_info_same_as(&self, other: &Self) -> bool {
        self.course_id == other.course_id
            && self.email == other.email
            && self.name == other.name
            && self.team == other.team
            && self.section == other.section
            && self.comments == other.comments
            && self.google_id == other.google_id
    }
}

/// Returns `<course>/<email>`, the identity string used in error messages.
#[must_use]
pub fn identification(course_id: &str, email: &str) -> String {
    format!("{course_id}/{email}")
}

/// Attributes for a student about to be persisted.
///
/// `registration_key` and `created_at` are normally left unset and filled in
/// at first persistence; migration paths set them so the values carry over.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NewStudent {
    /// Course id.
    pub course_id: String,
    /// Email address.
    pub email: String,
    /// Full display name.
    pub name: String,
    /// Explicit last name; derived from `name` when `None`.
    pub last_name: Option<String>,
    /// Team name.
    pub team: String,
    /// Section name.
    pub section: String,
    /// Instructor comments.
    pub comments: String,
    /// Linked account id; empty while unregistered.
    pub google_id: String,
    /// Existing registration key to keep.
    pub registration_key: Option<RegistrationKey>,
    /// Existing creation time to keep.
    pub created_at: Option<DateTime<Utc>>,
}

impl NewStudent {
    /// Creates a new student with the identity fields and a name.
    #[must_use]
    pub fn new(
        course_id: impl Into<String>,
        email: impl Into<String>,
        name: impl Into<String>,
    ) -> Self {
        Self {
            course_id: course_id.into(),
            email: email.into(),
            name: name.into(),
            ..Self::default()
        }
    }

    /// Sets the team.
    #[must_use]
    pub fn with_team(mut self, team: impl Into<String>) -> Self {
        self.team = team.into();
        self
    }

    /// Sets the section.
    #[must_use]
    pub fn with_section(mut self, section: impl Into<String>) -> Self {
        self.section = section.into();
        self
    }

    /// Sets the comments.
    #[must_use]
    pub fn with_comments(mut self, comments: impl Into<String>) -> Self {
        self.comments = comments.into();
        self
    }

    /// Sets the linked account id.
    #[must_use]
    pub fn with_google_id(mut self, google_id: impl Into<String>) -> Self {
        self.google_id = google_id.into();
        self
    }

    /// Sets an explicit last name.
    #[must_use]
    pub fn with_last_name(mut self, last_name: impl Into<String>) -> Self {
        self.last_name = Some(last_name.into());
        self
    }

    /// Builds the persisted record.
    ///
    /// The name is normalized, the last name derived when absent, the
    /// registration key generated when absent, and `updated_at` set to `now`.
    #[must_use]
    pub fn into_record(self, now: DateTime<Utc>) -> StudentRecord {
        let (name, derived_last_name) = split_name(&self.name);
        StudentRecord {
            course_id: self.course_id,
            email: self.email,
            name,
            last_name: self.last_name.unwrap_or(derived_last_name),
            team: self.team,
            section: self.section,
            comments: self.comments,
            google_id: self.google_id,
            registration_key: self.registration_key.unwrap_or_else(RegistrationKey::generate),
            created_at: self.created_at.unwrap_or(now),
            updated_at: now,
        }
    }
}

impl From<&StudentRecord> for NewStudent {
    fn from(record: &StudentRecord) -> Self {
        Self {
            course_id: record.course_id.clone(),
            email: record.email.clone(),
            name: record.name.clone(),
            last_name: Some(record.last_name.clone()),
            team: record.team.clone(),
            section: record.section.clone(),
            comments: record.comments.clone(),
            google_id: record.google_id.clone(),
            registration_key: Some(record.registration_key.clone()),
            created_at: Some(record.created_at),
        }
    }
}

/// New values for an existing student. `None` leaves a field unchanged.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StudentUpdate {
    /// New full name (the last name is re-derived).
    pub name: Option<String>,
    /// New team.
    pub team: Option<String>,
    /// New section.
    pub section: Option<String>,
    /// New email; moves the record to a new key when it differs.
    pub email: Option<String>,
    /// New linked account id.
    pub google_id: Option<String>,
    /// New comments.
    pub comments: Option<String>,
    /// Keep the stored `updated_at` instead of refreshing it.
    pub preserve_updated_at: bool,
}

impl StudentUpdate {
    /// Creates an update that changes nothing.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an update that writes every enrollment field of `record`.
    #[must_use]
    pub fn from_record(record: &StudentRecord) -> Self {
        Self {
            name: Some(record.name.clone()),
            team: Some(record.team.clone()),
            section: Some(record.section.clone()),
            email: Some(record.email.clone()),
            google_id: Some(record.google_id.clone()),
            comments: Some(record.comments.clone()),
            preserve_updated_at: false,
        }
    }

    /// Sets the name.
    #[must_use]
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Sets the team.
    #[must_use]
    pub fn team(mut self, team: impl Into<String>) -> Self {
        self.team = Some(team.into());
        self
    }

    /// Sets the section.
    #[must_use]
    pub fn section(mut self, section: impl Into<String>) -> Self {
        self.section = Some(section.into());
        self
    }

    /// Sets the email.
    #[must_use]
    pub fn email(mut self, email: impl Into<String>) -> Self {
        self.email = Some(email.into());
        self
    }

    /// Sets the linked account id.
    #[must_use]
    pub fn google_id(mut self, google_id: impl Into<String>) -> Self {
        self.google_id = Some(google_id.into());
        self
    }

    /// Sets the comments.
    #[must_use]
    pub fn comments(mut self, comments: impl Into<String>) -> Self {
        self.comments = Some(comments.into());
        self
    }

    /// Keeps the stored `updated_at`.
    #[must_use]
    pub const fn preserving_updated_at(mut self) -> Self {
        self.preserve_updated_at = true;
        self
    }

    /// Applies the update to `record`. Returns true if the email changed.
    pub fn apply_to(&self, record: &mut StudentRecord, now: DateTime<Utc>) -> bool {
        if let Some(ref name) = self.name {
            let (name, last_name) = split_name(name);
            record.name = name;
            record.last_name = last_name;
        }
        if let Some(ref team) = self.team {
            record.team.clone_from(team);
        }
        if let Some(ref section) = self.section {
            record.section.clone_from(section);
        }
        if let Some(ref google_id) = self.google_id {
            record.google_id.clone_from(google_id);
        }
        if let Some(ref comments) = self.comments {
            record.comments.clone_from(comments);
        }
        let email_changed = match self.email {
            Some(ref email) if *email != record.email => {
                record.email.clone_from(email);
                true
            },
            _ => false,
        };
        if !self.preserve_updated_at {
            record.updated_at = now;
        }
        email_changed
    }
}

/// Splits a raw name into `(normalized full name, last name)`.
///
/// A `{braced}` segment marks the last name explicitly and the braces are
/// dropped from the full name. Otherwise the last word is the last name.
#[must_use]
pub fn split_name(raw: &str) -> (String, String) {
    let collapse = |s: &str| s.split_whitespace().collect::<Vec<_>>().join(" ");

    if let (Some(open), Some(close)) = (raw.find('{'), raw.rfind('}')) {
        if open < close {
            let last_name = collapse(&raw[open + 1..close]);
            let full_name = collapse(&raw.replace(['{', '}'], " "));
            return (full_name, last_name);
        }
    }

    let full_name = collapse(raw);
    let last_name = full_name
        .rsplit(' ')
        .next()
        .map(str::to_string)
        .unwrap_or_default();
    (full_name, last_name)
}

/// Selection criteria for querying a record space.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecordPredicate {
    /// Every record.
    All,
    /// Records in a course.
    Course(String),
    /// The record for `(course, email)`.
    CourseEmail {
        /// Course id.
        course_id: String,
        /// Email address.
        email: String,
    },
    /// Records in a course linked to an account.
    CourseGoogleId {
        /// Course id.
        course_id: String,
        /// Linked account id.
        google_id: String,
    },
    /// Records linked to an account, in any course.
    GoogleId(String),
    /// Records in a team of a course.
    Team {
        /// Course id.
        course_id: String,
        /// Team name.
        team: String,
    },
    /// Records in a course with no linked account.
    Unregistered(String),
    /// Records carrying a raw registration key.
    RegistrationKey(RegistrationKey),
}

impl RecordPredicate {
    /// Returns true if `record` satisfies the predicate.
    #[must_use]
    pub fn matches(&self, record: &StudentRecord) -> bool {
        match self {
            Self::All => true,
            Self::Course(course_id) => record.course_id == *course_id,
            Self::CourseEmail { course_id, email } => {
                record.course_id == *course_id && record.email == *email
            },
            Self::CourseGoogleId {
                course_id,
                google_id,
            } => record.course_id == *course_id && record.google_id == *google_id,
            Self::GoogleId(google_id) => record.google_id == *google_id,
            Self::Team { course_id, team } => {
                record.course_id == *course_id && record.team == *team
            },
            Self::Unregistered(course_id) => {
                record.course_id == *course_id && record.google_id.is_empty()
            },
            Self::RegistrationKey(key) => record.registration_key == *key,
        }
    }
}
