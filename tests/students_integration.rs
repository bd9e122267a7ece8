//! Integration tests for the student store.
//!
//! Covers the two-representation lookup rules, migration steps and their
//! partial-failure states, and the `SQLite` backend end to end.

// Integration tests use expect/unwrap/panic for simplicity - panics are acceptable in tests
#![allow(clippy::expect_used, clippy::unwrap_used, clippy::panic)]

use roster::storage::{InMemoryStudentBackend, SqliteStudentBackend};
use roster::{
    Error, NewStudent, RecordKey, RecordPredicate, RecordSpace, RegistrationKeyCodec, Result,
    StudentBackend, StudentRecord, StudentStore, StudentUpdate,
};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::Duration;

fn codec() -> RegistrationKeyCodec {
    RegistrationKeyCodec::from_secret("integration-secret")
}

fn memory_store() -> StudentStore<InMemoryStudentBackend> {
    StudentStore::new(InMemoryStudentBackend::new(), codec())
}

fn student(course: &str, email: &str) -> NewStudent {
    NewStudent::new(course, email, "Grace {Hopper}")
        .with_team("Team A")
        .with_section("Section 1")
}

/// Backend wrapper whose deletes fail on demand, simulating a crash between
/// migration steps.
#[derive(Default)]
struct FlakyBackend {
    inner: InMemoryStudentBackend,
    fail_deletes: AtomicBool,
}

impl FlakyBackend {
    fn fail_deletes(&self, fail: bool) {
        self.fail_deletes.store(fail, Ordering::SeqCst);
    }
}

impl StudentBackend for FlakyBackend {
    fn get(&self, space: RecordSpace, key: &RecordKey) -> Result<Option<StudentRecord>> {
        self.inner.get(space, key)
    }

    fn put(&self, space: RecordSpace, record: &StudentRecord) -> Result<()> {
        self.inner.put(space, record)
    }

    fn delete(&self, space: RecordSpace, key: &RecordKey) -> Result<bool> {
        if self.fail_deletes.load(Ordering::SeqCst) {
            return Err(Error::OperationFailed {
                operation: "delete_student".to_string(),
                cause: "simulated crash".to_string(),
            });
        }
        self.inner.delete(space, key)
    }

    fn query(&self, space: RecordSpace, predicate: &RecordPredicate) -> Result<Vec<StudentRecord>> {
        self.inner.query(space, predicate)
    }
}

// ============================================================================
// Lookup rules
// ============================================================================

#[test]
fn test_create_then_lookup_by_every_key() {
    let store = memory_store();
    let created = store
        .create(&student("valid-course", "valid@email.com").with_google_id("grace.g"))
        .unwrap();

    let by_email = store
        .get_by_email("valid-course", "valid@email.com")
        .unwrap()
        .unwrap();
    assert!(by_email.is_enroll_info_same_as(&created));
    assert_eq!(by_email.last_name, "Hopper");

    let by_gid = store
        .get_by_google_id("valid-course", "grace.g")
        .unwrap()
        .unwrap();
    assert_eq!(by_gid.email, "valid@email.com");

    let token = store.encoded_registration_key(&created).unwrap();
    let by_key = store.get_by_registration_key(&token).unwrap().unwrap();
    assert_eq!(by_key, by_email);
}

#[test]
fn test_legacy_only_student_is_visible() {
    let store = memory_store();
    let legacy = store
        .create_without_existence_check(&student("CS101", "old@example.com"), RecordSpace::Legacy)
        .unwrap();

    assert_eq!(
        store.get_by_email("CS101", "old@example.com").unwrap(),
        Some(legacy.clone())
    );
    assert_eq!(store.list_by_course("CS101").unwrap(), vec![legacy.clone()]);

    let token = store.encoded_registration_key(&legacy).unwrap();
    assert_eq!(store.get_by_registration_key(&token).unwrap(), Some(legacy));
}

#[test]
fn test_create_allowed_when_only_legacy_exists() {
    let store = memory_store();
    store
        .create_without_existence_check(&student("CS101", "old@example.com"), RecordSpace::Legacy)
        .unwrap();

    let scoped = store
        .create(&student("CS101", "old@example.com").with_team("Team B"))
        .unwrap();

    assert_eq!(
        store.get_by_email("CS101", "old@example.com").unwrap(),
        Some(scoped)
    );
    assert_eq!(
        store.representations("CS101", "old@example.com").unwrap(),
        [RecordSpace::Scoped, RecordSpace::Legacy]
    );
}

#[test]
fn test_same_email_in_two_courses() {
    let store = memory_store();
    store.create(&student("CS101", "grace@example.com")).unwrap();
    store
        .create(&student("CS102", "grace@example.com").with_team("Team Z"))
        .unwrap();

    let a = store.get_by_email("CS101", "grace@example.com").unwrap().unwrap();
    let b = store.get_by_email("CS102", "grace@example.com").unwrap().unwrap();
    assert_eq!(a.team, "Team A");
    assert_eq!(b.team, "Team Z");
    assert_ne!(a.registration_key, b.registration_key);
}

#[test]
fn test_invalid_identity_rejected_with_message() {
    let store = memory_store();
    let err = store
        .create(&student("invalid id space", "valid@email.com"))
        .unwrap_err();

    assert_eq!(
        err.to_string(),
        "course ID \"invalid id space\" is not acceptable because it is not in the correct format"
    );
    assert!(store.list_all().unwrap().is_empty());

    let err = store.create(&student("CS101", "not-an-email")).unwrap_err();
    assert!(matches!(err, Error::Validation(ref v) if v.field == "email"));
}

#[test]
fn test_duplicate_create_message() {
    let store = memory_store();
    store.create(&student("CS101", "grace@example.com")).unwrap();
    let err = store.create(&student("CS101", "grace@example.com")).unwrap_err();

    assert_eq!(
        err.to_string(),
        "Trying to create a Student that exists: CS101/grace@example.com"
    );
}

#[test]
fn test_update_missing_message() {
    let err = memory_store()
        .update("CS101", "ghost@example.com", &StudentUpdate::new().team("T"))
        .unwrap_err();

    assert_eq!(
        err.to_string(),
        "Trying to update non-existent Student: CS101/ghost@example.com"
    );
}

#[test]
fn test_absent_lookups_are_not_errors() {
    let store = memory_store();
    assert!(store.get_by_email("CS101", "ghost@example.com").unwrap().is_none());
    assert!(store.get_by_google_id("CS101", "ghost").unwrap().is_none());
    assert!(store.get_by_google_id_all("ghost").unwrap().is_empty());
    assert!(store.get_by_registration_key("ABCDEF").unwrap().is_none());
    assert_eq!(store.delete("CS101", "ghost@example.com").unwrap(), 0);
}

#[test]
#[should_panic(expected = "Supplied parameter was null")]
fn test_empty_email_panics() {
    let _ = memory_store().get_by_email("CS101", "");
}

#[test]
#[should_panic(expected = "Supplied parameter was null")]
fn test_empty_course_on_delete_panics() {
    let _ = memory_store().delete_all_for_course("");
}

#[test]
fn test_empty_token_and_google_id_find_nothing() {
    let store = memory_store();
    store
        .create(&student("CS101", "grace@example.com").with_google_id(""))
        .unwrap();

    assert!(store.get_by_registration_key("").unwrap().is_none());
    assert!(store.get_by_registration_key("   ").unwrap().is_none());
    assert!(store.get_by_google_id("CS101", "").unwrap().is_none());
    assert!(store.get_by_google_id_all("").unwrap().is_empty());
    assert_eq!(store.delete_all_for_google_id("").unwrap(), 0);
    assert!(store.get_by_email("CS101", "grace@example.com").unwrap().is_some());
}

// ============================================================================
// Updates
// ============================================================================

#[test]
fn test_update_keeps_registration_key_and_created_at() {
    let store = memory_store();
    let created = store.create(&student("CS101", "grace@example.com")).unwrap();
    thread::sleep(Duration::from_millis(5));

    let updated = store
        .update(
            "CS101",
            "grace@example.com",
            &StudentUpdate::new()
                .email("hopper@example.com")
                .name("Grace Brewster {Murray Hopper}")
                .google_id("grace.g"),
        )
        .unwrap();

    assert_eq!(updated.registration_key, created.registration_key);
    assert_eq!(updated.created_at, created.created_at);
    assert!(updated.updated_at > created.updated_at);
    assert_eq!(updated.last_name, "Murray Hopper");
    assert!(updated.is_registered());

    assert!(store.get_by_email("CS101", "grace@example.com").unwrap().is_none());
    assert_eq!(
        store.get_by_email("CS101", "hopper@example.com").unwrap(),
        Some(updated)
    );
}

#[test]
fn test_update_email_conflict_changes_nothing() {
    let store = memory_store();
    let grace = store.create(&student("CS101", "grace@example.com")).unwrap();
    let alan = store
        .create(&NewStudent::new("CS101", "alan@example.com", "Alan Turing"))
        .unwrap();

    let err = store
        .update(
            "CS101",
            "grace@example.com",
            &StudentUpdate::new().email("alan@example.com"),
        )
        .unwrap_err();

    assert!(matches!(err, Error::Validation(ref v) if v.reason.contains("Alan Turing")));
    assert_eq!(
        store.get_by_email("CS101", "grace@example.com").unwrap(),
        Some(grace)
    );
    assert_eq!(
        store.get_by_email("CS101", "alan@example.com").unwrap(),
        Some(alan)
    );
}

#[test]
fn test_update_onto_other_legacy_email_fails() {
    let store = memory_store();
    let ann = store
        .create_without_existence_check(&NewStudent::new("CS101", "a@x.com", "Ann Lee"), RecordSpace::Legacy)
        .unwrap();
    let bob = store
        .create_without_existence_check(
            &NewStudent::new("CS101", "b@x.com", "Bob Ray").with_team("Bobs"),
            RecordSpace::Legacy,
        )
        .unwrap();

    let err = store
        .update("CS101", "a@x.com", &StudentUpdate::new().email("b@x.com"))
        .unwrap_err();

    assert!(matches!(err, Error::Validation(ref v) if v.reason.contains("Bob Ray (b@x.com)")));
    assert_eq!(store.get_by_email("CS101", "a@x.com").unwrap(), Some(ann));
    assert_eq!(store.get_by_email("CS101", "b@x.com").unwrap(), Some(bob));
    assert_eq!(store.list_legacy().unwrap().len(), 2);
}

#[test]
fn test_update_of_legacy_record_stays_legacy() {
    let store = memory_store();
    store
        .create_without_existence_check(&student("CS101", "old@example.com"), RecordSpace::Legacy)
        .unwrap();

    store
        .update(
            "CS101",
            "old@example.com",
            &StudentUpdate::new().email("older@example.com"),
        )
        .unwrap();

    assert!(!store.exists_in(RecordSpace::Legacy, "CS101", "old@example.com").unwrap());
    assert!(store.exists_in(RecordSpace::Legacy, "CS101", "older@example.com").unwrap());
    assert!(store.list_scoped().unwrap().is_empty());
}

// ============================================================================
// Migration
// ============================================================================

#[test]
fn test_copy_then_move_lifecycle() {
    let store = memory_store();
    let legacy = store
        .create_without_existence_check(&student("CS101", "old@example.com"), RecordSpace::Legacy)
        .unwrap();
    let token = store.encoded_registration_key(&legacy).unwrap();

    // both representations; scoped is found first
    let copied = store.copy("CS101", "old@example.com").unwrap();
    assert_eq!(copied.registration_key, legacy.registration_key);
    let found = store.get_by_email("CS101", "old@example.com").unwrap().unwrap();
    assert_eq!(found.updated_at, copied.updated_at);
    assert_eq!(store.list_all().unwrap().len(), 1);
    assert_eq!(
        store.get_by_registration_key(&token).unwrap().unwrap().email,
        "old@example.com"
    );

    // moving after a copy removes the legacy record
    store.move_to_scoped("CS101", "old@example.com").unwrap();
    assert_eq!(
        store.representations("CS101", "old@example.com").unwrap(),
        [RecordSpace::Scoped]
    );
    assert_eq!(
        store.get_by_registration_key(&token).unwrap().unwrap().email,
        "old@example.com"
    );

    assert_eq!(store.delete("CS101", "old@example.com").unwrap(), 1);
    assert!(store.get_by_registration_key(&token).unwrap().is_none());
}

#[test]
fn test_move_from_legacy() {
    let store = memory_store();
    let legacy = store
        .create_without_existence_check(&student("CS101", "old@example.com"), RecordSpace::Legacy)
        .unwrap();

    let moved = store.move_to_scoped("CS101", "old@example.com").unwrap();

    assert_eq!(moved.registration_key, legacy.registration_key);
    assert_eq!(moved.created_at, legacy.created_at);
    assert!(moved.is_enroll_info_same_as(&legacy));
    assert_eq!(
        store.representations("CS101", "old@example.com").unwrap(),
        [RecordSpace::Scoped]
    );
    assert!(store.list_legacy().unwrap().is_empty());
}

#[test]
fn test_crash_between_copy_and_delete() {
    let backend = Arc::new(FlakyBackend::default());
    let store = StudentStore::new(Arc::clone(&backend), codec());
    let legacy = store
        .create_without_existence_check(&student("CS101", "old@example.com"), RecordSpace::Legacy)
        .unwrap();

    backend.fail_deletes(true);
    let err = store.move_to_scoped("CS101", "old@example.com").unwrap_err();
    assert!(matches!(err, Error::OperationFailed { .. }));

    // the copy landed, the source survived, and every lookup still works
    assert_eq!(
        store.representations("CS101", "old@example.com").unwrap(),
        [RecordSpace::Scoped, RecordSpace::Legacy]
    );
    let token = store.encoded_registration_key(&legacy).unwrap();
    assert!(store.get_by_registration_key(&token).unwrap().is_some());
    assert_eq!(store.list_by_course("CS101").unwrap().len(), 1);

    // a retried move finishes the migration
    backend.fail_deletes(false);
    let moved = store.move_to_scoped("CS101", "old@example.com").unwrap();
    assert_eq!(moved.registration_key, legacy.registration_key);
    assert_eq!(
        store.representations("CS101", "old@example.com").unwrap(),
        [RecordSpace::Scoped]
    );
    assert!(store.list_legacy().unwrap().is_empty());
    assert_eq!(store.delete_all_for_course("CS101").unwrap(), 1);
    assert!(store.list_all().unwrap().is_empty());
}

#[test]
fn test_crash_during_email_change_leaves_both_keys() {
    let backend = Arc::new(FlakyBackend::default());
    let store = StudentStore::new(Arc::clone(&backend), codec());
    store.create(&student("CS101", "grace@example.com")).unwrap();

    backend.fail_deletes(true);
    let result = store.update(
        "CS101",
        "grace@example.com",
        &StudentUpdate::new().email("hopper@example.com"),
    );
    assert!(result.is_err());

    let old = store.get_by_email("CS101", "grace@example.com").unwrap().unwrap();
    let new = store.get_by_email("CS101", "hopper@example.com").unwrap().unwrap();
    assert_eq!(old.registration_key, new.registration_key);
}

#[test]
fn test_concurrent_readers_during_migration() {
    let store = Arc::new(memory_store());
    let keys: Vec<_> = (0..20)
        .map(|i| {
            store
                .create_without_existence_check(
                    &student("CS101", &format!("s{i}@example.com")),
                    RecordSpace::Legacy,
                )
                .unwrap()
                .registration_key
        })
        .collect();

    // a reader racing a move may see the old record, the new one, or neither,
    // but never a record with a different registration key
    let reader = {
        let store = Arc::clone(&store);
        thread::spawn(move || {
            for _ in 0..50 {
                for (i, key) in keys.iter().enumerate() {
                    let found = store
                        .get_by_email("CS101", &format!("s{i}@example.com"))
                        .unwrap();
                    if let Some(record) = found {
                        assert_eq!(&record.registration_key, key);
                    }
                }
            }
        })
    };

    for i in 0..20 {
        store
            .move_to_scoped("CS101", &format!("s{i}@example.com"))
            .unwrap();
    }
    reader.join().unwrap();

    assert_eq!(store.list_scoped().unwrap().len(), 20);
    assert!(store.list_legacy().unwrap().is_empty());
}

// ============================================================================
// Bulk operations and listings
// ============================================================================

#[test]
fn test_bulk_delete_spans_spaces() {
    let store = memory_store();
    store.create(&student("CS101", "a@example.com")).unwrap();
    store
        .create_without_existence_check(&student("CS101", "b@example.com"), RecordSpace::Legacy)
        .unwrap();
    store.create(&student("CS102", "a@example.com")).unwrap();

    assert_eq!(store.delete_all_for_course("CS101").unwrap(), 2);
    assert!(store.list_by_course("CS101").unwrap().is_empty());
    assert_eq!(store.list_all().unwrap().len(), 1);
}

#[test]
fn test_google_id_queries_are_scoped_only() {
    let store = memory_store();
    store
        .create(&student("CS101", "a@example.com").with_google_id("gid"))
        .unwrap();
    store
        .create_without_existence_check(
            &student("CS102", "a@example.com").with_google_id("gid"),
            RecordSpace::Legacy,
        )
        .unwrap();

    assert_eq!(store.get_by_google_id_all("gid").unwrap().len(), 1);
    assert_eq!(store.delete_all_for_google_id("gid").unwrap(), 1);
    assert_eq!(store.list_legacy().unwrap().len(), 1);
}

#[test]
fn test_team_and_unregistered_listings() {
    let store = memory_store();
    store
        .create(&student("CS101", "a@example.com").with_google_id("a.g"))
        .unwrap();
    store
        .create(&student("CS101", "b@example.com").with_team("Team B"))
        .unwrap();
    store
        .create_without_existence_check(&student("CS101", "c@example.com"), RecordSpace::Legacy)
        .unwrap();

    let team_a: Vec<_> = store
        .list_by_team("Team A", "CS101")
        .unwrap()
        .into_iter()
        .map(|r| r.email)
        .collect();
    assert_eq!(team_a, ["a@example.com", "c@example.com"]);

    let unregistered: Vec<_> = store
        .list_unregistered("CS101")
        .unwrap()
        .into_iter()
        .map(|r| r.email)
        .collect();
    assert_eq!(unregistered, ["b@example.com", "c@example.com"]);

    store
        .create(&student("CS101", "d@example.com").with_team(""))
        .unwrap();
    let teamless = store.list_by_team("", "CS101").unwrap();
    assert_eq!(teamless.len(), 1);
    assert_eq!(teamless[0].email, "d@example.com");
}

// ============================================================================
// SQLite backend
// ============================================================================

#[test]
fn test_sqlite_store_survives_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("roster.db");

    let token = {
        let store = StudentStore::new(SqliteStudentBackend::new(&path).unwrap(), codec());
        let legacy = store
            .create_without_existence_check(&student("CS101", "old@example.com"), RecordSpace::Legacy)
            .unwrap();
        store.copy("CS101", "old@example.com").unwrap();
        store.encoded_registration_key(&legacy).unwrap()
    };

    let store = StudentStore::new(SqliteStudentBackend::new(&path).unwrap(), codec());
    assert_eq!(
        store.representations("CS101", "old@example.com").unwrap(),
        [RecordSpace::Scoped, RecordSpace::Legacy]
    );
    let found = store.get_by_registration_key(&token).unwrap().unwrap();
    assert_eq!(found.last_name, "Hopper");

    store.move_to_scoped("CS101", "old@example.com").unwrap();
    assert_eq!(store.backend().count(RecordSpace::Scoped).unwrap(), 1);
    assert_eq!(store.backend().count(RecordSpace::Legacy).unwrap(), 0);
}

#[test]
fn test_sqlite_store_matches_memory_store() {
    let sqlite = StudentStore::new(SqliteStudentBackend::in_memory().unwrap(), codec());
    let memory = memory_store();

    for i in 0..5 {
        let new = student("CS101", &format!("s{i}@example.com"));
        let space = if i % 2 == 0 {
            RecordSpace::Legacy
        } else {
            RecordSpace::Scoped
        };
        sqlite.create_without_existence_check(&new, space).unwrap();
        memory.create_without_existence_check(&new, space).unwrap();
    }
    sqlite.move_to_scoped("CS101", "s0@example.com").unwrap();
    memory.move_to_scoped("CS101", "s0@example.com").unwrap();

    let emails = |records: Vec<StudentRecord>| -> Vec<String> {
        records.into_iter().map(|r| r.email).collect()
    };
    assert_eq!(
        emails(sqlite.list_all().unwrap()),
        emails(memory.list_all().unwrap())
    );
    assert_eq!(
        emails(sqlite.list_legacy().unwrap()),
        emails(memory.list_legacy().unwrap())
    );
}
