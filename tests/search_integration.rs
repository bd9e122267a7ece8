//! Integration tests for visibility-scoped comment search.
//!
//! Builds queries from instructor roles and runs them against the `SQLite`
//! FTS5 index, checking hits against the in-memory evaluation of the same
//! filter.

// Integration tests use expect/unwrap for simplicity - panics are acceptable in tests
#![allow(clippy::expect_used, clippy::unwrap_used)]

use roster::storage::SqliteCommentIndex;
use roster::{
    CommentDocument, CommentIndex, CommentSearchQueryBuilder, InstructorRole, QueryOptions,
    RoleResolver, SearchConfig, SearchQuery, StaticRoleResolver,
};
use std::sync::Arc;

const INSTRUCTOR: &str = "instructor.g";

fn resolver() -> StaticRoleResolver {
    StaticRoleResolver::new()
        .with_role(INSTRUCTOR, InstructorRole::new("CS101", "a@x.com"))
        .with_role(INSTRUCTOR, InstructorRole::new("CS102", "b@x.com"))
}

fn comment(
    id: &str,
    course: &str,
    giver: &str,
    recipient: &str,
    (to_receiver, to_instructor): (bool, bool),
    text: &str,
) -> CommentDocument {
    CommentDocument {
        id: id.to_string(),
        course_id: course.to_string(),
        giver_email: giver.to_string(),
        recipient_email: recipient.to_string(),
        is_visible_to_receiver: to_receiver,
        is_visible_to_instructor: to_instructor,
        searchable_text: text.to_string(),
    }
}

fn corpus() -> Vec<CommentDocument> {
    vec![
        // given by the instructor, hidden from everyone else
        comment("own", "CS101", "a@x.com", "s@x.com", (false, false), "great job overall"),
        // addressed to the instructor and visible to receivers
        comment("received", "CS102", "t@x.com", "b@x.com", (true, false), "great job mentoring"),
        // addressed to the instructor but hidden from receivers
        comment("hidden", "CS101", "t@x.com", "a@x.com", (false, false), "great job hidden"),
        // visible to all instructors
        comment("shared", "CS102", "t@x.com", "s@x.com", (false, true), "great job shared"),
        // course the instructor does not teach
        comment("foreign", "CS999", "a@x.com", "a@x.com", (true, true), "great job elsewhere"),
        // visible but does not match the text
        comment("off-topic", "CS101", "a@x.com", "s@x.com", (true, true), "needs improvement"),
    ]
}

fn indexed() -> SqliteCommentIndex {
    let index = SqliteCommentIndex::in_memory().unwrap();
    index.index_all(&corpus()).unwrap();
    index
}

fn hit_ids(index: &SqliteCommentIndex, query: &SearchQuery) -> Vec<String> {
    let mut ids: Vec<_> = index
        .search(query)
        .unwrap()
        .into_iter()
        .map(|h| h.document_id)
        .collect();
    ids.sort();
    ids
}

fn expected_ids(query: &SearchQuery) -> Vec<String> {
    let filter = query.filter();
    let mut ids: Vec<_> = corpus()
        .into_iter()
        .filter(|doc| filter.matches(doc))
        .map(|doc| doc.id)
        .collect();
    ids.sort();
    ids
}

#[test]
fn test_two_course_query_string() {
    let builder = CommentSearchQueryBuilder::new(resolver());
    let query = builder.build(INSTRUCTOR, "  great job ").unwrap();

    assert_eq!(
        query.to_query_string(),
        "courseId:(CS101 OR CS102) AND (giverEmail:(a@x.com OR b@x.com) OR \
         (recipientEmail:(a@x.com OR b@x.com) AND isVisibleToReceiver:true) OR \
         isVisibleToInstructor:true) AND searchableText:(great job)"
    );
}

#[test]
fn test_visibility_rules_against_index() {
    let index = indexed();
    let query = CommentSearchQueryBuilder::new(resolver())
        .build(INSTRUCTOR, "great job")
        .unwrap();

    let hits = hit_ids(&index, &query);
    assert_eq!(hits, ["own", "received", "shared"]);
    assert_eq!(hits, expected_ids(&query));
}

#[test]
fn test_user_without_roles_sees_nothing() {
    let index = indexed();
    let query = CommentSearchQueryBuilder::new(resolver())
        .build("stranger", "great job")
        .unwrap();

    assert!(query.to_query_string().starts_with("courseId:() AND"));
    assert!(query.filter().matches_nothing());
    assert!(index.search(&query).unwrap().is_empty());
}

#[test]
fn test_blank_text_returns_all_visible() {
    let index = indexed();
    let query = CommentSearchQueryBuilder::new(resolver())
        .build(INSTRUCTOR, "   ")
        .unwrap();

    let hits = hit_ids(&index, &query);
    assert_eq!(hits, ["off-topic", "own", "received", "shared"]);
    assert_eq!(hits, expected_ids(&query));
}

#[test]
fn test_pagination_from_config() {
    let config = SearchConfig {
        default_limit: 2,
        max_limit: 3,
    };
    let index = indexed().with_max_limit(config.max_limit);
    let builder = CommentSearchQueryBuilder::new(resolver()).with_search_config(&config);

    let first = builder.build(INSTRUCTOR, "great").unwrap();
    assert_eq!(index.search(&first).unwrap().len(), 2);

    let rest = builder
        .build_with_options(INSTRUCTOR, "great", QueryOptions::new(2, 2))
        .unwrap();
    assert_eq!(index.search(&rest).unwrap().len(), 1);

    // blank text sees four comments but the index caps the page at three
    let capped = builder
        .build_with_options(INSTRUCTOR, "", QueryOptions::new(50, 0))
        .unwrap();
    assert_eq!(index.search(&capped).unwrap().len(), 3);
}

#[test]
fn test_shared_resolver() {
    let resolver: Arc<dyn RoleResolver> = Arc::new(resolver());
    let builder = CommentSearchQueryBuilder::new(Arc::clone(&resolver));

    let query = builder.build(INSTRUCTOR, "shared").unwrap();
    assert_eq!(hit_ids(&indexed(), &query), ["shared"]);
    assert_eq!(resolver.roles_for(INSTRUCTOR).unwrap().len(), 2);
}

#[test]
fn test_removed_comment_disappears() {
    let index = indexed();
    let query = CommentSearchQueryBuilder::new(resolver())
        .build(INSTRUCTOR, "great job")
        .unwrap();

    assert!(index.remove("own").unwrap());
    assert_eq!(hit_ids(&index, &query), ["received", "shared"]);
}

#[test]
fn test_punctuated_text_matches_memory_filter() {
    let index = indexed();
    let builder = CommentSearchQueryBuilder::new(resolver());

    for text in ["job!", "great !!", "great -", "\"shared\"", "job, overall."] {
        let query = builder.build(INSTRUCTOR, text).unwrap();
        let hits = hit_ids(&index, &query);
        assert_eq!(hits, expected_ids(&query), "text {text:?}");
    }

    let query = builder.build(INSTRUCTOR, "job!").unwrap();
    assert_eq!(hit_ids(&index, &query), ["own", "received", "shared"]);
}
