//! SQL construction for `SQLite` backends.
//!
//! Every user-supplied value is bound through a numbered parameter
//! (`?1`, `?2`, ...). Builders take the first free parameter index and
//! return the next one so clauses can be chained.

use crate::models::{QueryExpr, RecordPredicate, SearchField, text_terms};

/// Bound parameter value. Booleans are rendered as integer literals and
/// never need binding, so every parameter is text.
pub type SqlParam = String;

/// Builds the condition selecting student rows for a predicate.
///
/// Returns `(condition, params, next_idx)`. The condition is suitable for a
/// `WHERE` clause; [`RecordPredicate::All`] yields `1`.
///
/// # Examples
///
/// ```ignore
/// let predicate = RecordPredicate::Team { course_id: "CS101".into(), team: "T1".into() };
/// let (clause, params, next_idx) = build_predicate_clause(&predicate, 1);
/// // clause = "course_id = ?1 AND team = ?2"
/// // params = ["CS101", "T1"]
/// // next_idx = 3
/// ```
#[must_use]
pub fn build_predicate_clause(
    predicate: &RecordPredicate,
    start_param: usize,
) -> (String, Vec<SqlParam>, usize) {
    let mut conditions = Vec::new();
    let mut params = Vec::new();
    let mut param_idx = start_param;

    let mut bind = |column: &str, value: &str| {
        conditions.push(format!("{column} = ?{param_idx}"));
        params.push(value.to_string());
        param_idx += 1;
    };

    match predicate {
        RecordPredicate::All => {},
        RecordPredicate::Course(course_id) => bind("course_id", course_id),
        RecordPredicate::CourseEmail { course_id, email } => {
            bind("course_id", course_id);
            bind("email", email);
        },
        RecordPredicate::CourseGoogleId {
            course_id,
            google_id,
        } => {
            bind("course_id", course_id);
            bind("google_id", google_id);
        },
        RecordPredicate::GoogleId(google_id) => bind("google_id", google_id),
        RecordPredicate::Team { course_id, team } => {
            bind("course_id", course_id);
            bind("team", team);
        },
        RecordPredicate::Unregistered(course_id) => {
            bind("course_id", course_id);
            bind("google_id", "");
        },
        RecordPredicate::RegistrationKey(key) => bind("registration_key", key.as_str()),
    }

    let clause = if conditions.is_empty() {
        "1".to_string()
    } else {
        conditions.join(" AND ")
    };
    (clause, params, param_idx)
}

/// Column of the `comments` table (aliased `c`) backing a search field.
const fn column(field: SearchField) -> &'static str {
    match field {
        SearchField::CourseId => "c.course_id",
        SearchField::GiverEmail => "c.giver_email",
        SearchField::RecipientEmail => "c.recipient_email",
        SearchField::IsVisibleToReceiver => "c.is_visible_to_receiver",
        SearchField::IsVisibleToInstructor => "c.is_visible_to_instructor",
        SearchField::SearchableText => "c.searchable_text",
    }
}

/// Translates a query expression into a condition over `comments c`.
///
/// Returns `(condition, params, next_idx)`. An empty [`QueryExpr::AnyOf`]
/// becomes `0`, so a disjunction with no members matches nothing. A text
/// match with no terms becomes `1`. Text matches are resolved through the
/// `comments_fts` table.
#[must_use]
pub fn build_expr_clause(expr: &QueryExpr, start_param: usize) -> (String, Vec<SqlParam>, usize) {
    let mut params = Vec::new();
    let mut param_idx = start_param;
    let clause = render_expr(expr, &mut params, &mut param_idx);
    (clause, params, param_idx)
}

fn render_expr(expr: &QueryExpr, params: &mut Vec<SqlParam>, param_idx: &mut usize) -> String {
    match expr {
        QueryExpr::AnyOf { values, .. } if values.is_empty() => "0".to_string(),
        QueryExpr::AnyOf { field, values } => {
            let placeholders: Vec<String> = values
                .iter()
                .map(|v| {
                    let p = format!("?{param_idx}");
                    *param_idx += 1;
                    params.push(v.clone());
                    p
                })
                .collect();
            format!("{} IN ({})", column(*field), placeholders.join(","))
        },
        QueryExpr::Flag { field, value } => {
            format!("{} = {}", column(*field), i32::from(*value))
        },
        QueryExpr::Text { query, .. } => fts_match_expression(query).map_or_else(
            || "1".to_string(),
            |matcher| {
                let clause = format!(
                    "c.rowid IN (SELECT rowid FROM comments_fts WHERE comments_fts MATCH ?{param_idx})"
                );
                *param_idx += 1;
                params.push(matcher);
                clause
            },
        ),
        QueryExpr::And(children) | QueryExpr::Or(children) => {
            let (op, identity) = if matches!(expr, QueryExpr::And(_)) {
                (" AND ", "1")
            } else {
                (" OR ", "0")
            };
            if children.is_empty() {
                return identity.to_string();
            }
            let parts: Vec<String> = children
                .iter()
                .map(|child| format!("({})", render_expr(child, params, param_idx)))
                .collect();
            parts.join(op)
        },
    }
}

/// Builds an FTS5 `MATCH` expression requiring every term of `query`.
///
/// Terms come from [`text_terms`], the same split the in-memory evaluator
/// uses, and each is wrapped in double quotes so FTS5 keywords in user input
/// are matched literally. Returns `None` when the query has no terms.
#[must_use]
pub fn fts_match_expression(query: &str) -> Option<String> {
    let terms: Vec<String> = text_terms(query)
        .into_iter()
        .map(|term| format!("\"{term}\""))
        .collect();
    if terms.is_empty() {
        None
    } else {
        Some(terms.join(" "))
    }
}
