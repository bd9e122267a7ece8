//! Visibility-scoped comment search query construction.
//!
//! A caller may see a comment in any course where they hold an instructor
//! role if they gave it, if they received the response and the comment is
//! visible to receivers, or if it is visible to instructors:
//!
//! ```text
//! courseId:(<courses>) AND (giverEmail:(<emails>)
//!     OR (recipientEmail:(<emails>) AND isVisibleToReceiver:true)
//!     OR isVisibleToInstructor:true) AND searchableText:(<text>)
//! ```

use super::roles::RoleResolver;
use crate::Result;
use crate::config::SearchConfig;
use crate::models::{InstructorRole, QueryExpr, QueryOptions, SearchField, SearchQuery};
use tracing::instrument;

/// Builds [`SearchQuery`] values restricted to what a user may see.
///
/// Stateless apart from the injected resolver; safe to share across threads.
#[derive(Debug, Clone)]
pub struct CommentSearchQueryBuilder<R: RoleResolver> {
    resolver: R,
    default_options: QueryOptions,
}

impl<R: RoleResolver> CommentSearchQueryBuilder<R> {
    /// Creates a builder using default pagination.
    pub fn new(resolver: R) -> Self {
        Self {
            resolver,
            default_options: QueryOptions::default(),
        }
    }

    /// Takes the default page size from `config`.
    #[must_use]
    pub const fn with_search_config(mut self, config: &SearchConfig) -> Self {
        self.default_options = QueryOptions::new(config.default_limit, 0);
        self
    }

    /// Returns the role resolver.
    pub const fn resolver(&self) -> &R {
        &self.resolver
    }

    /// Builds a query for `user_id` with default pagination.
    ///
    /// # Errors
    ///
    /// Returns an error if role resolution fails.
    pub fn build(&self, user_id: &str, text: &str) -> Result<SearchQuery> {
        self.build_with_options(user_id, text, self.default_options)
    }

    /// Builds a query for `user_id`.
    ///
    /// A user with no roles gets a course filter with no members, which
    /// matches nothing.
    ///
    /// # Errors
    ///
    /// Returns an error if role resolution fails.
    #[instrument(skip(self, text), fields(operation = "build_search_query", roles = tracing::field::Empty))]
    pub fn build_with_options(
        &self,
        user_id: &str,
        text: &str,
        options: QueryOptions,
    ) -> Result<SearchQuery> {
        let roles = self.resolver.roles_for(user_id)?;
        tracing::Span::current().record("roles", roles.len());
        if roles.is_empty() {
            tracing::debug!(user_id, "user holds no instructor roles; query matches nothing");
        }

        Ok(SearchQuery {
            visibility: visibility_filter(&roles),
            text: QueryExpr::text(SearchField::SearchableText, text.trim()),
            options,
        })
    }
}

/// Composes the visibility filter for a set of roles.
#[must_use]
pub fn visibility_filter(roles: &[InstructorRole]) -> QueryExpr {
    let course_ids = distinct(roles.iter().map(|r| r.course_id.as_str()));
    let emails = distinct(roles.iter().map(|r| r.email.as_str()));

    QueryExpr::And(vec![
        QueryExpr::any_of(SearchField::CourseId, course_ids),
        QueryExpr::Or(vec![
            QueryExpr::any_of(SearchField::GiverEmail, emails.clone()),
            QueryExpr::And(vec![
                QueryExpr::any_of(SearchField::RecipientEmail, emails),
                QueryExpr::flag(SearchField::IsVisibleToReceiver, true),
            ]),
            QueryExpr::flag(SearchField::IsVisibleToInstructor, true),
        ]),
    ])
}

/// Removes duplicates, keeping first-seen order.
fn distinct<'a>(values: impl Iterator<Item = &'a str>) -> Vec<String> {
    let mut out: Vec<String> = Vec::new();
    for value in values {
        if !out.iter().any(|v| v == value) {
            out.push(value.to_string());
        }
    }
    out
}
