//! Comment search documents, query expressions and options.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Searchable fields of a comment document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SearchField {
    /// Course the comment belongs to.
    CourseId,
    /// Email of the comment giver.
    GiverEmail,
    /// Email of the response recipient.
    RecipientEmail,
    /// Whether the recipient may see the comment.
    IsVisibleToReceiver,
    /// Whether instructors may see the comment.
    IsVisibleToInstructor,
    /// Free-text body.
    SearchableText,
}

impl SearchField {
    /// Returns the field name used in rendered queries.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::CourseId => "courseId",
            Self::GiverEmail => "giverEmail",
            Self::RecipientEmail => "recipientEmail",
            Self::IsVisibleToReceiver => "isVisibleToReceiver",
            Self::IsVisibleToInstructor => "isVisibleToInstructor",
            Self::SearchableText => "searchableText",
        }
    }
}

impl fmt::Display for SearchField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A feedback response comment as seen by the search engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommentDocument {
    /// Document id.
    pub id: String,
    /// Course id.
    pub course_id: String,
    /// Email of the comment giver.
    pub giver_email: String,
    /// Email of the response recipient.
    pub recipient_email: String,
    /// Visible to the response recipient.
    pub is_visible_to_receiver: bool,
    /// Visible to instructors of the course.
    pub is_visible_to_instructor: bool,
    /// Text matched by free-text queries.
    pub searchable_text: String,
}

/// Boolean filter over comment documents.
///
/// An empty [`QueryExpr::AnyOf`] is a disjunction with no members and
/// matches nothing; it is rendered as `field:()`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QueryExpr {
    /// `field` equals one of `values`.
    AnyOf {
        /// Field to test.
        field: SearchField,
        /// Accepted values.
        values: Vec<String>,
    },
    /// Boolean `field` equals `value`.
    Flag {
        /// Field to test.
        field: SearchField,
        /// Expected value.
        value: bool,
    },
    /// Free-text match against `field`; every term must appear.
    Text {
        /// Text field.
        field: SearchField,
        /// Raw query text.
        query: String,
    },
    /// All children hold.
    And(Vec<Self>),
    /// At least one child holds.
    Or(Vec<Self>),
}

impl QueryExpr {
    /// Builds a disjunction of values for one field.
    #[must_use]
    pub fn any_of<I, S>(field: SearchField, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::AnyOf {
            field,
            values: values.into_iter().map(Into::into).collect(),
        }
    }

    /// Builds a boolean field test.
    #[must_use]
    pub const fn flag(field: SearchField, value: bool) -> Self {
        Self::Flag { field, value }
    }

    /// Builds a free-text match.
    #[must_use]
    pub fn text(field: SearchField, query: impl Into<String>) -> Self {
        Self::Text {
            field,
            query: query.into(),
        }
    }

    /// Returns true if no document can satisfy the expression.
    #[must_use]
    pub fn matches_nothing(&self) -> bool {
        match self {
            Self::AnyOf { values, .. } => values.is_empty(),
            Self::Flag { .. } | Self::Text { .. } => false,
            Self::And(children) => children.iter().any(Self::matches_nothing),
            Self::Or(children) => children.iter().all(Self::matches_nothing),
        }
    }

    /// Evaluates the expression against a document.
    #[must_use]
    pub fn matches(&self, doc: &CommentDocument) -> bool {
        match self {
            Self::AnyOf { field, values } => {
                let actual = match field {
                    SearchField::CourseId => doc.course_id.as_str(),
                    SearchField::GiverEmail => doc.giver_email.as_str(),
                    SearchField::RecipientEmail => doc.recipient_email.as_str(),
                    SearchField::SearchableText => doc.searchable_text.as_str(),
                    SearchField::IsVisibleToReceiver | SearchField::IsVisibleToInstructor => {
                        return false;
                    },
                };
                values.iter().any(|v| v == actual)
            },
            Self::Flag { field, value } => match field {
                SearchField::IsVisibleToReceiver => doc.is_visible_to_receiver == *value,
                SearchField::IsVisibleToInstructor => doc.is_visible_to_instructor == *value,
                _ => false,
            },
            Self::Text { query, .. } => {
                let words = text_terms(&doc.searchable_text);
                text_terms(query).iter().all(|term| words.contains(term))
            },
            Self::And(children) => children.iter().all(|c| c.matches(doc)),
            Self::Or(children) => children.iter().any(|c| c.matches(doc)),
        }
    }

    fn fmt_child(&self, f: &mut fmt::Formatter<'_>, parent_is_and: bool) -> fmt::Result {
        let needs_parens = match self {
            Self::And(_) => !parent_is_and,
            Self::Or(_) => parent_is_and,
            _ => false,
        };
        if needs_parens {
            write!(f, "({self})")
        } else {
            write!(f, "{self}")
        }
    }
}

/// Splits text into lower-cased alphanumeric terms.
///
/// Both document text and free-text queries go through this, so punctuation
/// never forms part of a term.
#[must_use]
pub fn text_terms(text: &str) -> Vec<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty())
        .map(str::to_lowercase)
        .collect()
}

fn render_value(value: &str) -> String {
    if value.is_empty() || value.contains(|c: char| c.is_whitespace() || "()\":".contains(c)) {
        format!("\"{}\"", value.replace('"', "\\\""))
    } else {
        value.to_string()
    }
}

impl fmt::Display for QueryExpr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::AnyOf { field, values } => {
                let rendered: Vec<String> = values.iter().map(|v| render_value(v)).collect();
                write!(f, "{field}:({})", rendered.join(" OR "))
            },
            Self::Flag { field, value } => write!(f, "{field}:{value}"),
            Self::Text { field, query } => write!(f, "{field}:({})", query.trim()),
            Self::And(children) | Self::Or(children) => {
                let is_and = matches!(self, Self::And(_));
                let op = if is_and { " AND " } else { " OR " };
                for (i, child) in children.iter().enumerate() {
                    if i > 0 {
                        f.write_str(op)?;
                    }
                    child.fmt_child(f, is_and)?;
                }
                Ok(())
            },
        }
    }
}

/// Pagination options passed through to the search engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueryOptions {
    /// Maximum number of hits to return.
    pub limit: usize,
    /// Number of hits to skip.
    pub offset: usize,
}

impl QueryOptions {
    /// Default page size.
    pub const DEFAULT_LIMIT: usize = 20;

    /// Creates options for one page.
    #[must_use]
    pub const fn new(limit: usize, offset: usize) -> Self {
        Self { limit, offset }
    }
}

impl Default for QueryOptions {
    fn default() -> Self {
        Self::new(Self::DEFAULT_LIMIT, 0)
    }
}

/// A structured comment search: visibility filter, free text, options.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchQuery {
    /// Access-control filter derived from the caller's roles.
    pub visibility: QueryExpr,
    /// Free-text part against [`SearchField::SearchableText`].
    pub text: QueryExpr,
    /// Pagination options.
    pub options: QueryOptions,
}

impl SearchQuery {
    /// Returns the full filter: visibility conjoined with the text match.
    #[must_use]
    pub fn filter(&self) -> QueryExpr {
        QueryExpr::And(vec![self.visibility.clone(), self.text.clone()])
    }

    /// Renders the full filter in document-query syntax.
    #[must_use]
    pub fn to_query_string(&self) -> String {
        self.filter().to_string()
    }

    /// Returns the raw free-text query.
    #[must_use]
    pub fn text_query(&self) -> &str {
        match self.text {
            QueryExpr::Text { ref query, .. } => query,
            _ => "",
        }
    }
}

impl fmt::Display for SearchQuery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.filter())
    }
}

/// A single search hit.
#[derive(Debug, Clone, PartialEq)]
pub struct SearchHit {
    /// Id of the matching document.
    pub document_id: String,
    /// Relevance score (0.0 to 1.0).
    pub score: f32,
}
