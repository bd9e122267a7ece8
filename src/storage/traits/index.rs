//! Comment search index trait.
//!
//! The index is the search engine adapter. It evaluates a structured
//! [`SearchQuery`] (field filters plus free text) with the query's
//! pagination options and returns ranked document references.
//!
//! Visibility is entirely the query's concern: the index applies whatever
//! filter it is handed, so a query built from an empty role set returns no
//! hits rather than everything.

use crate::Result;
use crate::models::{CommentDocument, SearchHit, SearchQuery};

/// Trait for comment search backends.
pub trait CommentIndex: Send + Sync {
    /// Indexes or re-indexes a comment document.
    fn index(&self, document: &CommentDocument) -> Result<()>;

    /// Removes a document from the index.
    ///
    /// Returns true if a document was removed.
    fn remove(&self, id: &str) -> Result<bool>;

    /// Evaluates a query and returns hits ordered by relevance.
    fn search(&self, query: &SearchQuery) -> Result<Vec<SearchHit>>;

    /// Indexes several documents.
    fn index_all(&self, documents: &[CommentDocument]) -> Result<()> {
        for document in documents {
            self.index(document)?;
        }
        Ok(())
    }
}
