//! Retrieval abstraction.

use doc_store::{Document, Filters};

use crate::errors::FinderError;

mod tfidf;

pub use tfidf::TfidfRetriever;

/// Selects candidate paragraphs for a question.
///
/// Implement this trait to plug in another retrieval backend.
pub trait Retriever: Send + Sync {
    /// Returns at most `top_k` documents ranked by relevance to `query`,
    /// restricted to documents whose meta matches `filters`.
    fn retrieve(
        &self,
        query: &str,
        filters: Option<&Filters>,
        top_k: usize,
    ) -> Result<Vec<Document>, FinderError>;
}
