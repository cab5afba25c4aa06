//! Document storage for the QA finder.
//!
//! The crate exposes a small [`DocumentStore`] trait and a SQLite
//! implementation ([`SqlDocumentStore`]). Documents carry free text plus a flat
//! string-to-string meta map which is what request filters match against.

mod document;
mod errors;
mod files;
mod sql;

pub use document::{Document, Filters};
pub use errors::StoreError;
pub use files::index_text_files;
pub use sql::SqlDocumentStore;

/// Storage backend used by retrievers.
///
/// Implementations must be shareable across request threads.
pub trait DocumentStore: Send + Sync {
    /// Inserts documents, replacing any existing document with the same id.
    /// Returns the number of rows written.
    fn write_documents(&self, docs: &[Document]) -> Result<usize, StoreError>;

    /// Returns every stored document ordered by insertion.
    fn get_all_documents(&self) -> Result<Vec<Document>, StoreError>;

    fn get_document_by_id(&self, id: &str) -> Result<Option<Document>, StoreError>;

    fn get_document_count(&self) -> Result<usize, StoreError>;

    /// Returns documents whose meta matches every `key == value` pair.
    /// An empty filter set matches everything.
    fn query(&self, filters: &Filters) -> Result<Vec<Document>, StoreError> {
        let all = self.get_all_documents()?;
        Ok(all.into_iter().filter(|d| d.matches(filters)).collect())
    }
}
