//! Unified error type for the document store.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    /// SQLite failures (open, schema, query).
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// Filesystem errors while reading documents to index.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// The connection string could not be understood.
    #[error("unsupported database url: {0}")]
    InvalidUrl(String),

    /// The connection mutex was poisoned by a panicking writer.
    #[error("document store lock poisoned")]
    Poisoned,
}
