//! Typed error for the finder crate.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum FinderError {
    /// Errors from the underlying document store.
    #[error("document store error: {0}")]
    Store(#[from] doc_store::StoreError),

    /// Tensor / model errors from candle.
    #[error("model error: {0}")]
    Model(#[from] candle_core::Error),

    /// Tokenizer load or encode failures.
    #[error("tokenizer error: {0}")]
    Tokenizer(String),

    /// Model download failures from the Hugging Face hub.
    #[error("model hub error: {0}")]
    Hub(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Model `config.json` could not be parsed.
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    /// Invalid reader / retriever settings.
    #[error("config error: {0}")]
    Config(String),

    /// An index lock was poisoned by a panicking writer.
    #[error("retriever index lock poisoned")]
    Poisoned,
}
