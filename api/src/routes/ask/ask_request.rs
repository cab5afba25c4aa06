use finder::Filters;
use serde::Deserialize;

use crate::error_handler::{AppError, AppResult};

fn default_top_k_reader() -> usize {
    5
}

fn default_top_k_retriever() -> usize {
    10
}

/// Request payload for `/finders/{finder_id}/ask`.
///
/// The response is `finder::FinderResponse` as produced by the pipeline.
#[derive(Debug, Deserialize)]
pub struct AskRequest {
    /// Natural language question.
    pub question: String,
    /// Exact-match meta filters applied by the retriever.
    #[serde(default)]
    pub filters: Option<Filters>,
    /// Max answers returned by the reader.
    #[serde(default = "default_top_k_reader")]
    pub top_k_reader: usize,
    /// Max passages handed from the retriever to the reader.
    #[serde(default = "default_top_k_retriever")]
    pub top_k_retriever: usize,
}

impl AskRequest {
    pub fn validate(&self) -> AppResult<()> {
        if self.top_k_reader == 0 {
            return Err(AppError::Validation("top_k_reader must be > 0".into()));
        }
        if self.top_k_retriever == 0 {
            return Err(AppError::Validation("top_k_retriever must be > 0".into()));
        }
        Ok(())
    }
}
