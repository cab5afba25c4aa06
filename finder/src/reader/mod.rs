//! Reading-comprehension abstraction and settings.

use crate::{
    errors::FinderError,
    types::{Answer, Passage},
};

mod farm;
mod spans;

pub use farm::FarmReader;

/// Extracts answer spans from candidate passages.
pub trait Reader: Send + Sync {
    /// Returns at most `top_k` answers across all `passages`, best first.
    fn predict(
        &self,
        question: &str,
        passages: &[Passage],
        top_k: usize,
    ) -> Result<Vec<Answer>, FinderError>;
}

/// Settings for [`FarmReader`].
#[derive(Clone, Debug)]
pub struct ReaderConfig {
    /// Local model directory or Hugging Face model id.
    pub model: String,
    /// Number of windows per forward pass.
    pub batch_size: usize,
    /// Use the first CUDA device when available.
    pub use_gpu: bool,
    /// Tokens per window including `[CLS]`, question and both `[SEP]`s.
    pub max_seq_len: usize,
    /// Token step between consecutive windows of a long passage.
    pub doc_stride: usize,
    /// Question tokens kept; the rest is truncated.
    pub max_query_len: usize,
    /// Longest answer span in tokens.
    pub max_answer_len: usize,
    /// Spans kept per window before global ranking.
    pub top_k_per_candidate: usize,
    /// Characters of passage text returned around each answer.
    pub context_window_size: usize,
}

impl ReaderConfig {
    pub fn new(model: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            batch_size: 16,
            use_gpu: false,
            max_seq_len: 256,
            doc_stride: 128,
            max_query_len: 64,
            max_answer_len: 30,
            top_k_per_candidate: 3,
            context_window_size: 150,
        }
    }

    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size;
        self
    }

    pub fn with_gpu(mut self, use_gpu: bool) -> Self {
        self.use_gpu = use_gpu;
        self
    }

    /// Validates config values.
    pub fn validate(&self) -> Result<(), FinderError> {
        if self.model.trim().is_empty() {
            return Err(FinderError::Config("model is empty".into()));
        }
        if self.batch_size == 0 {
            return Err(FinderError::Config("batch_size must be > 0".into()));
        }
        if self.max_seq_len <= self.max_query_len + 3 {
            return Err(FinderError::Config(
                "max_seq_len must leave room for passage tokens".into(),
            ));
        }
        if self.doc_stride == 0 {
            return Err(FinderError::Config("doc_stride must be > 0".into()));
        }
        if self.max_answer_len == 0 || self.top_k_per_candidate == 0 {
            return Err(FinderError::Config(
                "max_answer_len and top_k_per_candidate must be > 0".into(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let cfg = ReaderConfig::new("deepset/bert-base-cased-squad2");
        assert!(cfg.validate().is_ok());
        assert_eq!(cfg.batch_size, 16);
        assert!(!cfg.use_gpu);
    }

    #[test]
    fn rejects_degenerate_settings() {
        assert!(ReaderConfig::new(" ").validate().is_err());
        assert!(ReaderConfig::new("m").with_batch_size(0).validate().is_err());

        let mut cfg = ReaderConfig::new("m");
        cfg.max_seq_len = 60;
        assert!(cfg.validate().is_err());

        let mut cfg = ReaderConfig::new("m");
        cfg.doc_stride = 0;
        assert!(cfg.validate().is_err());
    }
}
