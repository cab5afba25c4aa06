//! Retriever → reader composition.

use std::sync::Arc;

use doc_store::Filters;
use tracing::{debug, info};

use crate::{
    errors::FinderError,
    reader::Reader,
    retriever::Retriever,
    types::{FinderResponse, Passage},
};

/// Anything that can answer a question end to end.
///
/// The HTTP layer only depends on this trait, so tests can register fakes.
pub trait AnswerPipeline: Send + Sync {
    fn get_answers(
        &self,
        question: &str,
        filters: Option<&Filters>,
        top_k_retriever: usize,
        top_k_reader: usize,
    ) -> Result<FinderResponse, FinderError>;
}

/// A reader paired with a (possibly shared) retriever.
pub struct Finder {
    reader: Box<dyn Reader>,
    retriever: Arc<dyn Retriever>,
}

impl Finder {
    pub fn new(reader: Box<dyn Reader>, retriever: Arc<dyn Retriever>) -> Self {
        Self { reader, retriever }
    }
}

impl AnswerPipeline for Finder {
    fn get_answers(
        &self,
        question: &str,
        filters: Option<&Filters>,
        top_k_retriever: usize,
        top_k_reader: usize,
    ) -> Result<FinderResponse, FinderError> {
        let documents = self.retriever.retrieve(question, filters, top_k_retriever)?;

        if documents.is_empty() {
            info!("Retriever did not return any documents. Skipping reader ...");
            return Ok(FinderResponse::empty(question));
        }

        let passages: Vec<Passage> = documents
            .into_iter()
            .map(|d| Passage {
                text: d.text,
                document_id: Some(d.id),
            })
            .collect();

        debug!(
            "Finder::get_answers passages={} top_k_reader={top_k_reader}",
            passages.len()
        );

        let answers = self.reader.predict(question, &passages, top_k_reader)?;
        Ok(FinderResponse {
            question: question.to_string(),
            answers,
        })
    }
}
