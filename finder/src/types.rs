//! Request-independent answer models shared by readers and the HTTP layer.

use serde::{Deserialize, Serialize};

/// A candidate paragraph handed from the retriever to the reader.
#[derive(Clone, Debug)]
pub struct Passage {
    pub text: String,
    pub document_id: Option<String>,
}

/// A single extracted answer.
///
/// `offset_start`/`offset_end` are character offsets into `context`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Answer {
    pub answer: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub score: Option<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub probability: Option<f32>,
    pub context: String,
    pub offset_start: usize,
    pub offset_end: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub document_id: Option<String>,
}

impl Answer {
    /// True when the offsets address a valid span of `context`.
    pub fn offsets_in_context(&self) -> bool {
        self.offset_start <= self.offset_end && self.offset_end <= self.context.chars().count()
    }
}

/// Output of a finder: the asked question plus ranked answers.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FinderResponse {
    pub question: String,
    pub answers: Vec<Answer>,
}

impl FinderResponse {
    pub fn empty(question: impl Into<String>) -> Self {
        Self {
            question: question.into(),
            answers: Vec::new(),
        }
    }
}
