//! Retriever + reader question answering.
//!
//! A [`Finder`] chains a [`Retriever`] (narrows the document store down to a
//! few candidate paragraphs) with a [`Reader`] (extracts answer spans from
//! them). Finders are collected into an immutable [`FinderRegistry`] keyed by
//! sequential ids, which is what the HTTP layer serves.

mod errors;
mod pipeline;
mod registry;
mod types;

pub mod reader;
pub mod retriever;

pub use doc_store::{Document, Filters};
pub use errors::FinderError;
pub use pipeline::{AnswerPipeline, Finder};
pub use reader::{FarmReader, Reader, ReaderConfig};
pub use registry::FinderRegistry;
pub use retriever::{Retriever, TfidfRetriever};
pub use types::{Answer, FinderResponse, Passage};
