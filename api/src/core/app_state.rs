use std::sync::Arc;

use doc_store::{DocumentStore, SqlDocumentStore, index_text_files};
use finder::{FarmReader, FinderRegistry, Reader, ReaderConfig, Retriever, TfidfRetriever};
use tracing::info;

use crate::{core::config::ApiConfig, error_handler::AppResult};

/// Shared state for all HTTP handlers.
#[derive(Clone)]
pub struct AppState {
    /// Finders by id; read-only once the server is up.
    pub registry: FinderRegistry,
}

impl AppState {
    pub fn new(registry: FinderRegistry) -> Self {
        Self { registry }
    }

    /// Opens the document store, fits the retriever and loads one reader per model.
    ///
    /// Blocking: model loading may download weights.
    pub fn from_config(cfg: &ApiConfig) -> AppResult<Self> {
        let store = SqlDocumentStore::connect(&cfg.database_url)?;
        if let Some(dir) = &cfg.documents_dir {
            index_text_files(&store, dir)?;
        }
        info!("Document store holds {} documents", store.get_document_count()?);

        let store: Arc<dyn DocumentStore> = Arc::new(store);
        let retriever: Arc<dyn Retriever> = Arc::new(TfidfRetriever::new(store)?);

        let registry = FinderRegistry::build(&cfg.model_paths, retriever, |model| {
            let reader_cfg = ReaderConfig::new(model)
                .with_batch_size(cfg.batch_size)
                .with_gpu(cfg.use_gpu);
            Ok(Box::new(FarmReader::load(reader_cfg)?) as Box<dyn Reader>)
        })?;

        Ok(Self::new(registry))
    }
}
