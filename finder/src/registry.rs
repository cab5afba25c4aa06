//! Immutable id → finder lookup built once at startup.

use std::{collections::BTreeMap, sync::Arc};

use tracing::{error, info};

use crate::{
    errors::FinderError,
    pipeline::{AnswerPipeline, Finder},
    reader::Reader,
    retriever::Retriever,
};

/// Finders keyed by sequential ids starting at 1.
#[derive(Clone, Default)]
pub struct FinderRegistry {
    finders: BTreeMap<u32, Arc<dyn AnswerPipeline>>,
}

impl FinderRegistry {
    /// Registers pipelines under ids `1..=n` in iteration order.
    pub fn from_pipelines(pipelines: impl IntoIterator<Item = Arc<dyn AnswerPipeline>>) -> Self {
        let finders = (1u32..).zip(pipelines).collect();
        Self { finders }
    }

    /// Builds one [`Finder`] per model, all sharing `retriever`.
    ///
    /// `load_reader` is called once per model identifier in order. An empty
    /// model list is logged and yields an empty registry.
    ///
    /// # Errors
    /// Propagates the first reader loading failure.
    pub fn build<F>(
        models: &[String],
        retriever: Arc<dyn Retriever>,
        mut load_reader: F,
    ) -> Result<Self, FinderError>
    where
        F: FnMut(&str) -> Result<Box<dyn Reader>, FinderError>,
    {
        if models.is_empty() {
            error!(
                "No model to load. Please specify one via MODEL_PATHS (e.g. 'deepset/bert-base-cased-squad2')"
            );
        }

        let mut finders: BTreeMap<u32, Arc<dyn AnswerPipeline>> = BTreeMap::new();
        for (id, model) in (1u32..).zip(models) {
            let reader = load_reader(model)?;
            finders.insert(id, Arc::new(Finder::new(reader, retriever.clone())));
            info!("Initialized Finder (ID={id}) with model '{model}'");
        }

        Ok(Self { finders })
    }

    pub fn get(&self, id: u32) -> Option<Arc<dyn AnswerPipeline>> {
        self.finders.get(&id).cloned()
    }

    /// Registered ids, ascending.
    pub fn ids(&self) -> Vec<u32> {
        self.finders.keys().copied().collect()
    }

    pub fn len(&self) -> usize {
        self.finders.len()
    }

    pub fn is_empty(&self) -> bool {
        self.finders.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use doc_store::{Document, Filters};

    use super::*;
    use crate::types::{Answer, FinderResponse, Passage};

    struct NoRetriever;

    impl Retriever for NoRetriever {
        fn retrieve(&self, _: &str, _: Option<&Filters>, _: usize) -> Result<Vec<Document>, FinderError> {
            Ok(Vec::new())
        }
    }

    struct NoReader;

    impl Reader for NoReader {
        fn predict(&self, _: &str, _: &[Passage], _: usize) -> Result<Vec<Answer>, FinderError> {
            Ok(Vec::new())
        }
    }

    #[test]
    fn ids_start_at_one_and_follow_model_order() {
        let models = vec!["a".to_string(), "b".to_string(), "c".to_string()];
        let mut loaded = Vec::new();
        let reg = FinderRegistry::build(&models, Arc::new(NoRetriever), |m| {
            loaded.push(m.to_string());
            Ok(Box::new(NoReader))
        })
        .unwrap();

        assert_eq!(reg.ids(), vec![1, 2, 3]);
        assert_eq!(loaded, models);
        assert!(reg.get(0).is_none());
        assert!(reg.get(4).is_none());
        assert!(reg.get(2).is_some());
    }

    #[test]
    fn single_model_yields_single_entry() {
        let reg = FinderRegistry::build(
            &["deepset/bert-base-cased-squad2".to_string()],
            Arc::new(NoRetriever),
            |_| Ok(Box::new(NoReader)),
        )
        .unwrap();
        assert_eq!(reg.len(), 1);
        assert_eq!(reg.ids(), vec![1]);

        let res = reg.get(1).unwrap().get_answers("q", None, 10, 5).unwrap();
        assert_eq!(res, FinderResponse::empty("q"));
    }

    #[test]
    fn no_models_is_not_fatal() {
        let reg = FinderRegistry::build(&[], Arc::new(NoRetriever), |_| {
            panic!("nothing to load")
        })
        .unwrap();
        assert!(reg.is_empty());
        assert!(reg.ids().is_empty());
    }

    #[test]
    fn reader_failure_propagates() {
        let res = FinderRegistry::build(&["broken".to_string()], Arc::new(NoRetriever), |_| {
            Err(FinderError::Config("boom".into()))
        });
        assert!(matches!(res, Err(FinderError::Config(_))));
    }
}
