//! TF-IDF paragraph retriever.
//!
//! Documents are split into paragraphs on blank lines and each paragraph is
//! weighted with smoothed idf (`ln((1 + n) / (1 + df)) + 1`) over raw term
//! counts, then L2-normalized. A query is scored against every paragraph by
//! dot product.

use std::{
    collections::{BTreeMap, HashMap},
    sync::{Arc, LazyLock, RwLock},
};

use doc_store::{Document, DocumentStore, Filters};
use regex::Regex;
use tracing::{debug, info, trace};

use crate::{errors::FinderError, retriever::Retriever};

/// Two or more word characters.
static TOKEN_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?u)\b\w\w+\b").unwrap());

fn tokenize(text: &str) -> impl Iterator<Item = String> + '_ {
    TOKEN_RE.find_iter(text).map(|m| m.as_str().to_lowercase())
}

#[derive(Debug)]
struct Paragraph {
    document_id: String,
    text: String,
    meta: BTreeMap<String, String>,
}

/// Sparse L2-normalized vector: `(term index, weight)` sorted by term index.
type SparseVec = Vec<(usize, f32)>;

#[derive(Debug, Default)]
struct TfidfIndex {
    paragraphs: Vec<Paragraph>,
    vocab: HashMap<String, usize>,
    idf: Vec<f32>,
    vectors: Vec<SparseVec>,
}

impl TfidfIndex {
    fn build(docs: Vec<Document>) -> Self {
        let paragraphs: Vec<Paragraph> = docs
            .into_iter()
            .flat_map(|doc| {
                let Document { id, text, meta } = doc;
                text.split("\n\n")
                    .map(str::trim)
                    .filter(|p| !p.is_empty())
                    .map(|p| Paragraph {
                        document_id: id.clone(),
                        text: p.to_string(),
                        meta: meta.clone(),
                    })
                    .collect::<Vec<_>>()
            })
            .collect();

        let mut vocab: HashMap<String, usize> = HashMap::new();
        let mut df: Vec<usize> = Vec::new();
        let mut counts: Vec<HashMap<usize, usize>> = Vec::with_capacity(paragraphs.len());

        for p in &paragraphs {
            let mut tf: HashMap<usize, usize> = HashMap::new();
            for tok in tokenize(&p.text) {
                let next = vocab.len();
                let idx = *vocab.entry(tok).or_insert(next);
                if idx == df.len() {
                    df.push(0);
                }
                *tf.entry(idx).or_default() += 1;
            }
            for idx in tf.keys() {
                df[*idx] += 1;
            }
            counts.push(tf);
        }

        let n = paragraphs.len() as f32;
        let idf: Vec<f32> = df
            .iter()
            .map(|&d| ((1.0 + n) / (1.0 + d as f32)).ln() + 1.0)
            .collect();

        let vectors = counts
            .into_iter()
            .map(|tf| weigh(tf.into_iter(), &idf))
            .collect();

        Self {
            paragraphs,
            vocab,
            idf,
            vectors,
        }
    }

    fn vectorize(&self, text: &str) -> SparseVec {
        let mut tf: HashMap<usize, usize> = HashMap::new();
        for tok in tokenize(text) {
            if let Some(&idx) = self.vocab.get(&tok) {
                *tf.entry(idx).or_default() += 1;
            }
        }
        weigh(tf.into_iter(), &self.idf)
    }
}

fn weigh(tf: impl Iterator<Item = (usize, usize)>, idf: &[f32]) -> SparseVec {
    let mut v: SparseVec = tf.map(|(i, c)| (i, c as f32 * idf[i])).collect();
    let norm = v.iter().map(|(_, w)| w * w).sum::<f32>().sqrt();
    if norm > 0.0 {
        for (_, w) in v.iter_mut() {
            *w /= norm;
        }
    }
    v.sort_by_key(|(i, _)| *i);
    v
}

fn dot(a: &SparseVec, b: &SparseVec) -> f32 {
    let (mut i, mut j, mut acc) = (0, 0, 0.0);
    while i < a.len() && j < b.len() {
        match a[i].0.cmp(&b[j].0) {
            std::cmp::Ordering::Less => i += 1,
            std::cmp::Ordering::Greater => j += 1,
            std::cmp::Ordering::Equal => {
                acc += a[i].1 * b[j].1;
                i += 1;
                j += 1;
            }
        }
    }
    acc
}

/// TF-IDF retriever over all paragraphs of a document store.
pub struct TfidfRetriever {
    store: Arc<dyn DocumentStore>,
    index: RwLock<TfidfIndex>,
}

impl TfidfRetriever {
    /// Creates the retriever and fits it on the current store contents.
    ///
    /// # Errors
    /// Returns `FinderError::Store` if documents cannot be read.
    pub fn new(store: Arc<dyn DocumentStore>) -> Result<Self, FinderError> {
        let retriever = Self {
            store,
            index: RwLock::new(TfidfIndex::default()),
        };
        retriever.fit()?;
        Ok(retriever)
    }

    /// Rebuilds the index from the store. Call after writing new documents.
    pub fn fit(&self) -> Result<(), FinderError> {
        let docs = self.store.get_all_documents()?;
        let doc_count = docs.len();
        let index = TfidfIndex::build(docs);
        info!(
            "TfidfRetriever fitted on {} paragraphs from {} documents (vocab={})",
            index.paragraphs.len(),
            doc_count,
            index.vocab.len()
        );
        *self.index.write().map_err(|_| FinderError::Poisoned)? = index;
        Ok(())
    }

    #[cfg(test)]
    fn paragraph_count(&self) -> usize {
        self.index.read().map(|i| i.paragraphs.len()).unwrap_or(0)
    }
}

impl Retriever for TfidfRetriever {
    fn retrieve(
        &self,
        query: &str,
        filters: Option<&Filters>,
        top_k: usize,
    ) -> Result<Vec<Document>, FinderError> {
        let index = self.index.read().map_err(|_| FinderError::Poisoned)?;
        let qv = index.vectorize(query);

        let mut scored: Vec<(usize, f32)> = index
            .paragraphs
            .iter()
            .enumerate()
            .filter(|(_, p)| filters.is_none_or(|f| {
                f.iter().all(|(k, v)| p.meta.get(k).is_some_and(|m| m == v))
            }))
            .map(|(i, _)| (i, dot(&qv, &index.vectors[i])))
            .collect();

        // Stable sort keeps paragraph order for equal scores.
        scored.sort_by(|a, b| b.1.total_cmp(&a.1));
        scored.truncate(top_k);

        trace!(
            "TfidfRetriever::retrieve top scores={:?}",
            scored.iter().map(|(_, s)| *s).collect::<Vec<_>>()
        );
        debug!(
            "TfidfRetriever::retrieve query={query:?} hits={} filters={}",
            scored.len(),
            filters.map_or(0, |f| f.len())
        );

        Ok(scored
            .into_iter()
            .map(|(i, _)| {
                let p = &index.paragraphs[i];
                Document {
                    id: p.document_id.clone(),
                    text: p.text.clone(),
                    meta: p.meta.clone(),
                }
            })
            .collect())
    }
}
