//! Core data models.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Exact-match meta filters, e.g. `{"category": "got"}`.
pub type Filters = BTreeMap<String, String>;

/// A stored document (or, once retrieved, a paragraph of one).
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Document {
    pub id: String,
    pub text: String,
    #[serde(default)]
    pub meta: BTreeMap<String, String>,
}

impl Document {
    /// Creates a document with a random id and no meta.
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            text: text.into(),
            meta: BTreeMap::new(),
        }
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = id.into();
        self
    }

    pub fn with_meta(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.meta.insert(key.into(), value.into());
        self
    }

    /// Document name, stored under the `name` meta key.
    pub fn name(&self) -> Option<&str> {
        self.meta.get("name").map(String::as_str)
    }

    /// True when every filter pair is present in `meta` with the same value.
    pub fn matches(&self, filters: &Filters) -> bool {
        filters
            .iter()
            .all(|(k, v)| self.meta.get(k).is_some_and(|m| m == v))
    }
}
