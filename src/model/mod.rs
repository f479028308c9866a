pub mod consistency;
pub mod query;
pub mod semantic_layer;

pub use consistency::Inconsistency;
pub use query::{DateGrain, Filter, FilterOperator, FilterValue, QueryJson};
pub use semantic_layer::{
    DimensionDefinition, JoinDefinition, MetricDefinition, SemanticLayerJson,
};

use serde::{de, Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Separator between model identifier and query text in persisted keys.
pub const KEY_SEPARATOR: &str = "__";

#[derive(Error, Debug, PartialEq, Eq)]
pub enum KeyError {
    #[error("Model identifier is empty")]
    EmptyModel,

    #[error("Model identifier `{0}` contains the key separator `__`")]
    SeparatorInModel(String),

    #[error("Model identifier `{0}` ends with `_` and would run into the key separator")]
    TrailingUnderscore(String),

    #[error("Key `{0}` has no `__` separator")]
    MissingSeparator(String),
}

/// Composite cache key: the translating model and the verbatim question.
///
/// No normalization is applied; `"Total revenue"` and `"Total revenue "` are
/// different keys.
///
/// The model may neither contain `__` nor end with `_`, so the first `__` of
/// the persisted form always marks the end of the model.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CacheKey {
    model: String,
    query: String,
}

impl CacheKey {
    pub fn new(model: impl Into<String>, query: impl Into<String>) -> Result<Self, KeyError> {
        let model = model.into();
        if model.is_empty() {
            return Err(KeyError::EmptyModel);
        }
        if model.contains(KEY_SEPARATOR) {
            return Err(KeyError::SeparatorInModel(model));
        }
        if model.ends_with('_') {
            return Err(KeyError::TrailingUnderscore(model));
        }
        Ok(CacheKey {
            model,
            query: query.into(),
        })
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub fn query(&self) -> &str {
        &self.query
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}{}", self.model, KEY_SEPARATOR, self.query)
    }
}

impl FromStr for CacheKey {
    type Err = KeyError;

    /// Splits at the first separator; the query text may itself contain `__`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (model, query) = s
            .split_once(KEY_SEPARATOR)
            .ok_or_else(|| KeyError::MissingSeparator(s.to_string()))?;
        CacheKey::new(model, query)
    }
}

impl Serialize for CacheKey {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for CacheKey {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(de::Error::custom)
    }
}

/// Cached translation of one question.
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq, Default)]
pub struct CacheEntry {
    pub query_json: QueryJson,
    pub semantic_layer_json: SemanticLayerJson,
}

impl CacheEntry {
    pub fn from_json(
        query_json: serde_json::Value,
        semantic_layer_json: serde_json::Value,
    ) -> Result<Self, EntryError> {
        let query_json =
            serde_json::from_value(query_json).map_err(|e| EntryError::QueryJson(e.to_string()))?;
        let semantic_layer_json = serde_json::from_value(semantic_layer_json)
            .map_err(|e| EntryError::SemanticLayerJson(e.to_string()))?;
        Ok(CacheEntry {
            query_json,
            semantic_layer_json,
        })
    }

    /// Parses a translator document of the form
    /// `{"query_json": {...}, "semantic_layer_json": {...}}`.
    pub fn from_document(mut document: serde_json::Value) -> Result<Self, EntryError> {
        let object = document.as_object_mut().ok_or(EntryError::NotAnObject)?;
        let query_json = object
            .remove("query_json")
            .ok_or(EntryError::MissingField("query_json"))?;
        let semantic_layer_json = object
            .remove("semantic_layer_json")
            .ok_or(EntryError::MissingField("semantic_layer_json"))?;
        Self::from_json(query_json, semantic_layer_json)
    }

    pub fn inconsistencies(&self) -> Vec<Inconsistency> {
        consistency::check(&self.query_json, &self.semantic_layer_json)
    }
}

#[derive(Error, Debug, PartialEq, Eq)]
pub enum EntryError {
    #[error("query_json: {0}")]
    QueryJson(String),

    #[error("semantic_layer_json: {0}")]
    SemanticLayerJson(String),

    #[error("Translation document is not a JSON object")]
    NotAnObject,

    #[error("Translation document is missing `{0}`")]
    MissingField(&'static str),
}
