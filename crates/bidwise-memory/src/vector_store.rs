use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;

#[derive(Debug, thiserror::Error)]
pub enum VectorStoreError {
    #[error("connection error: {0}")]
    Connection(String),
    #[error("collection error: {0}")]
    Collection(String),
    #[error("upsert error: {0}")]
    Upsert(String),
    #[error("search error: {0}")]
    Search(String),
    #[error("serialization error: {0}")]
    Serialization(String),
}

pub type Payload = HashMap<String, serde_json::Value>;

#[derive(Debug, Clone)]
pub struct VectorPoint {
    pub id: String,
    pub vector: Vec<f32>,
    pub payload: Payload,
}

/// Conjunction of `must` conditions, minus anything matching `must_not`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct VectorFilter {
    pub must: Vec<FieldCondition>,
    pub must_not: Vec<FieldCondition>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FieldCondition {
    pub field: String,
    pub value: FieldValue,
}

#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    Integer(i64),
    Text(String),
    /// Inclusive numeric bounds; `None` leaves that side open.
    Range { gte: Option<f64>, lte: Option<f64> },
    /// Matches when the field equals any of the values.
    AnyOf(Vec<String>),
}

impl FieldCondition {
    #[must_use]
    pub fn text(field: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            value: FieldValue::Text(value.into()),
        }
    }

    #[must_use]
    pub fn range(field: impl Into<String>, gte: Option<f64>, lte: Option<f64>) -> Self {
        Self {
            field: field.into(),
            value: FieldValue::Range { gte, lte },
        }
    }

    #[must_use]
    pub fn any_of(field: impl Into<String>, values: Vec<String>) -> Self {
        Self {
            field: field.into(),
            value: FieldValue::AnyOf(values),
        }
    }

    /// Evaluate against a stored payload. A missing field never matches.
    #[must_use]
    pub fn matches(&self, payload: &Payload) -> bool {
        let Some(val) = payload.get(&self.field) else {
            return false;
        };
        match &self.value {
            FieldValue::Integer(i) => val.as_i64() == Some(*i),
            FieldValue::Text(s) => val.as_str() == Some(s.as_str()),
            FieldValue::Range { gte, lte } => val.as_f64().is_some_and(|v| {
                gte.is_none_or(|lo| v >= lo) && lte.is_none_or(|hi| v <= hi)
            }),
            FieldValue::AnyOf(values) => val
                .as_str()
                .is_some_and(|s| values.iter().any(|v| v == s)),
        }
    }
}

impl VectorFilter {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.must.is_empty() && self.must_not.is_empty()
    }

    /// The same predicate every backend applies, for in-process indexes.
    #[must_use]
    pub fn matches(&self, payload: &Payload) -> bool {
        self.must.iter().all(|c| c.matches(payload))
            && !self.must_not.iter().any(|c| c.matches(payload))
    }
}

#[derive(Debug, Clone)]
pub struct ScoredVectorPoint {
    pub id: String,
    pub score: f32,
    pub payload: Payload,
}

pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Storage backend for chunk embeddings. Shared as `Arc<dyn VectorStore>`.
pub trait VectorStore: Send + Sync {
    fn ensure_collection(
        &self,
        collection: &str,
        vector_size: u64,
    ) -> BoxFuture<'_, Result<(), VectorStoreError>>;

    fn collection_exists(&self, collection: &str) -> BoxFuture<'_, Result<bool, VectorStoreError>>;

    fn delete_collection(&self, collection: &str) -> BoxFuture<'_, Result<(), VectorStoreError>>;

    fn upsert(
        &self,
        collection: &str,
        points: Vec<VectorPoint>,
    ) -> BoxFuture<'_, Result<(), VectorStoreError>>;

    /// Cosine search, best first.
    fn search(
        &self,
        collection: &str,
        vector: Vec<f32>,
        limit: u64,
        filter: Option<VectorFilter>,
    ) -> BoxFuture<'_, Result<Vec<ScoredVectorPoint>, VectorStoreError>>;
}
