use std::sync::Arc;

use bidwise_llm::LlmProvider;
use bidwise_memory::{EmbeddingService, VectorFilter, VectorStore};

use crate::error::Result;
use crate::types::RetrievalResult;

/// Embedding-based search against a [`VectorStore`] collection.
pub struct SemanticSearch<P> {
    store: Arc<dyn VectorStore>,
    embedder: Arc<EmbeddingService<P>>,
    collection: String,
}

impl<P> Clone for SemanticSearch<P> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            embedder: Arc::clone(&self.embedder),
            collection: self.collection.clone(),
        }
    }
}

impl<P: LlmProvider> SemanticSearch<P> {
    pub fn new(
        store: Arc<dyn VectorStore>,
        embedder: Arc<EmbeddingService<P>>,
        collection: impl Into<String>,
    ) -> Self {
        Self {
            store,
            embedder,
            collection: collection.into(),
        }
    }

    /// Cosine hits clamped to `[0, 1]`, best first.
    ///
    /// # Errors
    ///
    /// Returns an error if embedding the query or searching the store fails.
    pub async fn search(
        &self,
        query: &str,
        limit: usize,
        filter: Option<&VectorFilter>,
    ) -> Result<Vec<RetrievalResult>> {
        let vector = self.embedder.embed_query(query).await?;
        let hits = self
            .store
            .search(&self.collection, vector, limit as u64, filter.cloned())
            .await?;
        Ok(hits
            .into_iter()
            .filter_map(|hit| {
                let result = RetrievalResult::from_payload(&hit.payload, hit.score.clamp(0.0, 1.0));
                if result.is_none() {
                    tracing::debug!(point = %hit.id, "skipping point without chunk_id");
                }
                result
            })
            .collect())
    }
}
