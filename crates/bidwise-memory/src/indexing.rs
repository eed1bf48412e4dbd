use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};

use bidwise_llm::LlmProvider;
use serde::Serialize;

use crate::document::{Chunk, jsonl};
use crate::embedding::EmbeddingService;
use crate::error::MemoryError;
use crate::vector_store::{VectorPoint, VectorStore};

/// Outcome of one indexing run.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct IndexReport {
    pub total_chunks: usize,
    pub indexed_chunks: usize,
    pub failed_chunks: usize,
    pub processing_time: Duration,
    pub average_embedding_time: Duration,
    /// Embedding model of the last successful batch.
    pub model: Option<String>,
    pub errors: Vec<String>,
}

/// Chunk JSONL -> embeddings -> vector store.
pub struct IndexingPipeline<P> {
    embedder: Arc<EmbeddingService<P>>,
    store: Arc<dyn VectorStore>,
    collection: String,
}

impl<P: LlmProvider> IndexingPipeline<P> {
    /// Pass a shared embedder to keep its active model for later queries.
    pub fn new(
        embedder: impl Into<Arc<EmbeddingService<P>>>,
        store: Arc<dyn VectorStore>,
        collection: impl Into<String>,
    ) -> Self {
        Self {
            embedder: embedder.into(),
            store,
            collection: collection.into(),
        }
    }

    #[must_use]
    pub fn embedder(&self) -> &EmbeddingService<P> {
        &self.embedder
    }

    /// Index the chunk artifact at `path`.
    ///
    /// # Errors
    ///
    /// Returns an error only if the file cannot be read. Per-batch failures are
    /// recorded in the report.
    pub async fn index_file(&self, path: &Path) -> Result<IndexReport, MemoryError> {
        let chunks = jsonl::read_jsonl(path).await?;
        if chunks.is_empty() {
            tracing::warn!(path = %path.display(), "no chunks to index");
        } else {
            tracing::info!(path = %path.display(), count = chunks.len(), "loaded chunks");
        }
        Ok(self.index_chunks(&chunks).await)
    }

    /// Embed and upsert `chunks` batch by batch. A failed batch is counted and skipped.
    pub async fn index_chunks(&self, chunks: &[Chunk]) -> IndexReport {
        let started = Instant::now();
        let mut report = IndexReport {
            total_chunks: chunks.len(),
            ..IndexReport::default()
        };
        let mut embedding_times = Vec::new();
        let mut collection_ready = false;
        let batch_size = self.embedder.config().batch_size;

        for (batch_no, batch) in chunks.chunks(batch_size).enumerate() {
            let texts: Vec<String> = batch.iter().map(|c| c.text.clone()).collect();

            let t0 = Instant::now();
            let embedded = match self.embedder.embed_batch(&texts).await {
                Ok(embedded) => embedded,
                Err(e) => {
                    record_failure(&mut report, batch_no, batch.len(), &e);
                    continue;
                }
            };
            embedding_times.push(t0.elapsed());

            if !collection_ready {
                let dim = embedded.vectors.first().map_or(0, Vec::len) as u64;
                if let Err(e) = self.store.ensure_collection(&self.collection, dim).await {
                    record_failure(&mut report, batch_no, batch.len(), &e);
                    continue;
                }
                collection_ready = true;
            }

            let points: Vec<VectorPoint> = batch
                .iter()
                .zip(embedded.vectors)
                .map(|(chunk, vector)| VectorPoint {
                    id: chunk.point_id(),
                    vector,
                    payload: chunk.to_payload(),
                })
                .collect();

            match self.store.upsert(&self.collection, points).await {
                Ok(()) => {
                    report.indexed_chunks += batch.len();
                    report.model = Some(embedded.model);
                    tracing::info!(
                        batch = batch_no,
                        indexed = report.indexed_chunks,
                        total = report.total_chunks,
                        "indexed batch"
                    );
                }
                Err(e) => record_failure(&mut report, batch_no, batch.len(), &e),
            }
        }

        report.processing_time = started.elapsed();
        if !embedding_times.is_empty() {
            let total: Duration = embedding_times.iter().sum();
            report.average_embedding_time =
                total / u32::try_from(embedding_times.len()).unwrap_or(u32::MAX);
        }
        tracing::info!(
            total = report.total_chunks,
            indexed = report.indexed_chunks,
            failed = report.failed_chunks,
            elapsed_ms = report.processing_time.as_millis(),
            "indexing finished"
        );
        report
    }
}

fn record_failure(
    report: &mut IndexReport,
    batch_no: usize,
    size: usize,
    error: &dyn std::fmt::Display,
) {
    let msg = format!("failed to index batch {batch_no}: {error}");
    tracing::error!("{msg}");
    report.errors.push(msg);
    report.failed_chunks += size;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::{Chunker, ChunkerConfig, DocumentMetadata};
    use crate::embedding::EmbeddingConfig;
    use crate::in_memory_store::InMemoryVectorStore;
    use bidwise_llm::mock::MockProvider;

    fn chunks(n: usize) -> Vec<Chunk> {
        let chunker = Chunker::new(ChunkerConfig {
            chunk_size: 20,
            chunk_overlap: 0,
            min_chunk_size: 1,
            section_aware: false,
        })
        .unwrap();
        let meta = DocumentMetadata {
            organization: Some("조달청".into()),
            ..DocumentMetadata::default()
        };
        chunker.chunk(&"alpha bravo charlie ".repeat(n), "D1", &meta)
    }

    fn pipeline(
        mock: MockProvider,
        store: Arc<InMemoryVectorStore>,
        batch_size: usize,
    ) -> IndexingPipeline<MockProvider> {
        let embedder = EmbeddingService::new(
            vec![mock],
            EmbeddingConfig {
                batch_size,
                max_retries: 0,
                retry_delay: Duration::ZERO,
            },
        );
        IndexingPipeline::new(embedder, store, "rfp_chunks")
    }

    #[tokio::test]
    async fn indexes_all_chunks() {
        let store = Arc::new(InMemoryVectorStore::new());
        let mock = MockProvider::default()
            .with_keyword_embeddings(&["alpha", "bravo"])
            .with_model("embed-small");
        let chunks = chunks(5);

        let report = pipeline(mock, store.clone(), 2).index_chunks(&chunks).await;
        assert_eq!(report.total_chunks, 5);
        assert_eq!(report.indexed_chunks, 5);
        assert_eq!(report.failed_chunks, 0);
        assert_eq!(report.model.as_deref(), Some("embed-small"));
        assert!(report.errors.is_empty());
        assert_eq!(store.len("rfp_chunks"), 5);

        let hits = store
            .search("rfp_chunks", vec![1.0, 0.0], 1, None)
            .await
            .unwrap();
        assert!(hits[0].payload.contains_key("chunk_id"));
        assert_eq!(hits[0].payload["organization"], "조달청");
    }

    #[tokio::test]
    async fn failed_batch_is_counted_and_pipeline_continues() {
        let store = Arc::new(InMemoryVectorStore::new());
        let mock = MockProvider::default()
            .with_keyword_embeddings(&["alpha"])
            .with_embed_failures(1);

        let report = pipeline(mock, store.clone(), 2).index_chunks(&chunks(5)).await;
        assert_eq!(report.failed_chunks, 2);
        assert_eq!(report.indexed_chunks, 3);
        assert_eq!(report.errors.len(), 1);
        assert!(report.errors[0].contains("batch 0"));
        assert_eq!(store.len("rfp_chunks"), 3);
    }

    #[tokio::test]
    async fn reindexing_is_idempotent() {
        let store = Arc::new(InMemoryVectorStore::new());
        let mock = MockProvider::default().with_keyword_embeddings(&["alpha"]);
        let p = pipeline(mock, store.clone(), 10);
        let chunks = chunks(3);

        p.index_chunks(&chunks).await;
        p.index_chunks(&chunks).await;
        assert_eq!(store.len("rfp_chunks"), 3);
    }

    #[tokio::test]
    async fn index_file_reads_jsonl() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("chunks.jsonl");
        jsonl::write_jsonl(&path, &chunks(4)).await.unwrap();

        let store = Arc::new(InMemoryVectorStore::new());
        let mock = MockProvider::default().with_keyword_embeddings(&["alpha"]);
        let report = pipeline(mock, store, 100).index_file(&path).await.unwrap();
        assert_eq!(report.indexed_chunks, 4);
    }

    #[tokio::test]
    async fn empty_input_reports_zero() {
        let store = Arc::new(InMemoryVectorStore::new());
        let report = pipeline(MockProvider::default(), store, 10)
            .index_chunks(&[])
            .await;
        assert_eq!(report.total_chunks, 0);
        assert_eq!(report.average_embedding_time, Duration::ZERO);
    }
}
