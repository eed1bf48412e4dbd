use std::sync::Arc;
use std::time::Duration;

use bidwise_llm::mock::MockProvider;
use bidwise_memory::document::{PreprocessedLoader, jsonl};
use bidwise_memory::{
    Chunker, ChunkerConfig, EmbeddingConfig, EmbeddingService, FieldCondition,
    InMemoryVectorStore, IndexingPipeline, VectorFilter, VectorStore,
};

fn write_doc(dir: &std::path::Path, name: &str, value: &serde_json::Value) {
    std::fs::write(dir.join(name), value.to_string()).unwrap();
}

#[tokio::test]
async fn preprocessed_documents_flow_into_vector_store() {
    let input = tempfile::tempdir().unwrap();
    write_doc(
        input.path(),
        "rfp1.json",
        &serde_json::json!({
            "text": format!("제1장 사업 개요\n{}\n제2장 보안 요구사항\n{}",
                "alpha 시스템 구축 ".repeat(40), "bravo 보안 점검 ".repeat(40)),
            "metadata": {
                "공고 번호": "2024-001",
                "발주 기관": "조달청",
                "사업 금액": "1,200,000,000",
                "입찰 참여 마감일": "2024-03-15 17:00:00"
            }
        }),
    );
    write_doc(
        input.path(),
        "rfp2.json",
        &serde_json::json!({
            "text": "charlie 유지보수 ".repeat(30),
            "metadata": {"발주 기관": "한국전력", "사업명": "전력 설비 유지보수"}
        }),
    );

    let docs = PreprocessedLoader::default().load_dir(input.path()).await.unwrap();
    assert_eq!(docs.len(), 2);
    assert_eq!(docs[0].doc_id, "2024-001");
    assert_eq!(docs[1].doc_id, "rfp2");
    assert_eq!(docs[0].metadata.amount, Some(1_200_000_000.0));

    let chunker = Chunker::new(ChunkerConfig {
        chunk_size: 200,
        chunk_overlap: 40,
        min_chunk_size: 20,
        section_aware: true,
    })
    .unwrap();
    let chunks: Vec<_> = docs.iter().flat_map(|d| chunker.chunk_document(d)).collect();
    assert!(chunks.iter().any(|c| {
        c.metadata.section_name.as_deref() == Some("제2장 보안 요구사항")
    }));

    let artifact = input.path().join("features/chunks.jsonl");
    jsonl::write_jsonl(&artifact, &chunks).await.unwrap();

    let store = Arc::new(InMemoryVectorStore::new());
    let embedder = EmbeddingService::new(
        vec![MockProvider::default().with_keyword_embeddings(&["alpha", "bravo", "charlie"])],
        EmbeddingConfig {
            batch_size: 4,
            max_retries: 0,
            retry_delay: Duration::ZERO,
        },
    );
    let pipeline = IndexingPipeline::new(embedder, store.clone(), "rfp_chunks");
    let report = pipeline.index_file(&artifact).await.unwrap();
    assert_eq!(report.indexed_chunks, chunks.len());
    assert_eq!(report.failed_chunks, 0);

    let query = pipeline.embedder().embed_query("bravo").await.unwrap();
    let deadline_filter = VectorFilter {
        must: vec![FieldCondition::range(
            "deadline_ordinal",
            Some(20_240_301.0),
            Some(20_240_331.0),
        )],
        must_not: vec![],
    };
    let hits = store
        .search("rfp_chunks", query, 3, Some(deadline_filter))
        .await
        .unwrap();
    assert!(!hits.is_empty());
    assert!(hits.iter().all(|h| h.payload["doc_id"] == "2024-001"));
    assert!(hits[0].payload["text"].as_str().unwrap().contains("bravo"));
}
