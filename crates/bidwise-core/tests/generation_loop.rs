use std::sync::Arc;
use std::time::Duration;

use bidwise_core::{Confidence, GenerationLoop, LoopConfig};
use bidwise_llm::FallbackChain;
use bidwise_llm::mock::MockProvider;
use bidwise_memory::{
    Chunk, DocumentMetadata, EmbeddingConfig, EmbeddingService, InMemoryVectorStore,
    IndexingPipeline,
};
use bidwise_retrieval::{RetrievalAgent, RetrievalConfig, SemanticSearch};

const COLLECTION: &str = "rfp_chunks";
const KEYWORDS: [&str; 3] = ["alpha", "bravo", "charlie"];
const ANSWER: &str = "charlie 관제 용역은 24시간 보안관제를 요구합니다. (출처: C)";

fn chunk(doc: &str, idx: usize, text: &str) -> Chunk {
    Chunk {
        chunk_id: Chunk::make_id(doc, idx),
        doc_id: doc.into(),
        chunk_index: idx,
        text: text.into(),
        char_offset_start: 0,
        char_offset_end: text.chars().count(),
        metadata: DocumentMetadata {
            business_name: Some(format!("{doc} 사업")),
            ..DocumentMetadata::default()
        },
    }
}

fn corpus() -> Vec<Chunk> {
    vec![
        chunk("A", 0, "alpha 정보시스템 구축 범위"),
        chunk("A", 1, "alpha 데이터 이관 요구사항"),
        chunk("B", 0, "bravo 전력 설비 유지보수"),
        chunk("C", 0, "charlie 관제 용역 24시간 운영"),
    ]
}

fn embedder() -> EmbeddingService<MockProvider> {
    EmbeddingService::new(
        vec![MockProvider::default().with_keyword_embeddings(&KEYWORDS)],
        EmbeddingConfig {
            batch_size: 16,
            max_retries: 0,
            retry_delay: Duration::ZERO,
        },
    )
}

async fn retrieval_agent() -> RetrievalAgent<MockProvider> {
    let store = Arc::new(InMemoryVectorStore::new());
    let report = IndexingPipeline::new(embedder(), store.clone(), COLLECTION)
        .index_chunks(&corpus())
        .await;
    assert_eq!(report.indexed_chunks, 4);

    let semantic = SemanticSearch::new(store, Arc::new(embedder()), COLLECTION);
    RetrievalAgent::new(semantic, None, RetrievalConfig::default())
}

async fn generation_loop(
    chat: MockProvider,
    max_retries: u32,
) -> GenerationLoop<MockProvider, RetrievalAgent<MockProvider>> {
    GenerationLoop::new(
        FallbackChain::new(vec![chat]),
        retrieval_agent().await,
        LoopConfig {
            max_retries,
            retrieval_top_k: 2,
            ..LoopConfig::default()
        },
    )
}

fn scripted(items: &[&str]) -> MockProvider {
    MockProvider::with_responses(items.iter().map(|s| (*s).to_owned()).collect())
}

#[tokio::test]
async fn sufficient_first_pass_answers_once() {
    let chat = scripted(&["charlie", "yes", ANSWER]);
    let lp = generation_loop(chat.clone(), 3).await;
    let out = lp.run("관제 용역의 운영 시간은?", None).await;

    assert_eq!(out.passes, 1);
    assert_eq!(out.retry_count, 0);
    assert!(out.is_relevant);
    assert_eq!(out.answer, ANSWER);
    assert_eq!(out.sources[0].chunk_id, "C_0");
    let recorded = chat.recorded();
    assert_eq!(recorded.len(), 3);

    // generation sees the numbered context block for the top source
    assert!(recorded[2].messages[1].content.contains("[문서 1: C 사업 / -]"));
}

#[tokio::test]
async fn final_sources_come_from_last_pass() {
    let chat = scripted(&["alpha", "no", "bravo", "no", "charlie", "yes", ANSWER]);
    let lp = generation_loop(chat, 3).await;
    let out = lp.run("운영 조건은?", None).await;

    assert_eq!(out.retry_count, 2);
    assert_eq!(out.passes, 3);
    assert_eq!(out.sources[0].doc_id, "C");
    assert!((out.sources[0].score - 1.0).abs() < 1e-6);
}

#[tokio::test]
async fn always_insufficient_terminates_with_answer() {
    let chat = MockProvider::default().with_default_response("no");
    let lp = generation_loop(chat, 2).await;
    let out = lp.run("무엇이든", None).await;

    assert_eq!(out.retry_count, 2);
    assert_eq!(out.passes, 3);
    assert!(!out.is_relevant);
    assert!(!out.answer.trim().is_empty());
}

#[tokio::test]
async fn selected_documents_restrict_evidence() {
    let chat = scripted(&["alpha charlie", "yes", ANSWER]);
    let lp = generation_loop(chat, 3).await;
    let out = lp.run("요구사항은?", Some(vec!["B".into()])).await;

    assert!(!out.sources.is_empty());
    assert!(out.sources.iter().all(|s| s.doc_id == "B"));
    assert_eq!(out.confidence, Confidence::Low);
}
