#[derive(Debug, thiserror::Error)]
pub enum MemoryError {
    #[error("Qdrant error: {0}")]
    Qdrant(#[from] Box<qdrant_client::QdrantError>),

    #[error("vector store error: {0}")]
    VectorStore(#[from] crate::vector_store::VectorStoreError),

    #[error("LLM error: {0}")]
    Llm(#[from] bidwise_llm::LlmError),

    #[error("document error: {0}")]
    Document(#[from] crate::document::DocumentError),

    #[error("{0}")]
    Other(String),
}
