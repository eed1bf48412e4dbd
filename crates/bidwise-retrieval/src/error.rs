#[derive(Debug, thiserror::Error)]
pub enum RetrievalError {
    #[error("LLM error: {0}")]
    Llm(#[from] bidwise_llm::LlmError),

    #[error("vector store error: {0}")]
    VectorStore(#[from] bidwise_memory::VectorStoreError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("document error: {0}")]
    Document(#[from] bidwise_memory::document::DocumentError),

    /// Neither the lexical nor the vector index could serve the query.
    #[error("no retrieval backend available: {0}")]
    Unavailable(String),

    #[error("invalid request: {0}")]
    InvalidRequest(String),
}

pub type Result<T> = std::result::Result<T, RetrievalError>;
