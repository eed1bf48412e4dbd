//! RFP documents, chunking, embeddings and vector storage.

pub mod document;
pub mod embedding;
pub mod error;
pub mod in_memory_store;
pub mod indexing;
pub mod qdrant_ops;
pub mod vector_store;

pub use document::{Chunk, Chunker, ChunkerConfig, Document, DocumentMetadata};
pub use embedding::{Embedded, EmbeddingConfig, EmbeddingService};
pub use error::MemoryError;
pub use in_memory_store::InMemoryVectorStore;
pub use indexing::{IndexReport, IndexingPipeline};
pub use qdrant_ops::QdrantOps;
pub use vector_store::{
    FieldCondition, FieldValue, ScoredVectorPoint, VectorFilter, VectorPoint, VectorStore,
    VectorStoreError,
};
