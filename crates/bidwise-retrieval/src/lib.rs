//! Hybrid retrieval over RFP chunks.

pub mod agent;
pub mod error;
pub mod filter;
pub mod hybrid;
pub mod lexical;
pub mod metrics;
pub mod rerank;
pub mod semantic;
pub mod types;

pub use agent::{RetrievalAgent, RetrievalConfig, RetrievalRequest, RetrievalResponse, format_context};
pub use error::RetrievalError;
pub use filter::{SearchFilters, fuzzy_match_organization, match_business_name};
pub use hybrid::{HybridRetriever, HybridWeights};
pub use lexical::LexicalIndex;
pub use rerank::{Jaccard, Mmr, Similarity};
pub use semantic::SemanticSearch;
pub use types::RetrievalResult;
