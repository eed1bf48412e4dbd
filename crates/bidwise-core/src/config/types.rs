use std::path::PathBuf;
use std::time::Duration;

use bidwise_memory::{ChunkerConfig, EmbeddingConfig};
use bidwise_retrieval::RetrievalConfig;
use serde::{Deserialize, Serialize};

use crate::agent::LoopConfig;
use crate::vault::Secret;

#[derive(Debug, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct Config {
    pub llm: LlmConfig,
    pub chunking: ChunkingConfig,
    pub indexing: IndexingConfig,
    pub vector: VectorConfig,
    pub retrieval: RetrievalSection,
    pub agent: AgentConfig,
    pub paths: PathsConfig,
    #[serde(skip)]
    pub secrets: ResolvedSecrets,
}

/// LLM provider backend selector.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    #[default]
    Ollama,
    OpenAi,
}

impl ProviderKind {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Ollama => "ollama",
            Self::OpenAi => "openai",
        }
    }
}

impl std::fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Deserialize, Serialize)]
#[serde(default)]
pub struct LlmConfig {
    pub provider: ProviderKind,
    pub base_url: String,
    pub model: String,
    /// Chat models tried in order after `model` fails.
    pub fallback_models: Vec<String>,
    pub max_tokens: u32,
    /// Token budget for the single retry of a degenerate answer.
    pub retry_max_tokens: u32,
    pub embedding_model: String,
    pub embedding_fallback_models: Vec<String>,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider: ProviderKind::Ollama,
            base_url: "http://localhost:11434".into(),
            model: "qwen2.5:7b".into(),
            fallback_models: Vec::new(),
            max_tokens: 2048,
            retry_max_tokens: 4096,
            embedding_model: "bge-m3".into(),
            embedding_fallback_models: Vec::new(),
        }
    }
}

impl LlmConfig {
    /// Primary model followed by its fallbacks, duplicates removed.
    #[must_use]
    pub fn chat_models(&self) -> Vec<String> {
        dedup_models(&self.model, &self.fallback_models)
    }

    #[must_use]
    pub fn embedding_models(&self) -> Vec<String> {
        dedup_models(&self.embedding_model, &self.embedding_fallback_models)
    }
}

fn dedup_models(primary: &str, fallbacks: &[String]) -> Vec<String> {
    let mut out: Vec<String> = Vec::with_capacity(fallbacks.len() + 1);
    for m in std::iter::once(primary).chain(fallbacks.iter().map(String::as_str)) {
        let m = m.trim();
        if !m.is_empty() && !out.iter().any(|o| o == m) {
            out.push(m.to_owned());
        }
    }
    out
}

#[derive(Debug, Clone, Copy, Deserialize, Serialize)]
#[serde(default)]
pub struct ChunkingConfig {
    pub chunk_size: usize,
    pub chunk_overlap: usize,
    pub min_chunk_size: usize,
    pub section_aware: bool,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        let c = ChunkerConfig::default();
        Self {
            chunk_size: c.chunk_size,
            chunk_overlap: c.chunk_overlap,
            min_chunk_size: c.min_chunk_size,
            section_aware: c.section_aware,
        }
    }
}

impl From<ChunkingConfig> for ChunkerConfig {
    fn from(c: ChunkingConfig) -> Self {
        Self {
            chunk_size: c.chunk_size,
            chunk_overlap: c.chunk_overlap,
            min_chunk_size: c.min_chunk_size,
            section_aware: c.section_aware,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct IndexingConfig {
    pub batch_size: usize,
    pub max_retries: u32,
    pub retry_delay_ms: u64,
    pub collection: String,
}

impl Default for IndexingConfig {
    fn default() -> Self {
        Self {
            batch_size: 100,
            max_retries: 3,
            retry_delay_ms: 1000,
            collection: "rfp_chunks".into(),
        }
    }
}

impl IndexingConfig {
    #[must_use]
    pub fn embedding(&self) -> EmbeddingConfig {
        EmbeddingConfig {
            batch_size: self.batch_size,
            max_retries: self.max_retries,
            retry_delay: Duration::from_millis(self.retry_delay_ms),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum VectorBackend {
    /// Process-local store; contents are lost on exit.
    #[default]
    Memory,
    Qdrant,
}

#[derive(Debug, Deserialize, Serialize)]
#[serde(default)]
pub struct VectorConfig {
    pub backend: VectorBackend,
    pub qdrant_url: String,
}

impl Default for VectorConfig {
    fn default() -> Self {
        Self {
            backend: VectorBackend::Memory,
            qdrant_url: "http://localhost:6334".into(),
        }
    }
}

#[derive(Debug, Clone, Copy, Deserialize, Serialize)]
#[serde(default)]
pub struct RetrievalSection {
    pub top_k: usize,
    pub use_hybrid_search: bool,
    /// Vector weight in hybrid fusion; lexical gets `1 - hybrid_alpha`.
    pub hybrid_alpha: f32,
    pub use_rerank: bool,
    pub mmr_lambda: f32,
    pub candidate_multiplier: usize,
}

impl Default for RetrievalSection {
    fn default() -> Self {
        let c = RetrievalConfig::default();
        Self {
            top_k: c.top_k,
            use_hybrid_search: c.use_hybrid,
            hybrid_alpha: c.hybrid_alpha,
            use_rerank: c.use_rerank,
            mmr_lambda: c.mmr_lambda,
            candidate_multiplier: c.candidate_multiplier,
        }
    }
}

impl From<RetrievalSection> for RetrievalConfig {
    fn from(s: RetrievalSection) -> Self {
        Self {
            top_k: s.top_k,
            use_hybrid: s.use_hybrid_search,
            hybrid_alpha: s.hybrid_alpha,
            use_rerank: s.use_rerank,
            mmr_lambda: s.mmr_lambda,
            candidate_multiplier: s.candidate_multiplier,
        }
    }
}

#[derive(Debug, Clone, Copy, Deserialize, Serialize)]
#[serde(default)]
pub struct AgentConfig {
    pub max_retries: u32,
    pub context_cap: usize,
    pub min_response_chars: usize,
}

impl Default for AgentConfig {
    fn default() -> Self {
        let c = LoopConfig::default();
        Self {
            max_retries: c.max_retries,
            context_cap: c.context_cap,
            min_response_chars: c.min_response_chars,
        }
    }
}

#[derive(Debug, Deserialize, Serialize)]
#[serde(default)]
pub struct PathsConfig {
    /// Chunk JSONL artifact written by `chunk` and read by `index` and hybrid search.
    pub chunks: PathBuf,
    /// Directory of preprocessed `*.json` documents.
    pub preprocessed: PathBuf,
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            chunks: PathBuf::from("data/chunks/chunks.jsonl"),
            preprocessed: PathBuf::from("data/preprocessed"),
        }
    }
}

#[derive(Debug, Default)]
pub struct ResolvedSecrets {
    pub openai_api_key: Option<Secret>,
}
