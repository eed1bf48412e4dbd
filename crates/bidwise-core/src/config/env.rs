use std::path::PathBuf;
use std::str::FromStr;

use super::{Config, ProviderKind, VectorBackend};

/// Parse `key` into `target`, warning and leaving the value untouched when it does not parse.
fn override_parsed<T: FromStr>(key: &str, target: &mut T) {
    if let Ok(v) = std::env::var(key) {
        match v.trim().parse::<T>() {
            Ok(parsed) => *target = parsed,
            Err(_) => tracing::warn!(key, value = %v, "ignoring invalid env override"),
        }
    }
}

fn split_list(v: &str) -> Vec<String> {
    v.split(',')
        .map(|s| s.trim().to_owned())
        .filter(|s| !s.is_empty())
        .collect()
}

impl Config {
    pub(crate) fn apply_env_overrides(&mut self) {
        self.apply_env_overrides_llm();
        self.apply_env_overrides_pipeline();
    }

    fn apply_env_overrides_llm(&mut self) {
        if let Ok(v) = std::env::var("BIDWISE_LLM_PROVIDER") {
            match v.trim().to_lowercase().as_str() {
                "ollama" => self.llm.provider = ProviderKind::Ollama,
                "openai" => self.llm.provider = ProviderKind::OpenAi,
                _ => tracing::warn!("ignoring invalid BIDWISE_LLM_PROVIDER value: {v}"),
            }
        }
        if let Ok(v) = std::env::var("BIDWISE_LLM_BASE_URL") {
            self.llm.base_url = v;
        }
        if let Ok(v) = std::env::var("BIDWISE_LLM_MODEL") {
            self.llm.model = v;
        }
        if let Ok(v) = std::env::var("BIDWISE_LLM_FALLBACK_MODELS") {
            self.llm.fallback_models = split_list(&v);
        }
        override_parsed("BIDWISE_LLM_MAX_TOKENS", &mut self.llm.max_tokens);
        override_parsed("BIDWISE_LLM_RETRY_MAX_TOKENS", &mut self.llm.retry_max_tokens);
        if let Ok(v) = std::env::var("BIDWISE_LLM_EMBEDDING_MODEL") {
            self.llm.embedding_model = v;
        }
        if let Ok(v) = std::env::var("BIDWISE_LLM_EMBEDDING_FALLBACK_MODELS") {
            self.llm.embedding_fallback_models = split_list(&v);
        }
    }

    fn apply_env_overrides_pipeline(&mut self) {
        override_parsed("BIDWISE_CHUNK_SIZE", &mut self.chunking.chunk_size);
        override_parsed("BIDWISE_CHUNK_OVERLAP", &mut self.chunking.chunk_overlap);
        override_parsed("BIDWISE_CHUNK_MIN_SIZE", &mut self.chunking.min_chunk_size);
        override_parsed("BIDWISE_CHUNK_SECTION_AWARE", &mut self.chunking.section_aware);

        override_parsed("BIDWISE_INDEX_BATCH_SIZE", &mut self.indexing.batch_size);
        override_parsed("BIDWISE_INDEX_MAX_RETRIES", &mut self.indexing.max_retries);
        override_parsed("BIDWISE_INDEX_RETRY_DELAY_MS", &mut self.indexing.retry_delay_ms);
        if let Ok(v) = std::env::var("BIDWISE_INDEX_COLLECTION") {
            self.indexing.collection = v;
        }

        if let Ok(v) = std::env::var("BIDWISE_VECTOR_BACKEND") {
            match v.trim().to_lowercase().as_str() {
                "memory" => self.vector.backend = VectorBackend::Memory,
                "qdrant" => self.vector.backend = VectorBackend::Qdrant,
                _ => tracing::warn!("ignoring invalid BIDWISE_VECTOR_BACKEND value: {v}"),
            }
        }
        if let Ok(v) = std::env::var("BIDWISE_QDRANT_URL") {
            self.vector.qdrant_url = v;
        }

        override_parsed("BIDWISE_RETRIEVAL_TOP_K", &mut self.retrieval.top_k);
        override_parsed(
            "BIDWISE_RETRIEVAL_HYBRID",
            &mut self.retrieval.use_hybrid_search,
        );
        override_parsed("BIDWISE_RETRIEVAL_HYBRID_ALPHA", &mut self.retrieval.hybrid_alpha);
        override_parsed("BIDWISE_RETRIEVAL_RERANK", &mut self.retrieval.use_rerank);
        override_parsed("BIDWISE_RETRIEVAL_MMR_LAMBDA", &mut self.retrieval.mmr_lambda);

        override_parsed("BIDWISE_AGENT_MAX_RETRIES", &mut self.agent.max_retries);
        override_parsed("BIDWISE_AGENT_CONTEXT_CAP", &mut self.agent.context_cap);
        override_parsed(
            "BIDWISE_AGENT_MIN_RESPONSE_CHARS",
            &mut self.agent.min_response_chars,
        );

        if let Ok(v) = std::env::var("BIDWISE_CHUNKS_PATH") {
            self.paths.chunks = PathBuf::from(v);
        }
        if let Ok(v) = std::env::var("BIDWISE_PREPROCESSED_DIR") {
            self.paths.preprocessed = PathBuf::from(v);
        }
    }
}
