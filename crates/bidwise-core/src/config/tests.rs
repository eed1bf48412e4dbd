use std::io::Write;
use std::path::Path;

use serial_test::serial;

use super::*;
use crate::vault::StaticVaultProvider;

const ENV_KEYS: [&str; 26] = [
    "BIDWISE_LLM_PROVIDER",
    "BIDWISE_LLM_BASE_URL",
    "BIDWISE_LLM_MODEL",
    "BIDWISE_LLM_FALLBACK_MODELS",
    "BIDWISE_LLM_MAX_TOKENS",
    "BIDWISE_LLM_RETRY_MAX_TOKENS",
    "BIDWISE_LLM_EMBEDDING_MODEL",
    "BIDWISE_LLM_EMBEDDING_FALLBACK_MODELS",
    "BIDWISE_CHUNK_SIZE",
    "BIDWISE_CHUNK_OVERLAP",
    "BIDWISE_CHUNK_MIN_SIZE",
    "BIDWISE_CHUNK_SECTION_AWARE",
    "BIDWISE_INDEX_BATCH_SIZE",
    "BIDWISE_INDEX_MAX_RETRIES",
    "BIDWISE_INDEX_RETRY_DELAY_MS",
    "BIDWISE_INDEX_COLLECTION",
    "BIDWISE_VECTOR_BACKEND",
    "BIDWISE_QDRANT_URL",
    "BIDWISE_RETRIEVAL_TOP_K",
    "BIDWISE_RETRIEVAL_HYBRID",
    "BIDWISE_RETRIEVAL_HYBRID_ALPHA",
    "BIDWISE_RETRIEVAL_RERANK",
    "BIDWISE_RETRIEVAL_MMR_LAMBDA",
    "BIDWISE_AGENT_MAX_RETRIES",
    "BIDWISE_AGENT_CONTEXT_CAP",
    "BIDWISE_AGENT_MIN_RESPONSE_CHARS",
];

fn clear_env() {
    for key in ENV_KEYS {
        unsafe { std::env::remove_var(key) };
    }
    unsafe {
        std::env::remove_var("BIDWISE_CHUNKS_PATH");
        std::env::remove_var("BIDWISE_PREPROCESSED_DIR");
    }
}

fn write_config(contents: &str) -> tempfile::NamedTempFile {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(contents.as_bytes()).unwrap();
    file
}

#[test]
fn defaults() {
    let config = Config::default();
    assert_eq!(config.llm.provider, ProviderKind::Ollama);
    assert_eq!(config.llm.base_url, "http://localhost:11434");
    assert_eq!(config.chunking.chunk_size, 1000);
    assert_eq!(config.chunking.chunk_overlap, 200);
    assert_eq!(config.chunking.min_chunk_size, 100);
    assert!(!config.chunking.section_aware);
    assert_eq!(config.indexing.batch_size, 100);
    assert_eq!(config.indexing.max_retries, 3);
    assert_eq!(config.indexing.collection, "rfp_chunks");
    assert_eq!(config.vector.backend, VectorBackend::Memory);
    assert_eq!(config.retrieval.top_k, 10);
    assert!(!config.retrieval.use_hybrid_search);
    assert!((config.retrieval.hybrid_alpha - 0.7).abs() < f32::EPSILON);
    assert!(config.retrieval.use_rerank);
    assert_eq!(config.agent.max_retries, 3);
    assert_eq!(config.agent.context_cap, 10);
    assert!(config.secrets.openai_api_key.is_none());
    config.validate().unwrap();
}

#[test]
#[serial]
fn load_missing_file_uses_defaults() {
    clear_env();
    let config = Config::load(Path::new("/nonexistent/bidwise.toml")).unwrap();
    assert_eq!(config.llm.model, "qwen2.5:7b");
    assert_eq!(config.paths.chunks, Path::new("data/chunks/chunks.jsonl"));
}

#[test]
#[serial]
fn load_partial_file_keeps_other_defaults() {
    clear_env();
    let file = write_config(
        r#"
[llm]
provider = "openai"
base_url = "https://api.openai.com/v1"
model = "gpt-4"
fallback_models = ["gpt-3.5-turbo-16k", "gpt-3.5-turbo"]
embedding_model = "text-embedding-3-large"
embedding_fallback_models = ["text-embedding-3-small"]

[retrieval]
use_hybrid_search = true
hybrid_alpha = 0.5

[vector]
backend = "qdrant"
"#,
    );
    let config = Config::load(file.path()).unwrap();
    assert_eq!(config.llm.provider, ProviderKind::OpenAi);
    assert_eq!(
        config.llm.chat_models(),
        vec!["gpt-4", "gpt-3.5-turbo-16k", "gpt-3.5-turbo"]
    );
    assert_eq!(
        config.llm.embedding_models(),
        vec!["text-embedding-3-large", "text-embedding-3-small"]
    );
    assert!(config.retrieval.use_hybrid_search);
    assert!((config.retrieval.hybrid_alpha - 0.5).abs() < f32::EPSILON);
    assert_eq!(config.retrieval.top_k, 10);
    assert_eq!(config.vector.backend, VectorBackend::Qdrant);
    assert_eq!(config.vector.qdrant_url, "http://localhost:6334");
    assert_eq!(config.chunking.chunk_size, 1000);
}

#[test]
#[serial]
fn load_rejects_malformed_toml() {
    clear_env();
    let file = write_config("[llm\nmodel = ");
    let err = Config::load(file.path()).unwrap_err();
    assert!(format!("{err:#}").contains("failed to parse config file"));
}

#[test]
#[serial]
fn env_overrides_apply_after_file() {
    clear_env();
    let file = write_config("[llm]\nmodel = \"from-file\"\n");
    unsafe {
        std::env::set_var("BIDWISE_LLM_MODEL", "from-env");
        std::env::set_var("BIDWISE_LLM_PROVIDER", "OpenAI");
        std::env::set_var("BIDWISE_LLM_FALLBACK_MODELS", "a, b,,c");
        std::env::set_var("BIDWISE_CHUNK_SIZE", "500");
        std::env::set_var("BIDWISE_CHUNK_SECTION_AWARE", "true");
        std::env::set_var("BIDWISE_VECTOR_BACKEND", "qdrant");
        std::env::set_var("BIDWISE_RETRIEVAL_HYBRID_ALPHA", "0.25");
        std::env::set_var("BIDWISE_AGENT_MAX_RETRIES", "5");
        std::env::set_var("BIDWISE_CHUNKS_PATH", "/tmp/c.jsonl");
    }
    let config = Config::load(file.path()).unwrap();
    clear_env();

    assert_eq!(config.llm.model, "from-env");
    assert_eq!(config.llm.provider, ProviderKind::OpenAi);
    assert_eq!(config.llm.fallback_models, vec!["a", "b", "c"]);
    assert_eq!(config.chunking.chunk_size, 500);
    assert!(config.chunking.section_aware);
    assert_eq!(config.vector.backend, VectorBackend::Qdrant);
    assert!((config.retrieval.hybrid_alpha - 0.25).abs() < f32::EPSILON);
    assert_eq!(config.agent.max_retries, 5);
    assert_eq!(config.paths.chunks, Path::new("/tmp/c.jsonl"));
}

#[test]
#[serial]
fn invalid_env_values_are_ignored() {
    clear_env();
    unsafe {
        std::env::set_var("BIDWISE_LLM_PROVIDER", "claude");
        std::env::set_var("BIDWISE_RETRIEVAL_TOP_K", "many");
        std::env::set_var("BIDWISE_VECTOR_BACKEND", "faiss");
    }
    let config = Config::load(Path::new("/nonexistent/bidwise.toml")).unwrap();
    clear_env();

    assert_eq!(config.llm.provider, ProviderKind::Ollama);
    assert_eq!(config.retrieval.top_k, 10);
    assert_eq!(config.vector.backend, VectorBackend::Memory);
}

#[test]
fn validate_rejects_bad_chunking() {
    let mut config = Config::default();
    config.chunking.chunk_size = 0;
    assert!(config.validate().is_err());

    let mut config = Config::default();
    config.chunking.min_chunk_size = 2000;
    assert!(config.validate().is_err());

    let mut config = Config::default();
    config.chunking.chunk_overlap = 1000;
    let err = config.validate().unwrap_err().to_string();
    assert!(err.contains("chunk_overlap"));
}

#[test]
fn validate_rejects_bad_weights_and_budgets() {
    let mut config = Config::default();
    config.retrieval.hybrid_alpha = 1.5;
    assert!(config.validate().is_err());

    let mut config = Config::default();
    config.retrieval.mmr_lambda = -0.1;
    assert!(config.validate().is_err());

    let mut config = Config::default();
    config.retrieval.top_k = 0;
    assert!(config.validate().is_err());

    let mut config = Config::default();
    config.agent.context_cap = 0;
    assert!(config.validate().is_err());

    let mut config = Config::default();
    config.indexing.batch_size = 0;
    assert!(config.validate().is_err());

    let mut config = Config::default();
    config.llm.retry_max_tokens = 0;
    assert!(config.validate().is_err());
}

#[test]
fn chat_models_dedup_and_skip_blank() {
    let mut config = Config::default();
    config.llm.model = "gpt-4".into();
    config.llm.fallback_models = vec!["gpt-4".into(), " ".into(), "gpt-3.5-turbo".into()];
    assert_eq!(config.llm.chat_models(), vec!["gpt-4", "gpt-3.5-turbo"]);
}

#[test]
fn loop_config_collects_agent_and_llm_settings() {
    let mut config = Config::default();
    config.agent.max_retries = 1;
    config.retrieval.top_k = 4;
    config.llm.retry_max_tokens = 8192;
    let lc = config.loop_config();
    assert_eq!(lc.max_retries, 1);
    assert_eq!(lc.retrieval_top_k, 4);
    assert_eq!(lc.retry_max_tokens, 8192);
    assert_eq!(lc.context_cap, 10);
}

#[test]
fn conversions_into_component_configs() {
    let config = Config::default();
    let chunker: bidwise_memory::ChunkerConfig = config.chunking.into();
    assert_eq!(chunker, bidwise_memory::ChunkerConfig::default());
    let retrieval: bidwise_retrieval::RetrievalConfig = config.retrieval.into();
    assert_eq!(retrieval, bidwise_retrieval::RetrievalConfig::default());
    let embedding = config.indexing.embedding();
    assert_eq!(embedding.batch_size, 100);
    assert_eq!(embedding.retry_delay, std::time::Duration::from_secs(1));
}

#[tokio::test]
async fn resolve_secrets_populates_openai_key() {
    let mut config = Config::default();
    let vault = StaticVaultProvider::new().with_secret(OPENAI_API_KEY, "sk-abc");
    config.resolve_secrets(&vault).await.unwrap();
    let key = config.secrets.openai_api_key.as_ref().unwrap();
    assert_eq!(key.expose(), "sk-abc");
    assert_eq!(format!("{:?}", config.secrets), "ResolvedSecrets { openai_api_key: Some([REDACTED]) }");
}

#[tokio::test]
async fn resolve_secrets_leaves_missing_key_unset() {
    let mut config = Config::default();
    config
        .resolve_secrets(&StaticVaultProvider::new())
        .await
        .unwrap();
    assert!(config.secrets.openai_api_key.is_none());
}
