//! Application bootstrap: config resolution and construction of providers, store and agents.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, bail};
use bidwise_llm::FallbackChain;
use bidwise_llm::any::AnyProvider;
use bidwise_llm::ollama::OllamaProvider;
use bidwise_llm::openai::OpenAiProvider;
use bidwise_memory::{
    Chunker, EmbeddingService, InMemoryVectorStore, IndexReport, IndexingPipeline, QdrantOps,
    VectorStore,
};
use bidwise_retrieval::{LexicalIndex, RetrievalAgent, SemanticSearch};

use crate::agent::GenerationLoop;
use crate::config::{Config, OPENAI_API_KEY, ProviderKind, VectorBackend};
use crate::vault::{EnvVaultProvider, VaultProvider};

pub const DEFAULT_CONFIG_PATH: &str = "config/bidwise.toml";

pub type Embedder = Arc<EmbeddingService<AnyProvider>>;
pub type Agent = RetrievalAgent<AnyProvider>;
pub type Loop = GenerationLoop<AnyProvider, Agent>;

/// Priority: CLI `--config` > `BIDWISE_CONFIG` env > `config/bidwise.toml`.
#[must_use]
pub fn resolve_config_path(cli: Option<&Path>) -> PathBuf {
    if let Some(path) = cli {
        return path.to_path_buf();
    }
    if let Ok(path) = std::env::var("BIDWISE_CONFIG") {
        return PathBuf::from(path);
    }
    PathBuf::from(DEFAULT_CONFIG_PATH)
}

pub struct AppBuilder {
    config: Config,
    config_path: PathBuf,
}

impl AppBuilder {
    /// Load, validate and resolve secrets from the environment.
    ///
    /// # Errors
    ///
    /// Returns an error if the config cannot be parsed or is invalid.
    pub async fn from_path(config_path: PathBuf) -> anyhow::Result<Self> {
        Self::with_vault(config_path, &EnvVaultProvider).await
    }

    /// # Errors
    ///
    /// Returns an error if the config cannot be parsed, is invalid, or the vault fails.
    pub async fn with_vault(
        config_path: PathBuf,
        vault: &dyn VaultProvider,
    ) -> anyhow::Result<Self> {
        let mut config = Config::load(&config_path)?;
        config.validate()?;
        config.resolve_secrets(vault).await?;
        tracing::debug!(path = %config_path.display(), provider = %config.llm.provider, "config loaded");
        Ok(Self {
            config,
            config_path,
        })
    }

    #[must_use]
    pub fn from_config(config: Config) -> Self {
        Self {
            config,
            config_path: PathBuf::from(DEFAULT_CONFIG_PATH),
        }
    }

    #[must_use]
    pub fn config(&self) -> &Config {
        &self.config
    }

    #[must_use]
    pub fn config_path(&self) -> &Path {
        &self.config_path
    }

    /// # Errors
    ///
    /// Returns an error if the chunking settings are rejected.
    pub fn build_chunker(&self) -> anyhow::Result<Chunker> {
        Chunker::new(self.config.chunking.into()).context("invalid chunking configuration")
    }

    /// Ordered chat chain: `llm.model` then `llm.fallback_models`.
    ///
    /// # Errors
    ///
    /// Returns an error if a provider cannot be created.
    pub fn build_chat_chain(&self) -> anyhow::Result<FallbackChain<AnyProvider>> {
        let providers = self
            .config
            .llm
            .chat_models()
            .into_iter()
            .map(|model| create_provider(&self.config, model, None))
            .collect::<anyhow::Result<Vec<_>>>()?;
        Ok(FallbackChain::new(providers))
    }

    /// # Errors
    ///
    /// Returns an error if a provider cannot be created.
    pub fn build_embedder(&self) -> anyhow::Result<EmbeddingService<AnyProvider>> {
        let models = self
            .config
            .llm
            .embedding_models()
            .into_iter()
            .map(|embed| create_provider(&self.config, self.config.llm.model.clone(), Some(embed)))
            .collect::<anyhow::Result<Vec<_>>>()?;
        Ok(EmbeddingService::new(models, self.config.indexing.embedding()))
    }

    /// # Errors
    ///
    /// Returns an error if the Qdrant client cannot be built.
    pub fn build_store(&self) -> anyhow::Result<Arc<dyn VectorStore>> {
        match self.config.vector.backend {
            VectorBackend::Memory => Ok(Arc::new(InMemoryVectorStore::new())),
            VectorBackend::Qdrant => {
                let ops = QdrantOps::new(&self.config.vector.qdrant_url).with_context(|| {
                    format!("failed to connect to qdrant at {}", self.config.vector.qdrant_url)
                })?;
                Ok(Arc::new(ops))
            }
        }
    }

    #[must_use]
    pub fn build_indexer(
        &self,
        embedder: impl Into<Embedder>,
        store: Arc<dyn VectorStore>,
    ) -> IndexingPipeline<AnyProvider> {
        IndexingPipeline::new(embedder, store, self.config.indexing.collection.clone())
    }

    /// The in-memory backend starts empty on every run, so it is filled from the chunk artifact.
    ///
    /// `embedder` must be the one later handed to the retrieval agent: a model
    /// switch during warm-up then carries over to query embedding.
    ///
    /// # Errors
    ///
    /// Returns an error if the chunk artifact cannot be read.
    pub async fn warm_store(
        &self,
        store: &Arc<dyn VectorStore>,
        embedder: &Embedder,
    ) -> anyhow::Result<Option<IndexReport>> {
        if self.config.vector.backend != VectorBackend::Memory {
            return Ok(None);
        }
        let chunks = &self.config.paths.chunks;
        if !chunks.exists() {
            tracing::warn!(path = %chunks.display(), "no chunk artifact, in-memory store stays empty");
            return Ok(None);
        }
        let indexer = self.build_indexer(Arc::clone(embedder), Arc::clone(store));
        let report = indexer
            .index_file(chunks)
            .await
            .with_context(|| format!("failed to index {}", chunks.display()))?;
        tracing::info!(indexed = report.indexed_chunks, failed = report.failed_chunks, "in-memory store warmed");
        Ok(Some(report))
    }

    /// Lexical index for hybrid search, built whenever the chunk artifact loads
    /// so per-request hybrid works even with `use_hybrid_search = false`.
    pub async fn build_lexical(&self) -> Option<Arc<LexicalIndex>> {
        let path = &self.config.paths.chunks;
        match LexicalIndex::from_jsonl(path).await {
            Ok(index) => {
                tracing::info!(chunks = index.len(), "lexical index built");
                Some(Arc::new(index))
            }
            Err(e) if self.config.retrieval.use_hybrid_search => {
                tracing::warn!(
                    path = %path.display(),
                    error = %e,
                    "lexical index unavailable, hybrid search degrades to vector only"
                );
                None
            }
            Err(e) => {
                tracing::debug!(path = %path.display(), error = %e, "no lexical index");
                None
            }
        }
    }

    #[must_use]
    pub fn build_retrieval_agent(
        &self,
        embedder: Embedder,
        store: Arc<dyn VectorStore>,
        lexical: Option<Arc<LexicalIndex>>,
    ) -> Agent {
        let semantic = SemanticSearch::new(store, embedder, self.config.indexing.collection.clone());
        RetrievalAgent::new(semantic, lexical, self.config.retrieval.into())
    }

    /// Wire everything `ask` needs.
    ///
    /// # Errors
    ///
    /// Returns an error if providers or the store cannot be built.
    pub async fn build_loop(&self) -> anyhow::Result<Loop> {
        let chain = self.build_chat_chain()?;
        if let Some(primary) = chain.providers().first() {
            health_check(primary).await;
        }
        let agent = self.build_search_agent().await?;
        Ok(GenerationLoop::new(chain, agent, self.config.loop_config()))
    }

    /// Store, warm-up, lexical index and retrieval agent over one shared embedder.
    ///
    /// # Errors
    ///
    /// Returns an error if providers or the store cannot be built, or warm-up
    /// cannot read the chunk artifact.
    pub async fn build_search_agent(&self) -> anyhow::Result<Agent> {
        let store = self.build_store()?;
        let embedder: Embedder = Arc::new(self.build_embedder()?);
        self.warm_store(&store, &embedder).await?;
        Ok(self.build_retrieval_agent(embedder, store, self.build_lexical().await))
    }
}

/// One provider for `model`; `embedding_model` defaults to the configured primary.
///
/// # Errors
///
/// Returns an error for the OpenAI backend without `BIDWISE_OPENAI_API_KEY`.
pub fn create_provider(
    config: &Config,
    model: String,
    embedding_model: Option<String>,
) -> anyhow::Result<AnyProvider> {
    let llm = &config.llm;
    match llm.provider {
        ProviderKind::Ollama => Ok(AnyProvider::Ollama(OllamaProvider::new(
            &llm.base_url,
            model,
            embedding_model.unwrap_or_else(|| llm.embedding_model.clone()),
        ))),
        ProviderKind::OpenAi => {
            let Some(key) = config.secrets.openai_api_key.as_ref() else {
                bail!("{OPENAI_API_KEY} not found in vault");
            };
            Ok(AnyProvider::OpenAi(OpenAiProvider::new(
                key.expose().to_owned(),
                llm.base_url.clone(),
                model,
                llm.max_tokens,
                Some(embedding_model.unwrap_or_else(|| llm.embedding_model.clone())),
            )))
        }
    }
}

pub async fn health_check(provider: &AnyProvider) {
    if let AnyProvider::Ollama(ollama) = provider {
        match ollama.health_check().await {
            Ok(()) => tracing::info!("ollama health check passed"),
            Err(e) => tracing::warn!("ollama health check failed: {e:#}"),
        }
    }
}
