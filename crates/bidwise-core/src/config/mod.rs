mod env;
mod types;

#[cfg(test)]
mod tests;

pub use types::*;

use std::path::Path;

use anyhow::{Context, bail};

use crate::agent::LoopConfig;
use crate::vault::{Secret, VaultProvider};

pub const OPENAI_API_KEY: &str = "BIDWISE_OPENAI_API_KEY";

impl Config {
    /// Load configuration from a TOML file with env var overrides.
    ///
    /// Falls back to defaults when the file does not exist.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read or parsed.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let mut config = if path.exists() {
            let content = std::fs::read_to_string(path)
                .with_context(|| format!("failed to read config file {}", path.display()))?;
            toml::from_str::<Self>(&content).context("failed to parse config file")?
        } else {
            tracing::debug!(path = %path.display(), "config file not found, using defaults");
            Self::default()
        };

        config.apply_env_overrides();
        Ok(config)
    }

    /// Resolve sensitive configuration values through the vault.
    ///
    /// # Errors
    ///
    /// Returns an error if the vault backend fails.
    pub async fn resolve_secrets(&mut self, vault: &dyn VaultProvider) -> anyhow::Result<()> {
        if let Some(val) = vault.get_secret(OPENAI_API_KEY).await? {
            self.secrets.openai_api_key = Some(Secret::new(val));
        }
        Ok(())
    }

    /// Reject settings that would make chunking, fusion or the loop ill-defined.
    ///
    /// # Errors
    ///
    /// Returns the first violated constraint.
    pub fn validate(&self) -> anyhow::Result<()> {
        let c = &self.chunking;
        if c.chunk_size == 0 {
            bail!("chunking.chunk_size must be positive");
        }
        if c.min_chunk_size == 0 || c.min_chunk_size > c.chunk_size {
            bail!(
                "chunking.min_chunk_size must be in 1..={} (got {})",
                c.chunk_size,
                c.min_chunk_size
            );
        }
        if c.chunk_overlap >= c.chunk_size {
            bail!(
                "chunking.chunk_overlap ({}) must be smaller than chunk_size ({})",
                c.chunk_overlap,
                c.chunk_size
            );
        }

        let r = &self.retrieval;
        if r.top_k == 0 {
            bail!("retrieval.top_k must be positive");
        }
        if !(0.0..=1.0).contains(&r.hybrid_alpha) {
            bail!("retrieval.hybrid_alpha must be within [0, 1] (got {})", r.hybrid_alpha);
        }
        if !(0.0..=1.0).contains(&r.mmr_lambda) {
            bail!("retrieval.mmr_lambda must be within [0, 1] (got {})", r.mmr_lambda);
        }
        if r.candidate_multiplier == 0 {
            bail!("retrieval.candidate_multiplier must be positive");
        }

        if self.indexing.batch_size == 0 {
            bail!("indexing.batch_size must be positive");
        }
        if self.indexing.collection.trim().is_empty() {
            bail!("indexing.collection must not be empty");
        }

        if self.agent.context_cap == 0 {
            bail!("agent.context_cap must be positive");
        }
        if self.llm.model.trim().is_empty() {
            bail!("llm.model must not be empty");
        }
        if self.llm.embedding_model.trim().is_empty() {
            bail!("llm.embedding_model must not be empty");
        }
        if self.llm.max_tokens == 0 || self.llm.retry_max_tokens == 0 {
            bail!("llm token budgets must be positive");
        }
        Ok(())
    }

    #[must_use]
    pub fn loop_config(&self) -> LoopConfig {
        LoopConfig {
            max_retries: self.agent.max_retries,
            context_cap: self.agent.context_cap,
            min_response_chars: self.agent.min_response_chars,
            retrieval_top_k: self.retrieval.top_k,
            max_tokens: self.llm.max_tokens,
            retry_max_tokens: self.llm.retry_max_tokens,
        }
    }
}
