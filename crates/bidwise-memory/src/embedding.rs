use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use bidwise_llm::{LlmError, LlmProvider};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EmbeddingConfig {
    /// Texts sent per provider request.
    pub batch_size: usize,
    /// Extra attempts per batch after a transient failure.
    pub max_retries: u32,
    /// Fixed pause between attempts.
    pub retry_delay: Duration,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            batch_size: 100,
            max_retries: 3,
            retry_delay: Duration::from_secs(1),
        }
    }
}

/// Vectors in input order, tagged with the model that produced all of them.
#[derive(Debug, Clone, PartialEq)]
pub struct Embedded {
    pub vectors: Vec<Vec<f32>>,
    pub model: String,
}

/// Batched embedding over an ordered list of models.
///
/// A single call never mixes models: when a model fails, the whole input is
/// re-embedded with the next one. The model that last succeeded is tried first
/// on later calls so index and query vectors stay comparable.
pub struct EmbeddingService<P> {
    models: Vec<P>,
    config: EmbeddingConfig,
    active: AtomicUsize,
}

impl<P: LlmProvider> EmbeddingService<P> {
    #[must_use]
    pub fn new(models: Vec<P>, config: EmbeddingConfig) -> Self {
        let config = EmbeddingConfig {
            batch_size: config.batch_size.max(1),
            ..config
        };
        Self {
            models,
            config,
            active: AtomicUsize::new(0),
        }
    }

    #[must_use]
    pub fn config(&self) -> EmbeddingConfig {
        self.config
    }

    /// Name of the model that will be tried first.
    #[must_use]
    pub fn active_model(&self) -> Option<&str> {
        self.models
            .get(self.active.load(Ordering::Relaxed))
            .map(model_name)
    }

    /// Embed `texts`, preserving order.
    ///
    /// # Errors
    ///
    /// `LlmError::NoProviders` without models, otherwise the last model's error
    /// once every model has failed.
    pub async fn embed_batch(&self, texts: &[String]) -> Result<Embedded, LlmError> {
        if self.models.is_empty() {
            return Err(LlmError::NoProviders);
        }
        if texts.is_empty() {
            return Ok(Embedded {
                vectors: Vec::new(),
                model: self.active_model().unwrap_or_default().to_owned(),
            });
        }

        let start = self.active.load(Ordering::Relaxed);
        let order = (start..self.models.len()).chain(0..start);
        let mut last_err = LlmError::NoProviders;

        for index in order {
            let provider = &self.models[index];
            match self.embed_with(provider, texts).await {
                Ok(vectors) => {
                    if index != start {
                        tracing::warn!(
                            model = model_name(provider),
                            "switched embedding model"
                        );
                        self.active.store(index, Ordering::Relaxed);
                    }
                    return Ok(Embedded {
                        vectors,
                        model: model_name(provider).to_owned(),
                    });
                }
                Err(e) => {
                    tracing::warn!(
                        model = model_name(provider),
                        error = %e,
                        "embedding model failed, trying next"
                    );
                    last_err = e;
                }
            }
        }
        Err(last_err)
    }

    /// Embed one query string with the same model chain.
    ///
    /// # Errors
    ///
    /// Same as [`Self::embed_batch`].
    pub async fn embed_query(&self, text: &str) -> Result<Vec<f32>, LlmError> {
        let mut embedded = self.embed_batch(&[text.to_owned()]).await?;
        embedded.vectors.pop().ok_or_else(|| LlmError::EmptyResponse {
            provider: "embedding".into(),
        })
    }

    async fn embed_with(&self, provider: &P, texts: &[String]) -> Result<Vec<Vec<f32>>, LlmError> {
        let mut vectors = Vec::with_capacity(texts.len());
        for batch in texts.chunks(self.config.batch_size) {
            vectors.extend(self.embed_one_batch(provider, batch).await?);
        }
        Ok(vectors)
    }

    async fn embed_one_batch(
        &self,
        provider: &P,
        batch: &[String],
    ) -> Result<Vec<Vec<f32>>, LlmError> {
        let mut attempt = 0;
        loop {
            match provider.embed_batch(batch).await {
                Ok(vectors) if vectors.len() == batch.len() => return Ok(vectors),
                Ok(vectors) => {
                    return Err(LlmError::Other(format!(
                        "expected {} embeddings, got {}",
                        batch.len(),
                        vectors.len()
                    )));
                }
                Err(e) if e.is_access_error() => return Err(e),
                Err(e) if attempt >= self.config.max_retries => return Err(e),
                Err(e) => {
                    attempt += 1;
                    tracing::warn!(
                        model = model_name(provider),
                        attempt,
                        max_retries = self.config.max_retries,
                        error = %e,
                        "embedding batch failed, retrying"
                    );
                    tokio::time::sleep(self.config.retry_delay).await;
                }
            }
        }
    }
}

fn model_name<P: LlmProvider>(provider: &P) -> &str {
    provider.embedding_model().unwrap_or_else(|| provider.model())
}
