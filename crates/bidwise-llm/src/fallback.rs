use crate::error::LlmError;
use crate::provider::{ChatOptions, LlmProvider, Message};

/// Ordered list of providers tried one after another.
///
/// The chain itself never changes; each successful call reports which provider
/// served it through [`Completion`].
#[derive(Debug, Clone)]
pub struct FallbackChain<P> {
    providers: Vec<P>,
}

/// Text produced by a chain together with the provider that produced it.
#[derive(Debug)]
pub struct Completion<'a, P> {
    pub text: String,
    pub provider: &'a P,
    /// Index of `provider` inside the chain; `0` means no fallback happened.
    pub position: usize,
}

impl<P: LlmProvider> Completion<'_, P> {
    /// `provider:model` label for diagnostics.
    #[must_use]
    pub fn served_by(&self) -> String {
        format!("{}:{}", self.provider.name(), self.provider.model())
    }
}

impl<P: LlmProvider> FallbackChain<P> {
    #[must_use]
    pub fn new(providers: Vec<P>) -> Self {
        Self { providers }
    }

    #[must_use]
    pub fn providers(&self) -> &[P] {
        &self.providers
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.providers.is_empty()
    }

    /// Try each provider in order and return the first success.
    ///
    /// # Errors
    ///
    /// `LlmError::NoProviders` for an empty chain, otherwise `LlmError::Exhausted`
    /// carrying the last provider's error.
    pub async fn complete(
        &self,
        messages: &[Message],
        options: &ChatOptions,
    ) -> Result<Completion<'_, P>, LlmError> {
        let mut last = None;
        for (position, provider) in self.providers.iter().enumerate() {
            match provider.chat_with_options(messages, options).await {
                Ok(text) => {
                    if position > 0 {
                        tracing::info!(
                            provider = provider.name(),
                            model = provider.model(),
                            position,
                            "served by fallback provider"
                        );
                    }
                    return Ok(Completion {
                        text,
                        provider,
                        position,
                    });
                }
                Err(e) => {
                    tracing::warn!(
                        provider = provider.name(),
                        model = provider.model(),
                        error = %e,
                        "chat fallback"
                    );
                    last = Some(e);
                }
            }
        }
        Err(exhausted(self.providers.len(), last))
    }
}

fn exhausted(attempts: usize, last: Option<LlmError>) -> LlmError {
    match last {
        Some(last) => LlmError::Exhausted {
            attempts,
            last: Box::new(last),
        },
        None => LlmError::NoProviders,
    }
}

impl<P: LlmProvider> LlmProvider for FallbackChain<P> {
    async fn chat(&self, messages: &[Message]) -> Result<String, LlmError> {
        self.complete(messages, &ChatOptions::default())
            .await
            .map(|c| c.text)
    }

    async fn chat_with_options(
        &self,
        messages: &[Message],
        options: &ChatOptions,
    ) -> Result<String, LlmError> {
        self.complete(messages, options).await.map(|c| c.text)
    }

    async fn embed(&self, text: &str) -> Result<Vec<f32>, LlmError> {
        let mut last = None;
        for p in self.providers.iter().filter(|p| p.supports_embeddings()) {
            match p.embed(text).await {
                Ok(v) => return Ok(v),
                Err(e) => {
                    tracing::warn!(provider = p.name(), error = %e, "embed fallback");
                    last = Some(e);
                }
            }
        }
        Err(exhausted(self.providers.len(), last))
    }

    fn supports_embeddings(&self) -> bool {
        self.providers.iter().any(LlmProvider::supports_embeddings)
    }

    #[allow(clippy::unnecessary_literal_bound)]
    fn name(&self) -> &str {
        "fallback"
    }

    fn model(&self) -> &str {
        self.providers.first().map_or("", LlmProvider::model)
    }

    fn embedding_model(&self) -> Option<&str> {
        self.providers.iter().find_map(LlmProvider::embedding_model)
    }
}
