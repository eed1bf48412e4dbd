//! Test-only mock LLM provider.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use crate::error::LlmError;
use crate::provider::{ChatOptions, LlmProvider, Message};

/// A chat call observed by the mock.
#[derive(Debug, Clone)]
pub struct RecordedRequest {
    pub messages: Vec<Message>,
    pub max_tokens: Option<u32>,
}

#[derive(Debug, Clone)]
pub struct MockProvider {
    responses: Arc<Mutex<Vec<String>>>,
    recorded: Arc<Mutex<Vec<RecordedRequest>>>,
    embed_failures: Arc<AtomicUsize>,
    embed_calls: Arc<AtomicUsize>,
    pub model: String,
    pub default_response: String,
    pub embedding: Vec<f32>,
    /// When set, embeddings count occurrences of each keyword (case-insensitive).
    pub keywords: Option<Vec<String>>,
    pub supports_embeddings: bool,
    pub fail_chat: bool,
    pub deny_embeddings: bool,
}

impl Default for MockProvider {
    fn default() -> Self {
        Self {
            responses: Arc::new(Mutex::new(Vec::new())),
            recorded: Arc::new(Mutex::new(Vec::new())),
            embed_failures: Arc::new(AtomicUsize::new(0)),
            embed_calls: Arc::new(AtomicUsize::new(0)),
            model: "mock-model".into(),
            default_response: "mock response".into(),
            embedding: vec![0.0; 8],
            keywords: None,
            supports_embeddings: false,
            fail_chat: false,
            deny_embeddings: false,
        }
    }
}

impl MockProvider {
    /// Responses are returned in order, then `default_response` repeats.
    #[must_use]
    pub fn with_responses(responses: Vec<String>) -> Self {
        Self {
            responses: Arc::new(Mutex::new(responses)),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn failing() -> Self {
        Self {
            fail_chat: true,
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_model(mut self, model: &str) -> Self {
        self.model = model.into();
        self
    }

    #[must_use]
    pub fn with_default_response(mut self, response: &str) -> Self {
        self.default_response = response.into();
        self
    }

    /// Keyword-count embeddings: dimension `i` counts occurrences of `keywords[i]`.
    #[must_use]
    pub fn with_keyword_embeddings(mut self, keywords: &[&str]) -> Self {
        self.keywords = Some(keywords.iter().map(|k| k.to_lowercase()).collect());
        self.supports_embeddings = true;
        self
    }

    /// The next `n` embedding calls fail with a transient error.
    #[must_use]
    pub fn with_embed_failures(self, n: usize) -> Self {
        self.embed_failures.store(n, Ordering::SeqCst);
        self
    }

    /// Embedding calls fail with an access error, as for a model the key cannot use.
    #[must_use]
    pub fn denying_embeddings(mut self) -> Self {
        self.supports_embeddings = true;
        self.deny_embeddings = true;
        self
    }

    #[must_use]
    pub fn recorded(&self) -> Vec<RecordedRequest> {
        self.recorded.lock().unwrap().clone()
    }

    #[must_use]
    pub fn embed_calls(&self) -> usize {
        self.embed_calls.load(Ordering::SeqCst)
    }

    fn check_embed(&self) -> Result<(), LlmError> {
        self.embed_calls.fetch_add(1, Ordering::SeqCst);
        if !self.supports_embeddings {
            return Err(LlmError::EmbedUnsupported {
                provider: "mock".into(),
            });
        }
        if self.deny_embeddings {
            return Err(LlmError::AccessDenied {
                provider: "mock".into(),
                status: 403,
            });
        }
        let remaining = self.embed_failures.load(Ordering::SeqCst);
        if remaining > 0 {
            self.embed_failures.store(remaining - 1, Ordering::SeqCst);
            return Err(LlmError::Unavailable);
        }
        Ok(())
    }

    #[allow(clippy::cast_precision_loss)]
    fn vector_for(&self, text: &str) -> Vec<f32> {
        match &self.keywords {
            Some(keywords) => {
                let lower = text.to_lowercase();
                keywords
                    .iter()
                    .map(|k| lower.matches(k.as_str()).count() as f32)
                    .collect()
            }
            None => self.embedding.clone(),
        }
    }
}

impl LlmProvider for MockProvider {
    async fn chat(&self, messages: &[Message]) -> Result<String, LlmError> {
        self.chat_with_options(messages, &ChatOptions::default())
            .await
    }

    async fn chat_with_options(
        &self,
        messages: &[Message],
        options: &ChatOptions,
    ) -> Result<String, LlmError> {
        self.recorded.lock().unwrap().push(RecordedRequest {
            messages: messages.to_vec(),
            max_tokens: options.max_tokens,
        });
        if self.fail_chat {
            return Err(LlmError::Other("mock LLM error".into()));
        }
        let mut responses = self.responses.lock().unwrap();
        if responses.is_empty() {
            Ok(self.default_response.clone())
        } else {
            Ok(responses.remove(0))
        }
    }

    async fn embed(&self, text: &str) -> Result<Vec<f32>, LlmError> {
        self.check_embed()?;
        Ok(self.vector_for(text))
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, LlmError> {
        self.check_embed()?;
        Ok(texts.iter().map(|t| self.vector_for(t)).collect())
    }

    fn supports_embeddings(&self) -> bool {
        self.supports_embeddings
    }

    #[allow(clippy::unnecessary_literal_bound)]
    fn name(&self) -> &str {
        "mock"
    }

    fn model(&self) -> &str {
        &self.model
    }

    fn embedding_model(&self) -> Option<&str> {
        self.supports_embeddings.then_some(self.model.as_str())
    }
}
