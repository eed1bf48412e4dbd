//! LLM provider abstraction, backend implementations and ordered fallback.

pub mod any;
pub mod error;
pub mod fallback;
pub mod http;
#[cfg(any(test, feature = "mock"))]
pub mod mock;
pub mod ollama;
pub mod openai;
pub mod provider;
pub(crate) mod retry;

pub use error::LlmError;
pub use fallback::{Completion, FallbackChain};
pub use provider::{ChatOptions, LlmProvider, Message, Role};
