#[derive(Debug, thiserror::Error)]
pub enum LlmError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON parse failed: {0}")]
    Json(#[from] serde_json::Error),

    #[error("rate limited")]
    RateLimited,

    #[error("provider unavailable")]
    Unavailable,

    #[error("access denied by {provider} (status {status})")]
    AccessDenied { provider: String, status: u16 },

    #[error("model {model} not found on {provider}")]
    ModelNotFound { provider: String, model: String },

    #[error("empty response from {provider}")]
    EmptyResponse { provider: String },

    #[error("embedding not supported by {provider}")]
    EmbedUnsupported { provider: String },

    #[error("no providers available")]
    NoProviders,

    #[error("all {attempts} providers failed, last error: {last}")]
    Exhausted { attempts: usize, last: Box<LlmError> },

    #[error("{0}")]
    Other(String),
}

impl LlmError {
    /// Errors that will not go away by retrying the same model.
    #[must_use]
    pub fn is_access_error(&self) -> bool {
        match self {
            Self::AccessDenied { .. } | Self::ModelNotFound { .. } | Self::EmbedUnsupported { .. } => {
                true
            }
            Self::Exhausted { last, .. } => last.is_access_error(),
            _ => false,
        }
    }

    /// Map a non-success HTTP status into the provider error taxonomy.
    #[must_use]
    pub fn from_status(provider: &str, model: &str, status: reqwest::StatusCode) -> Self {
        match status.as_u16() {
            401 | 403 => Self::AccessDenied {
                provider: provider.to_owned(),
                status: status.as_u16(),
            },
            404 => Self::ModelNotFound {
                provider: provider.to_owned(),
                model: model.to_owned(),
            },
            429 => Self::RateLimited,
            500..=599 => Self::Unavailable,
            code => Self::Other(format!("{provider} request failed (status {code})")),
        }
    }
}

pub type Result<T> = std::result::Result<T, LlmError>;
