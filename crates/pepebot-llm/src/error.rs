//! Provider error types.

use thiserror::Error;

/// Errors from LLM provider calls.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ProviderError {
    /// The provider is missing credentials or configuration.
    #[error("provider not configured: {0}")]
    NotConfigured(String),

    /// Authentication was rejected (HTTP 401/403).
    #[error("authentication failed: {0}")]
    AuthFailed(String),

    /// The requested model does not exist (HTTP 404).
    #[error("model not found: {0}")]
    ModelNotFound(String),

    /// The request failed at the transport or server level.
    #[error("request failed: {0}")]
    RequestFailed(String),

    /// The response body could not be parsed.
    #[error("invalid response: {0}")]
    InvalidResponse(String),

    /// The request was cancelled by the caller.
    #[error("request cancelled")]
    Cancelled,

    /// Underlying HTTP client error.
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),
}

/// Result alias for provider operations.
pub type Result<T> = std::result::Result<T, ProviderError>;

impl From<ProviderError> for pepebot_types::PepebotError {
    fn from(err: ProviderError) -> Self {
        pepebot_types::PepebotError::Provider {
            message: err.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_messages() {
        assert_eq!(
            ProviderError::NotConfigured("set OPENAI_API_KEY".into()).to_string(),
            "provider not configured: set OPENAI_API_KEY"
        );
        assert_eq!(ProviderError::Cancelled.to_string(), "request cancelled");
    }

    #[test]
    fn converts_to_pepebot_error() {
        let err: pepebot_types::PepebotError =
            ProviderError::RequestFailed("HTTP 500".into()).into();
        assert!(err.to_string().contains("HTTP 500"));
    }
}
