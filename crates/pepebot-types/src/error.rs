//! Error types for the pepebot platform.
//!
//! Provides [`PepebotError`] as the top-level error type and
//! [`ChannelError`] for channel-specific failures. Both are
//! non-exhaustive to allow future extension without breaking downstream.

use thiserror::Error;

/// Top-level error type for the pepebot platform.
///
/// Variants are grouped into recoverable (provider, tool, cancellation)
/// and fatal (config, I/O) categories to guide callers on whether
/// retrying is worthwhile.
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum PepebotError {
    // ── Recoverable ──────────────────────────────────────────────────

    /// An LLM provider returned a transport, auth, or schema error.
    #[error("provider error: {message}")]
    Provider {
        /// Provider-supplied error message.
        message: String,
    },

    /// A tool invocation failed. The agent loop feeds this back to the
    /// model as tool-role content rather than aborting the turn.
    #[error("tool error: {message}")]
    Tool {
        /// Tool-supplied error message.
        message: String,
    },

    /// An operation exceeded its deadline.
    #[error("operation timed out: {operation}")]
    Timeout {
        /// Human-readable name of the operation that timed out.
        operation: String,
    },

    /// The user stopped an in-flight turn.
    #[error("processing cancelled")]
    Cancelled,

    /// Workflow validation or step execution failed.
    #[error("workflow error at step '{step}': {message}")]
    Workflow {
        /// Name of the failing step (or `"<validate>"`).
        step: String,
        /// What went wrong.
        message: String,
    },

    // ── Fatal ────────────────────────────────────────────────────────

    /// Configuration is missing, malformed, or semantically invalid.
    #[error("invalid config ({path}): {reason}")]
    ConfigInvalid {
        /// File or field the problem was found in.
        path: String,
        /// What is wrong with the configuration.
        reason: String,
    },

    /// Underlying I/O error.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization / deserialization error.
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    /// A channel-layer error bubbled up.
    #[error("channel error: {0}")]
    Channel(String),
}

/// Channel-specific error type.
///
/// Used by channel implementations to report failures in connecting,
/// authenticating, or exchanging messages.
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum ChannelError {
    /// Failed to establish a connection to the channel backend.
    #[error("connection failed: {0}")]
    ConnectionFailed(String),

    /// Authentication / authorization was rejected.
    #[error("authentication failed: {0}")]
    AuthFailed(String),

    /// Sending a message failed.
    #[error("send failed: {0}")]
    SendFailed(String),

    /// The requested channel was not found.
    #[error("channel not found: {0}")]
    NotFound(String),

    /// The channel is not currently connected.
    #[error("not connected")]
    NotConnected,
}

/// A convenience alias used throughout the workspace.
pub type Result<T> = std::result::Result<T, PepebotError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn provider_error_display() {
        let err = PepebotError::Provider {
            message: "HTTP 500".into(),
        };
        assert_eq!(err.to_string(), "provider error: HTTP 500");
    }

    #[test]
    fn config_error_names_path() {
        let err = PepebotError::ConfigInvalid {
            path: "~/.pepebot/config.json".into(),
            reason: "agents.max_tokens must be positive".into(),
        };
        let msg = err.to_string();
        assert!(msg.contains("config.json"));
        assert!(msg.contains("max_tokens"));
    }

    #[test]
    fn from_io() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "missing");
        let err: PepebotError = io_err.into();
        assert!(matches!(err, PepebotError::Io(_)));
        assert!(err.to_string().contains("missing"));
    }

    #[test]
    fn from_json() {
        let json_err = serde_json::from_str::<serde_json::Value>("{bad").unwrap_err();
        let err: PepebotError = json_err.into();
        assert!(matches!(err, PepebotError::Json(_)));
    }

    #[test]
    fn workflow_error_names_step() {
        let err = PepebotError::Workflow {
            step: "resize".into(),
            message: "tool not found: tap".into(),
        };
        assert!(err.to_string().contains("resize"));
    }

    #[test]
    fn channel_error_display() {
        assert_eq!(ChannelError::NotConnected.to_string(), "not connected");
        assert_eq!(
            ChannelError::AuthFailed("bad token".into()).to_string(),
            "authentication failed: bad token"
        );
    }
}
