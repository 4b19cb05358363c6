//! Service-layer error types.

use thiserror::Error;

/// Errors from the service layer (MCP, cron).
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ServiceError {
    /// A transport-level MCP failure (spawn, I/O, HTTP, timeout).
    #[error("mcp transport error: {0}")]
    McpTransport(String),

    /// A protocol-level MCP failure (JSON-RPC error, bad response).
    #[error("mcp protocol error: {0}")]
    McpProtocol(String),

    /// An invalid cron schedule.
    #[error("invalid schedule: {0}")]
    InvalidSchedule(String),

    /// Underlying I/O error.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization / deserialization error.
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Result alias for service operations.
pub type Result<T> = std::result::Result<T, ServiceError>;
