//! MCP (Model Context Protocol) client runtime.
//!
//! Speaks JSON-RPC 2.0 to external tool servers over stdio subprocesses
//! or HTTP, discovers their tools, and bridges them into the pepebot
//! tool registry under qualified names.

pub mod client;
pub mod framing;
pub mod runtime;
pub mod transport;
pub mod types;

pub use client::{McpClient, McpSession, ServerInfo, ToolDefinition};
pub use runtime::McpRuntime;

/// The MCP protocol version sent during initialize.
pub const MCP_PROTOCOL_VERSION: &str = "2024-11-05";
