//! MCP client and session handshake.
//!
//! [`McpClient`] issues JSON-RPC calls with monotonic request ids over
//! a transport, serializing one request in flight at a time.
//! [`McpSession`] wraps a client that has completed the `initialize` /
//! `notifications/initialized` handshake.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;

use super::transport::{HttpTransport, McpTransport, StdioTransport};
use super::types::JsonRpcRequest;
use super::MCP_PROTOCOL_VERSION;
use crate::error::{Result, ServiceError};

/// Server information returned from the initialize handshake.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ServerInfo {
    /// Server name.
    #[serde(default)]
    pub name: String,
    /// Server version.
    #[serde(default)]
    pub version: String,
}

/// Definition of an MCP tool as advertised by `tools/list`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolDefinition {
    /// Tool name.
    pub name: String,
    /// Human-readable description.
    #[serde(default)]
    pub description: String,
    /// JSON Schema for the tool's input parameters.
    #[serde(rename = "inputSchema", alias = "input_schema", default)]
    pub input_schema: serde_json::Value,
}

/// Client for one MCP server.
pub struct McpClient {
    transport: Box<dyn McpTransport>,
    request_id: AtomicU64,
    /// One request in flight per client at a time.
    request_lock: Mutex<()>,
}

impl McpClient {
    /// Create a client with ids starting at 1.
    pub fn new(transport: Box<dyn McpTransport>) -> Self {
        Self::with_start_id(transport, 1)
    }

    /// Create a client whose ids start at `next_id` (used when the
    /// initialize exchange already consumed earlier ids).
    pub fn with_start_id(transport: Box<dyn McpTransport>, next_id: u64) -> Self {
        Self {
            transport,
            request_id: AtomicU64::new(next_id),
            request_lock: Mutex::new(()),
        }
    }

    /// List all tools available on the server.
    pub async fn list_tools(&self) -> Result<Vec<ToolDefinition>> {
        let result = self.send_raw("tools/list", serde_json::json!({})).await?;
        let tools_value = result
            .get("tools")
            .cloned()
            .unwrap_or_else(|| serde_json::Value::Array(vec![]));
        let tools: Vec<ToolDefinition> = serde_json::from_value(tools_value)?;
        Ok(tools)
    }

    /// Call a tool with the given arguments, returning the raw
    /// `tools/call` result object.
    pub async fn call_tool(
        &self,
        name: &str,
        arguments: serde_json::Value,
    ) -> Result<serde_json::Value> {
        self.send_raw(
            "tools/call",
            serde_json::json!({
                "name": name,
                "arguments": arguments,
            }),
        )
        .await
    }

    /// Send a raw request and return the `result` value, mapping
    /// JSON-RPC errors to [`ServiceError::McpProtocol`].
    pub async fn send_raw(
        &self,
        method: &str,
        params: serde_json::Value,
    ) -> Result<serde_json::Value> {
        let _guard = self.request_lock.lock().await;
        let id = self.request_id.fetch_add(1, Ordering::Relaxed);
        let request = JsonRpcRequest::new(id, method, params);
        let response = self.transport.send_request(request).await?;

        if let Some(err) = response.error {
            return Err(ServiceError::McpProtocol(format!(
                "code={}, message={}",
                err.code, err.message
            )));
        }
        response
            .result
            .ok_or_else(|| ServiceError::McpProtocol("empty result".into()))
    }

    /// Access the underlying transport.
    pub fn transport(&self) -> &dyn McpTransport {
        &*self.transport
    }
}

impl std::fmt::Debug for McpClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("McpClient")
            .field("request_id", &self.request_id.load(Ordering::Relaxed))
            .finish_non_exhaustive()
    }
}

/// An MCP session that has completed the initialize handshake.
pub struct McpSession {
    client: McpClient,
    /// Server identification (name + version).
    pub server_info: ServerInfo,
    /// Protocol version negotiated with the server.
    pub protocol_version: String,
}

impl McpSession {
    /// The initialize parameters this client sends.
    fn init_params() -> serde_json::Value {
        serde_json::json!({
            "protocolVersion": MCP_PROTOCOL_VERSION,
            "capabilities": { "tools": {} },
            "clientInfo": {
                "name": "pepebot",
                "version": env!("CARGO_PKG_VERSION")
            }
        })
    }

    /// Connect over an already-constructed transport (HTTP/SSE, or a
    /// test mock): send `initialize`, parse the reply, then send the
    /// `initialized` notification.
    pub async fn connect(transport: Box<dyn McpTransport>) -> Result<Self> {
        let client = McpClient::new(transport);
        let init_result = client.send_raw("initialize", Self::init_params()).await?;
        Self::finish_handshake(client, &init_result).await
    }

    /// Connect over HTTP.
    pub async fn connect_http(
        url: String,
        headers: HashMap<String, String>,
    ) -> Result<Self> {
        Self::connect(Box::new(HttpTransport::new(url, headers))).await
    }

    /// Connect over stdio, negotiating the framing mode as part of the
    /// initialize exchange.
    pub async fn connect_stdio(
        command: &str,
        args: &[String],
        env: &HashMap<String, String>,
    ) -> Result<Self> {
        let init_request = JsonRpcRequest::new(1, "initialize", Self::init_params());
        let (transport, response) = StdioTransport::connect(command, args, env, init_request).await?;

        if let Some(err) = response.error {
            transport.close().await;
            return Err(ServiceError::McpProtocol(format!(
                "initialize failed: code={}, message={}",
                err.code, err.message
            )));
        }
        let init_result = response
            .result
            .ok_or_else(|| ServiceError::McpProtocol("empty initialize result".into()))?;

        // The negotiation consumed id 1.
        let client = McpClient::with_start_id(Box::new(transport), 2);
        Self::finish_handshake(client, &init_result).await
    }

    async fn finish_handshake(
        client: McpClient,
        init_result: &serde_json::Value,
    ) -> Result<Self> {
        let server_info: ServerInfo =
            serde_json::from_value(init_result.get("serverInfo").cloned().unwrap_or_default())
                .unwrap_or_default();
        let protocol_version = init_result
            .get("protocolVersion")
            .and_then(|v| v.as_str())
            .unwrap_or(MCP_PROTOCOL_VERSION)
            .to_string();

        client
            .transport()
            .send_notification("notifications/initialized", serde_json::json!({}))
            .await?;

        Ok(Self {
            client,
            server_info,
            protocol_version,
        })
    }

    /// List tools on the connected server.
    pub async fn list_tools(&self) -> Result<Vec<ToolDefinition>> {
        self.client.list_tools().await
    }

    /// Call a tool on the connected server.
    pub async fn call_tool(
        &self,
        name: &str,
        arguments: serde_json::Value,
    ) -> Result<serde_json::Value> {
        self.client.call_tool(name, arguments).await
    }

    /// Tear down the session's transport.
    pub async fn close(&self) {
        self.client.transport().close().await;
    }
}

impl std::fmt::Debug for McpSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("McpSession")
            .field("server_info", &self.server_info)
            .field("protocol_version", &self.protocol_version)
            .finish_non_exhaustive()
    }
}
