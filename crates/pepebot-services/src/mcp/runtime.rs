//! MCP runtime: registry loading, server lifecycle, and tool bridging.
//!
//! Reads `mcp/registry.json`, connects each enabled server with the
//! transport its definition selects, discovers tools via `tools/list`,
//! and registers an [`McpRemoteTool`] for each in the shared
//! [`ToolRegistry`] under the qualified name `mcp_{server}_{tool}`.
//! Per-server failures are logged and skipped — a broken server costs
//! its tools, never the runtime.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use pepebot_core::tools::{Tool, ToolContext, ToolError, ToolRegistry};
use pepebot_types::mcp::{McpRegistryFile, McpServerDefinition, McpTransportKind};

use super::client::{McpSession, ToolDefinition};
use crate::error::{Result, ServiceError};

/// Owns the live MCP sessions and the tool names they registered.
pub struct McpRuntime {
    sessions: Mutex<HashMap<String, Arc<McpSession>>>,
    registered: Mutex<Vec<String>>,
}

impl McpRuntime {
    /// An empty runtime with no servers connected.
    pub fn new() -> Self {
        Self {
            sessions: Mutex::new(HashMap::new()),
            registered: Mutex::new(Vec::new()),
        }
    }

    /// Read the registry file and connect every enabled server.
    ///
    /// A missing file means no MCP servers; a corrupt one is logged
    /// and likewise treated as empty.
    pub async fn load(
        &self,
        registry_path: &std::path::Path,
        tools: &Arc<ToolRegistry>,
    ) -> usize {
        let registry: McpRegistryFile = match tokio::fs::read_to_string(registry_path).await {
            Ok(content) => match serde_json::from_str(&content) {
                Ok(registry) => registry,
                Err(e) => {
                    warn!(path = %registry_path.display(), error = %e, "corrupt mcp registry");
                    return 0;
                }
            },
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return 0,
            Err(e) => {
                warn!(path = %registry_path.display(), error = %e, "cannot read mcp registry");
                return 0;
            }
        };

        self.load_registry(&registry, tools).await
    }

    /// Connect every enabled server of an in-memory registry. Returns
    /// the number of tools registered.
    pub async fn load_registry(
        &self,
        registry: &McpRegistryFile,
        tools: &Arc<ToolRegistry>,
    ) -> usize {
        let mut total = 0;
        for (name, definition) in registry {
            if !definition.enabled {
                debug!(server = %name, "mcp server disabled, skipping");
                continue;
            }
            match self.connect_server(name, definition, tools).await {
                Ok(count) => {
                    info!(server = %name, tools = count, "mcp server connected");
                    total += count;
                }
                Err(e) => {
                    // Degrade gracefully: the server's tools are
                    // absent, everything else keeps working.
                    warn!(server = %name, error = %e, "mcp server failed, skipping");
                }
            }
        }
        total
    }

    /// Connect one server, discover its tools, and register them.
    pub async fn connect_server(
        &self,
        name: &str,
        definition: &McpServerDefinition,
        tools: &Arc<ToolRegistry>,
    ) -> Result<usize> {
        let session = match definition.transport {
            McpTransportKind::Stdio => {
                let command = definition.command.as_deref().ok_or_else(|| {
                    ServiceError::McpTransport(format!("server {name}: stdio requires a command"))
                })?;
                McpSession::connect_stdio(command, &definition.args, &definition.env).await?
            }
            McpTransportKind::Http | McpTransportKind::Sse => {
                let url = definition.url.clone().ok_or_else(|| {
                    ServiceError::McpTransport(format!(
                        "server {name}: {:?} transport requires a url",
                        definition.transport
                    ))
                })?;
                McpSession::connect_http(url, definition.headers.clone()).await?
            }
        };
        let session = Arc::new(session);

        let discovered = session.list_tools().await?;
        let mut count = 0;
        {
            let mut registered = self.registered.lock().await;
            for tool in discovered {
                let qualified = qualified_tool_name(name, &tool.name);
                tools.register(Arc::new(McpRemoteTool::new(
                    session.clone(),
                    qualified.clone(),
                    tool,
                )));
                registered.push(qualified);
                count += 1;
            }
        }

        let mut sessions = self.sessions.lock().await;
        if let Some(old) = sessions.insert(name.to_string(), session) {
            old.close().await;
        }
        Ok(count)
    }

    /// Names of currently connected servers.
    pub async fn server_names(&self) -> Vec<String> {
        let sessions = self.sessions.lock().await;
        let mut names: Vec<String> = sessions.keys().cloned().collect();
        names.sort();
        names
    }

    /// Close every session, unregister bridged tools, clear state.
    pub async fn close(&self, tools: &ToolRegistry) {
        let mut sessions = self.sessions.lock().await;
        for (name, session) in sessions.drain() {
            debug!(server = %name, "closing mcp session");
            session.close().await;
        }
        let mut registered = self.registered.lock().await;
        for name in registered.drain(..) {
            tools.unregister(&name);
        }
    }
}

impl Default for McpRuntime {
    fn default() -> Self {
        Self::new()
    }
}

/// Qualified registry name for a remote tool.
fn qualified_tool_name(server: &str, tool: &str) -> String {
    format!("mcp_{}_{}", sanitize(server), sanitize(tool))
}

/// Function-calling tool names must match `[a-zA-Z0-9_-]`.
fn sanitize(name: &str) -> String {
    name.chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '_' || c == '-' {
                c
            } else {
                '_'
            }
        })
        .collect()
}

/// A remote MCP tool bridged into the local tool registry.
pub struct McpRemoteTool {
    session: Arc<McpSession>,
    qualified_name: String,
    remote_name: String,
    description: String,
    schema: serde_json::Value,
}

impl McpRemoteTool {
    fn new(session: Arc<McpSession>, qualified_name: String, definition: ToolDefinition) -> Self {
        let schema = if definition.input_schema.is_object() {
            definition.input_schema
        } else {
            serde_json::json!({"type": "object", "properties": {}})
        };
        Self {
            session,
            qualified_name,
            remote_name: definition.name,
            description: definition.description,
            schema,
        }
    }
}

#[async_trait]
impl Tool for McpRemoteTool {
    fn name(&self) -> &str {
        &self.qualified_name
    }

    fn description(&self) -> &str {
        &self.description
    }

    fn parameters(&self) -> serde_json::Value {
        self.schema.clone()
    }

    async fn execute(
        &self,
        ctx: &ToolContext,
        args: serde_json::Value,
    ) -> std::result::Result<String, ToolError> {
        let call = self.session.call_tool(&self.remote_name, args);
        let result: std::result::Result<_, ServiceError> = tokio::select! {
            biased;
            _ = ctx.cancel.cancelled() => return Err(ToolError::Cancelled),
            result = call => result,
        };
        let value = result.map_err(|e| ToolError::ExecutionFailed(e.to_string()))?;
        Ok(shape_call_result(&value))
    }
}

/// Shape a `tools/call` result into tool-role text.
///
/// Concatenates `content[]` blocks of `type:"text"`; falls back to
/// `structuredContent` as JSON when no text is present; prefixes
/// `Error: ` when `isError` is set.
pub fn shape_call_result(value: &serde_json::Value) -> String {
    let mut text = String::new();
    if let Some(blocks) = value.get("content").and_then(|v| v.as_array()) {
        for block in blocks {
            if block.get("type").and_then(|v| v.as_str()) == Some("text") {
                if let Some(t) = block.get("text").and_then(|v| v.as_str()) {
                    if !text.is_empty() {
                        text.push('\n');
                    }
                    text.push_str(t);
                }
            }
        }
    }

    if text.is_empty() {
        if let Some(structured) = value.get("structuredContent") {
            text = serde_json::to_string(structured).unwrap_or_default();
        }
    }

    let is_error = value
        .get("isError")
        .and_then(|v| v.as_bool())
        .unwrap_or(false);
    if is_error {
        format!("Error: {text}")
    } else {
        text
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn qualified_names() {
        assert_eq!(qualified_tool_name("github", "create_issue"), "mcp_github_create_issue");
        assert_eq!(qualified_tool_name("my server", "do.it"), "mcp_my_server_do_it");
    }

    #[test]
    fn shape_concatenates_text_blocks() {
        let value = serde_json::json!({
            "content": [
                {"type": "text", "text": "line one"},
                {"type": "image", "data": "..."},
                {"type": "text", "text": "line two"}
            ]
        });
        assert_eq!(shape_call_result(&value), "line one\nline two");
    }

    #[test]
    fn shape_falls_back_to_structured_content() {
        let value = serde_json::json!({
            "content": [],
            "structuredContent": {"count": 3}
        });
        assert_eq!(shape_call_result(&value), r#"{"count":3}"#);
    }

    #[test]
    fn shape_prefixes_errors() {
        let value = serde_json::json!({
            "content": [{"type": "text", "text": "file not found"}],
            "isError": true
        });
        assert_eq!(shape_call_result(&value), "Error: file not found");
    }

    #[test]
    fn shape_empty_result() {
        assert_eq!(shape_call_result(&serde_json::json!({})), "");
    }

    #[tokio::test]
    async fn stdio_definition_without_command_rejected() {
        let runtime = McpRuntime::new();
        let tools = Arc::new(ToolRegistry::new());
        let definition = McpServerDefinition {
            enabled: true,
            transport: McpTransportKind::Stdio,
            url: None,
            command: None,
            args: vec![],
            env: HashMap::new(),
            headers: HashMap::new(),
            source: Default::default(),
            skill: None,
        };
        let err = runtime
            .connect_server("broken", &definition, &tools)
            .await
            .unwrap_err();
        assert!(err.to_string().contains("requires a command"));
    }

    #[tokio::test]
    async fn missing_registry_file_is_empty() {
        let runtime = McpRuntime::new();
        let tools = Arc::new(ToolRegistry::new());
        let count = runtime
            .load(std::path::Path::new("/nonexistent/registry.json"), &tools)
            .await;
        assert_eq!(count, 0);
        assert!(runtime.server_names().await.is_empty());
    }

    /// A failing server degrades gracefully: the registry load reports
    /// zero tools and the rest of the system keeps its registry.
    #[tokio::test]
    async fn failed_server_skipped() {
        let runtime = McpRuntime::new();
        let tools = Arc::new(ToolRegistry::new());

        let mut registry = McpRegistryFile::new();
        registry.insert(
            "ghost".into(),
            McpServerDefinition {
                enabled: true,
                transport: McpTransportKind::Http,
                // Nothing listens here; connect fails fast.
                url: Some("http://127.0.0.1:9/rpc".into()),
                command: None,
                args: vec![],
                env: HashMap::new(),
                headers: HashMap::new(),
                source: Default::default(),
                skill: None,
            },
        );

        let count = runtime.load_registry(&registry, &tools).await;
        assert_eq!(count, 0);
        assert!(tools.names().is_empty());
    }

    #[tokio::test]
    async fn disabled_server_skipped() {
        let runtime = McpRuntime::new();
        let tools = Arc::new(ToolRegistry::new());

        let mut registry = McpRegistryFile::new();
        registry.insert(
            "off".into(),
            McpServerDefinition {
                enabled: false,
                transport: McpTransportKind::Stdio,
                url: None,
                command: Some("/nonexistent".into()),
                args: vec![],
                env: HashMap::new(),
                headers: HashMap::new(),
                source: Default::default(),
                skill: None,
            },
        );

        assert_eq!(runtime.load_registry(&registry, &tools).await, 0);
    }

    /// End-to-end over a line-mode scripted server: initialize,
    /// discover, bridge into the registry, call through it.
    #[cfg(unix)]
    #[tokio::test]
    async fn stdio_server_tools_bridged_and_callable() {
        let script = r#"while IFS= read -r line; do
  case "$line" in
    *'"initialize"'*) printf '%s\n' '{"jsonrpc":"2.0","id":1,"result":{"protocolVersion":"2024-11-05","capabilities":{},"serverInfo":{"name":"fixture","version":"1.0"}}}' ;;
    *'"tools/list"'*) printf '%s\n' '{"jsonrpc":"2.0","id":2,"result":{"tools":[{"name":"ping","description":"Replies pong","inputSchema":{"type":"object","properties":{}}}]}}' ;;
    *'"tools/call"'*) printf '%s\n' '{"jsonrpc":"2.0","id":3,"result":{"content":[{"type":"text","text":"pong"}]}}' ;;
  esac
done"#;

        let runtime = McpRuntime::new();
        let tools = Arc::new(ToolRegistry::new());

        let definition = McpServerDefinition {
            enabled: true,
            transport: McpTransportKind::Stdio,
            url: None,
            command: Some("sh".into()),
            args: vec!["-c".into(), script.into()],
            env: HashMap::new(),
            headers: HashMap::new(),
            source: Default::default(),
            skill: None,
        };

        // Note: the header-mode probe times out first (8s budget), so
        // this test trades a few seconds for full-path coverage.
        let count = runtime
            .connect_server("fixture", &definition, &tools)
            .await
            .unwrap();
        assert_eq!(count, 1);
        assert!(tools.contains("mcp_fixture_ping"));

        let ctx = ToolContext::default();
        let out = tools
            .execute(&ctx, "mcp_fixture_ping", serde_json::json!({}))
            .await
            .unwrap();
        assert_eq!(out, "pong");

        runtime.close(&tools).await;
        assert!(!tools.contains("mcp_fixture_ping"));
    }
}
