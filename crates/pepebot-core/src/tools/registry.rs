//! Tool registry and [`Tool`] trait definition.
//!
//! Defines the contract every tool implementation satisfies and a
//! [`ToolRegistry`] that stores registered tools and dispatches
//! execution by name. Built-in tool implementations live in
//! `pepebot-tools`; remote MCP tools are bridged in by
//! `pepebot-services`.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// Error type for tool execution.
#[derive(Debug, thiserror::Error)]
pub enum ToolError {
    /// The requested tool was not found in the registry.
    #[error("tool not found: {0}")]
    NotFound(String),

    /// The arguments provided to the tool are invalid.
    #[error("invalid arguments: {0}")]
    InvalidArgs(String),

    /// The tool execution failed at runtime.
    #[error("execution failed: {0}")]
    ExecutionFailed(String),

    /// The tool execution exceeded its time limit.
    #[error("timeout after {0}s")]
    Timeout(u64),

    /// The execution was cancelled by the caller.
    #[error("cancelled")]
    Cancelled,
}

/// Per-invocation context handed to tools.
///
/// Carries the cancellation token for the turn plus the originating
/// envelope coordinates, so tools that produce side effects (like
/// sending a message) can address the right conversation.
#[derive(Debug, Clone)]
pub struct ToolContext {
    /// Cancellation for this turn; fires on `/stop` or shutdown.
    pub cancel: CancellationToken,
    /// Originating channel name (empty outside a conversation turn).
    pub channel: String,
    /// Originating chat id (empty outside a conversation turn).
    pub chat_id: String,
}

impl ToolContext {
    /// A context with the given cancellation and no conversation
    /// coordinates (workflow or administrative invocations).
    pub fn detached(cancel: CancellationToken) -> Self {
        Self {
            cancel,
            channel: String::new(),
            chat_id: String::new(),
        }
    }
}

impl Default for ToolContext {
    fn default() -> Self {
        Self::detached(CancellationToken::new())
    }
}

/// A tool the LLM may invoke.
///
/// Implementations provide a name, description, JSON Schema for
/// parameters, and an async `execute`. Handlers are expected to be
/// idempotent-enough for retry after user-initiated cancellation, but
/// are not required to be transactional.
#[async_trait]
pub trait Tool: Send + Sync {
    /// The unique name of this tool (used in LLM function calling).
    fn name(&self) -> &str;

    /// A human-readable description of what this tool does.
    fn description(&self) -> &str;

    /// JSON Schema describing the tool's parameters:
    /// `{type:"object", properties:{...}, required:[...]}`.
    fn parameters(&self) -> serde_json::Value;

    /// Execute the tool with the given arguments, returning its text
    /// output.
    async fn execute(
        &self,
        ctx: &ToolContext,
        args: serde_json::Value,
    ) -> Result<String, ToolError>;
}

/// Registry of available tools, indexed by name.
///
/// Registration takes a write lock; reads work on stable snapshots.
/// Registering an existing name replaces the prior entry
/// (last-write-wins).
pub struct ToolRegistry {
    tools: RwLock<HashMap<String, Arc<dyn Tool>>>,
}

impl ToolRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self {
            tools: RwLock::new(HashMap::new()),
        }
    }

    /// Register a tool. An existing tool with the same name is
    /// replaced.
    pub fn register(&self, tool: Arc<dyn Tool>) {
        let name = tool.name().to_string();
        let mut tools = self.tools.write().expect("tool registry lock poisoned");
        if tools.insert(name.clone(), tool).is_some() {
            debug!(tool = %name, "replaced existing tool registration");
        } else {
            debug!(tool = %name, "registered tool");
        }
    }

    /// Remove a tool by name. Used when an MCP server shuts down.
    pub fn unregister(&self, name: &str) -> bool {
        let mut tools = self.tools.write().expect("tool registry lock poisoned");
        tools.remove(name).is_some()
    }

    /// Whether a tool with this name exists.
    pub fn contains(&self, name: &str) -> bool {
        let tools = self.tools.read().expect("tool registry lock poisoned");
        tools.contains_key(name)
    }

    /// All registered tool names, sorted.
    pub fn names(&self) -> Vec<String> {
        let tools = self.tools.read().expect("tool registry lock poisoned");
        let mut names: Vec<String> = tools.keys().cloned().collect();
        names.sort();
        names
    }

    /// The parameter schema for one tool, for workflow validation.
    pub fn get_schema(&self, name: &str) -> Option<serde_json::Value> {
        let tools = self.tools.read().expect("tool registry lock poisoned");
        tools.get(name).map(|t| t.parameters())
    }

    /// Advertisable definitions in OpenAI function-calling format.
    pub fn definitions(&self) -> Vec<serde_json::Value> {
        let tools = self.tools.read().expect("tool registry lock poisoned");
        let mut defs: Vec<(String, serde_json::Value)> = tools
            .values()
            .map(|t| {
                (
                    t.name().to_string(),
                    serde_json::json!({
                        "type": "function",
                        "function": {
                            "name": t.name(),
                            "description": t.description(),
                            "parameters": t.parameters(),
                        }
                    }),
                )
            })
            .collect();
        defs.sort_by(|a, b| a.0.cmp(&b.0));
        defs.into_iter().map(|(_, v)| v).collect()
    }

    /// Dispatch a tool call by name.
    ///
    /// The lock is released before the handler runs, so a slow tool
    /// never blocks registration or other dispatches.
    pub async fn execute(
        &self,
        ctx: &ToolContext,
        name: &str,
        args: serde_json::Value,
    ) -> Result<String, ToolError> {
        let tool = {
            let tools = self.tools.read().expect("tool registry lock poisoned");
            tools
                .get(name)
                .cloned()
                .ok_or_else(|| ToolError::NotFound(name.to_string()))?
        };
        debug!(tool = %name, "executing tool");
        tool.execute(ctx, args).await
    }
}

impl Default for ToolRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct EchoTool {
        reply: String,
    }

    #[async_trait]
    impl Tool for EchoTool {
        fn name(&self) -> &str {
            "echo"
        }
        fn description(&self) -> &str {
            "Echo back the input text"
        }
        fn parameters(&self) -> serde_json::Value {
            serde_json::json!({
                "type": "object",
                "properties": {
                    "text": { "type": "string" }
                },
                "required": ["text"]
            })
        }
        async fn execute(
            &self,
            _ctx: &ToolContext,
            args: serde_json::Value,
        ) -> Result<String, ToolError> {
            let text = args
                .get("text")
                .and_then(|v| v.as_str())
                .ok_or_else(|| ToolError::InvalidArgs("missing 'text'".into()))?;
            Ok(format!("{}{}", self.reply, text))
        }
    }

    #[tokio::test]
    async fn register_and_execute() {
        let registry = ToolRegistry::new();
        registry.register(Arc::new(EchoTool { reply: "".into() }));

        let ctx = ToolContext::default();
        let out = registry
            .execute(&ctx, "echo", serde_json::json!({"text": "hi"}))
            .await
            .unwrap();
        assert_eq!(out, "hi");
    }

    #[tokio::test]
    async fn unknown_tool_not_found() {
        let registry = ToolRegistry::new();
        let ctx = ToolContext::default();
        let err = registry
            .execute(&ctx, "missing", serde_json::json!({}))
            .await
            .unwrap_err();
        assert!(matches!(err, ToolError::NotFound(_)));
    }

    #[tokio::test]
    async fn last_registration_wins() {
        let registry = ToolRegistry::new();
        registry.register(Arc::new(EchoTool { reply: "first:".into() }));
        registry.register(Arc::new(EchoTool { reply: "second:".into() }));

        let ctx = ToolContext::default();
        let out = registry
            .execute(&ctx, "echo", serde_json::json!({"text": "x"}))
            .await
            .unwrap();
        assert_eq!(out, "second:x");
        assert_eq!(registry.names(), vec!["echo"]);
    }

    #[test]
    fn definitions_use_function_schema_shape() {
        let registry = ToolRegistry::new();
        registry.register(Arc::new(EchoTool { reply: "".into() }));

        let defs = registry.definitions();
        assert_eq!(defs.len(), 1);
        assert_eq!(defs[0]["type"], "function");
        assert_eq!(defs[0]["function"]["name"], "echo");
        assert_eq!(defs[0]["function"]["parameters"]["type"], "object");
    }

    #[test]
    fn get_schema_for_validation() {
        let registry = ToolRegistry::new();
        registry.register(Arc::new(EchoTool { reply: "".into() }));

        let schema = registry.get_schema("echo").unwrap();
        assert_eq!(schema["required"][0], "text");
        assert!(registry.get_schema("missing").is_none());
    }

    #[test]
    fn unregister_removes() {
        let registry = ToolRegistry::new();
        registry.register(Arc::new(EchoTool { reply: "".into() }));
        assert!(registry.unregister("echo"));
        assert!(!registry.contains("echo"));
        assert!(!registry.unregister("echo"));
    }

    #[tokio::test]
    async fn tool_error_returned_verbatim() {
        let registry = ToolRegistry::new();
        registry.register(Arc::new(EchoTool { reply: "".into() }));

        let ctx = ToolContext::default();
        let err = registry
            .execute(&ctx, "echo", serde_json::json!({}))
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "invalid arguments: missing 'text'");
    }
}
