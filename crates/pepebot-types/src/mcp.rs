//! MCP server definition types.
//!
//! External tool servers are declared in `mcp/registry.json`, keyed by
//! server name. Each entry selects a transport (stdio subprocess, HTTP,
//! or SSE) and records where the entry came from so skill-installed
//! servers can be removed with their skill.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

fn default_true() -> bool {
    true
}

/// How the client talks to an MCP server.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum McpTransportKind {
    /// Spawn a subprocess and speak JSON-RPC over stdin/stdout.
    #[default]
    Stdio,
    /// POST JSON-RPC bodies to a URL.
    Http,
    /// Like HTTP, but the server may answer with an event stream.
    Sse,
}

/// Who installed an MCP server entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum McpSource {
    /// Added by the operator.
    #[default]
    User,
    /// Installed as part of a skill.
    Skill,
}

/// Definition of one MCP server.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct McpServerDefinition {
    /// Whether the runtime connects to this server at load time.
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Transport selection.
    #[serde(default)]
    pub transport: McpTransportKind,

    /// Endpoint URL (http/sse only).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,

    /// Executable to spawn (stdio only).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub command: Option<String>,

    /// Arguments for the spawned executable (stdio only).
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub args: Vec<String>,

    /// Environment variables for the spawned executable (stdio only).
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub env: HashMap<String, String>,

    /// Extra HTTP headers (http/sse only).
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub headers: HashMap<String, String>,

    /// Who installed this entry.
    #[serde(default)]
    pub source: McpSource,

    /// Back-reference to the installing skill, when `source == Skill`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub skill: Option<String>,
}

/// On-disk shape of `mcp/registry.json`: name → definition.
pub type McpRegistryFile = HashMap<String, McpServerDefinition>;
