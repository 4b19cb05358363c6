//! Configuration schema and environment overlay.
//!
//! The root [`Config`] is deserialized from `~/.pepebot/config.json`.
//! All structs use `#[serde(default)]` so a partial file is valid and
//! unknown fields are ignored for forward compatibility.
//!
//! Environment overlay happens in two layers (lowest to highest
//! precedence): file values, `PEPEBOT_<SECTION>_<FIELD>` variables,
//! then native variables such as `OPENAI_API_KEY`.

use std::collections::HashMap;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

fn default_true() -> bool {
    true
}

/// Root configuration for pepebot.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    /// Agent defaults.
    #[serde(default)]
    pub agents: AgentsConfig,

    /// LLM provider credentials and endpoints.
    #[serde(default)]
    pub providers: HashMap<String, ProviderSettings>,

    /// Chat channel configurations.
    #[serde(default)]
    pub channels: HashMap<String, ChannelSettings>,

    /// Tool configuration.
    #[serde(default)]
    pub tools: ToolsConfig,
}

impl Config {
    /// Get the expanded workspace path (`~` resolved against the home
    /// directory).
    pub fn workspace_path(&self) -> PathBuf {
        expand_home(&self.agents.workspace)
    }

    /// Apply the two environment layers onto this config.
    ///
    /// Layer 1: `PEPEBOT_<SECTION>_<FIELD>` (e.g. `PEPEBOT_AGENTS_MODEL`,
    /// `PEPEBOT_PROVIDERS_OPENAI_API_KEY`). Layer 2: native variables
    /// (`OPENAI_API_KEY`, `OPENROUTER_API_KEY`, `DEEPSEEK_API_KEY`,
    /// `TELEGRAM_BOT_TOKEN`, `DISCORD_BOT_TOKEN`), which win when set.
    pub fn apply_env_overlay(&mut self) {
        if let Ok(v) = std::env::var("PEPEBOT_AGENTS_MODEL") {
            self.agents.model = v;
        }
        if let Ok(v) = std::env::var("PEPEBOT_AGENTS_WORKSPACE") {
            self.agents.workspace = v;
        }
        if let Ok(v) = std::env::var("PEPEBOT_AGENTS_MAX_TOKENS") {
            if let Ok(n) = v.parse() {
                self.agents.max_tokens = n;
            }
        }
        if let Ok(v) = std::env::var("PEPEBOT_AGENTS_MAX_TOOL_ITERATIONS") {
            if let Ok(n) = v.parse() {
                self.agents.max_tool_iterations = n;
            }
        }

        for (name, key_var) in [
            ("openai", "PEPEBOT_PROVIDERS_OPENAI_API_KEY"),
            ("openrouter", "PEPEBOT_PROVIDERS_OPENROUTER_API_KEY"),
            ("deepseek", "PEPEBOT_PROVIDERS_DEEPSEEK_API_KEY"),
        ] {
            if let Ok(v) = std::env::var(key_var) {
                self.providers.entry(name.into()).or_default().api_key = Some(v);
            }
        }

        // Native variables overlay the PEPEBOT_ layer.
        for (name, key_var) in [
            ("openai", "OPENAI_API_KEY"),
            ("openrouter", "OPENROUTER_API_KEY"),
            ("deepseek", "DEEPSEEK_API_KEY"),
        ] {
            if let Ok(v) = std::env::var(key_var) {
                self.providers.entry(name.into()).or_default().api_key = Some(v);
            }
        }

        for (name, token_var) in [
            ("telegram", "TELEGRAM_BOT_TOKEN"),
            ("discord", "DISCORD_BOT_TOKEN"),
        ] {
            if let Ok(v) = std::env::var(token_var) {
                self.channels.entry(name.into()).or_default().token = Some(v);
            }
        }
    }
}

/// Default agent settings, applied to every agent unless its
/// definition overrides them.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentsConfig {
    /// Working directory for agent file operations and bootstrap files.
    #[serde(default = "default_workspace")]
    pub workspace: String,

    /// Default provider-qualified model identifier (`prefix/name`).
    #[serde(default = "default_model")]
    pub model: String,

    /// Maximum tokens in a single LLM response.
    #[serde(default = "default_max_tokens", alias = "maxTokens")]
    pub max_tokens: u32,

    /// Sampling temperature.
    #[serde(default = "default_temperature")]
    pub temperature: f64,

    /// Maximum tool-use iterations per turn.
    #[serde(default = "default_max_tool_iterations", alias = "maxToolIterations")]
    pub max_tool_iterations: u32,

    /// Number of recent messages to include in context.
    #[serde(default = "default_memory_window", alias = "memoryWindow")]
    pub memory_window: usize,
}

fn default_workspace() -> String {
    "~/.pepebot/workspace".into()
}
fn default_model() -> String {
    "openai/gpt-4o-mini".into()
}
fn default_max_tokens() -> u32 {
    8192
}
fn default_temperature() -> f64 {
    0.7
}
fn default_max_tool_iterations() -> u32 {
    20
}
fn default_memory_window() -> usize {
    50
}

impl Default for AgentsConfig {
    fn default() -> Self {
        Self {
            workspace: default_workspace(),
            model: default_model(),
            max_tokens: default_max_tokens(),
            temperature: default_temperature(),
            max_tool_iterations: default_max_tool_iterations(),
            memory_window: default_memory_window(),
        }
    }
}

/// Per-provider settings.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ProviderSettings {
    /// API key. Usually supplied via the environment overlay.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    /// Base URL override (e.g. a local OpenAI-compatible server).
    #[serde(default, skip_serializing_if = "Option::is_none", alias = "apiBase")]
    pub api_base: Option<String>,

    /// Extra HTTP headers sent with every request.
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub headers: HashMap<String, String>,
}

/// Per-channel settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChannelSettings {
    /// Whether this channel starts with the process.
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Transport credential (bot token, app password, ...).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,

    /// Sender ids allowed to interact. Empty = everyone.
    #[serde(default, alias = "allowFrom")]
    pub allow_from: Vec<String>,
}

impl Default for ChannelSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            token: None,
            allow_from: Vec::new(),
        }
    }
}

/// Tool configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolsConfig {
    /// Default shell-command timeout in seconds.
    #[serde(default = "default_exec_timeout", alias = "execTimeout")]
    pub exec_timeout_secs: u64,
}

fn default_exec_timeout() -> u64 {
    60
}

impl Default for ToolsConfig {
    fn default() -> Self {
        Self {
            exec_timeout_secs: default_exec_timeout(),
        }
    }
}

/// Expand a leading `~/` against the home directory.
pub fn expand_home(raw: &str) -> PathBuf {
    if let Some(rest) = raw.strip_prefix("~/") {
        if let Some(home) = dirs::home_dir() {
            return home.join(rest);
        }
    }
    PathBuf::from(raw)
}
