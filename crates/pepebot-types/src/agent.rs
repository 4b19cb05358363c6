//! Agent definition types.
//!
//! An *agent definition* describes a configured LLM persona: the model
//! it runs, its sampling parameters, and the directory of bootstrap
//! markdown that shapes its system prompt. Definitions are persisted as
//! a single `agents/registry.json` keyed by agent name.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::config::AgentsConfig;

fn default_true() -> bool {
    true
}

/// Definition of a configured agent.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentDefinition {
    /// Whether the agent can be selected for message processing.
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Provider-qualified model identifier (`prefix/name`).
    pub model: String,

    /// Optional provider override. When absent, the model prefix
    /// selects the provider.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provider: Option<String>,

    /// Human-readable description shown by `/status` and listings.
    #[serde(default)]
    pub description: String,

    /// Sampling temperature.
    #[serde(default = "default_temperature")]
    pub temperature: f64,

    /// Maximum tokens in a single response.
    #[serde(default = "default_max_tokens", alias = "maxTokens")]
    pub max_tokens: u32,

    /// Directory containing agent-specific bootstrap markdown,
    /// resolved relative to `{workspace}/agents/` when not absolute.
    #[serde(default, skip_serializing_if = "Option::is_none", alias = "promptFile")]
    pub prompt_file: Option<String>,
}

fn default_temperature() -> f64 {
    0.7
}
fn default_max_tokens() -> u32 {
    8192
}

impl AgentDefinition {
    /// Synthesize the `default` agent from global configuration.
    pub fn from_defaults(defaults: &AgentsConfig) -> Self {
        Self {
            enabled: true,
            model: defaults.model.clone(),
            provider: None,
            description: "Default assistant".into(),
            temperature: defaults.temperature,
            max_tokens: defaults.max_tokens,
            prompt_file: None,
        }
    }
}

/// On-disk shape of `agents/registry.json`: name → definition.
pub type AgentRegistryFile = HashMap<String, AgentDefinition>;
