//! Provider endpoint configuration and model-prefix resolution.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::error::{ProviderError, Result};

/// Configuration for one OpenAI-compatible endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderConfig {
    /// Provider name; also the model-id prefix that selects it.
    pub name: String,

    /// API base URL (e.g. `https://api.openai.com/v1`).
    pub base_url: String,

    /// API key. `None` is valid for keyless local servers.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    /// Extra headers sent with every request.
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub headers: HashMap<String, String>,
}

/// Built-in base URLs for well-known providers.
fn builtin_base_url(name: &str) -> Option<&'static str> {
    match name {
        "openai" => Some("https://api.openai.com/v1"),
        "openrouter" => Some("https://openrouter.ai/api/v1"),
        "deepseek" => Some("https://api.deepseek.com/v1"),
        "groq" => Some("https://api.groq.com/openai/v1"),
        _ => None,
    }
}

impl ProviderConfig {
    /// Build a provider config from global settings for the given
    /// provider name, falling back to the built-in base URL table.
    pub fn from_settings(
        name: &str,
        settings: Option<&pepebot_types::config::ProviderSettings>,
    ) -> Result<Self> {
        let base_url = settings
            .and_then(|s| s.api_base.clone())
            .or_else(|| builtin_base_url(name).map(String::from))
            .ok_or_else(|| {
                ProviderError::NotConfigured(format!(
                    "no api_base configured for provider '{name}'"
                ))
            })?;

        Ok(Self {
            name: name.to_string(),
            base_url,
            api_key: settings.and_then(|s| s.api_key.clone()),
            headers: settings.map(|s| s.headers.clone()).unwrap_or_default(),
        })
    }

    /// Resolve the provider for a provider-qualified model id against
    /// the global config, honoring an explicit provider override.
    ///
    /// Returns the config and the bare model id to put on the wire.
    pub fn resolve(
        config: &pepebot_types::config::Config,
        model: &str,
        provider_override: Option<&str>,
    ) -> Result<(Self, String)> {
        let (prefix, bare) = crate::split_model_id(model);
        let name = provider_override.unwrap_or(prefix);
        if name.is_empty() {
            return Err(ProviderError::NotConfigured(format!(
                "model '{model}' has no provider prefix and no override was given"
            )));
        }
        let settings = config.providers.get(name);
        let provider = Self::from_settings(name, settings)?;
        Ok((provider, bare.to_string()))
    }
}
