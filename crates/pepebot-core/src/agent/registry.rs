//! Agent registry: persisted agent definitions.
//!
//! Definitions live in a single `agents/registry.json` keyed by agent
//! name. A `default` entry is synthesized from global configuration
//! when the file lacks one, so lookup never fails for the default
//! agent. List operations return copies; mutation rewrites the file.

use std::path::PathBuf;

use tokio::sync::RwLock;
use tracing::{debug, warn};

use pepebot_types::agent::{AgentDefinition, AgentRegistryFile};
use pepebot_types::config::AgentsConfig;
use pepebot_types::error::PepebotError;

/// The always-present default agent name.
pub const DEFAULT_AGENT: &str = "default";

/// Registry of agent definitions.
pub struct AgentRegistry {
    path: PathBuf,
    agents: RwLock<AgentRegistryFile>,
}

impl AgentRegistry {
    /// Load the registry from `{agents_dir}/registry.json`.
    ///
    /// A missing file yields a registry with only the synthesized
    /// `default`; a corrupt file is logged and treated the same way so
    /// startup never fails on it.
    pub async fn load(agents_dir: PathBuf, defaults: &AgentsConfig) -> Self {
        let path = agents_dir.join("registry.json");
        let mut agents: AgentRegistryFile = match tokio::fs::read_to_string(&path).await {
            Ok(content) => match serde_json::from_str(&content) {
                Ok(agents) => agents,
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "corrupt agent registry, using defaults");
                    AgentRegistryFile::new()
                }
            },
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => AgentRegistryFile::new(),
            Err(e) => {
                warn!(path = %path.display(), error = %e, "cannot read agent registry, using defaults");
                AgentRegistryFile::new()
            }
        };

        if !agents.contains_key(DEFAULT_AGENT) {
            agents.insert(
                DEFAULT_AGENT.to_string(),
                AgentDefinition::from_defaults(defaults),
            );
        }

        debug!(count = agents.len(), "agent registry loaded");
        Self {
            path,
            agents: RwLock::new(agents),
        }
    }

    /// Look up a definition by name. Only enabled agents resolve.
    pub async fn get(&self, name: &str) -> Option<AgentDefinition> {
        let agents = self.agents.read().await;
        agents.get(name).filter(|a| a.enabled).cloned()
    }

    /// All definitions as copies, sorted by name.
    pub async fn list(&self) -> Vec<(String, AgentDefinition)> {
        let agents = self.agents.read().await;
        let mut entries: Vec<(String, AgentDefinition)> = agents
            .iter()
            .map(|(name, def)| (name.clone(), def.clone()))
            .collect();
        entries.sort_by(|a, b| a.0.cmp(&b.0));
        entries
    }

    /// Insert or replace a definition and rewrite the file.
    pub async fn upsert(
        &self,
        name: &str,
        definition: AgentDefinition,
    ) -> Result<(), PepebotError> {
        let snapshot = {
            let mut agents = self.agents.write().await;
            agents.insert(name.to_string(), definition);
            agents.clone()
        };
        self.persist(&snapshot).await
    }

    /// Remove a definition and rewrite the file. The `default` agent
    /// cannot be removed.
    pub async fn remove(&self, name: &str) -> Result<bool, PepebotError> {
        if name == DEFAULT_AGENT {
            return Ok(false);
        }
        let (removed, snapshot) = {
            let mut agents = self.agents.write().await;
            let removed = agents.remove(name).is_some();
            (removed, agents.clone())
        };
        if removed {
            self.persist(&snapshot).await?;
        }
        Ok(removed)
    }

    async fn persist(&self, snapshot: &AgentRegistryFile) -> Result<(), PepebotError> {
        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let content = serde_json::to_string_pretty(snapshot)?;
        tokio::fs::write(&self.path, content).await?;
        debug!(path = %self.path.display(), "agent registry saved");
        Ok(())
    }
}
