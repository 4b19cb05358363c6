//! Agent manager: the dispatcher atop the agent loop.
//!
//! Consumes inbound envelopes from the bus, intercepts slash commands,
//! resolves the target agent, and runs each turn as its own cancellable
//! task. A per-session map of cancellation tokens backs `/stop`; a new
//! inbound never preempts in-flight work for the same session — it
//! spawns its own task and replaces the stored handle.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex as StdMutex};

use tokio::sync::{mpsc, Mutex};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use pepebot_llm::types::StreamChunk;
use pepebot_llm::{OpenAiCompatProvider, Provider, ProviderConfig};
use pepebot_types::agent::AgentDefinition;
use pepebot_types::config::Config;
use pepebot_types::error::{PepebotError, Result};
use pepebot_types::event::{metadata_keys, InboundMessage, OutboundMessage};

use crate::bus::MessageBus;
use crate::session::SessionStore;
use crate::tools::ToolRegistry;

use super::context::ContextBuilder;
use super::loop_core::AgentLoop;
use super::registry::{AgentRegistry, DEFAULT_AGENT};
use super::skills::SkillsLoader;
use super::summarize::Summarizer;

const HELP_TEXT: &str = "Commands:\n\
    /new - start a fresh session\n\
    /stop - stop the current processing\n\
    /status - show agent and session state\n\
    /help - show this help";

/// A stored cancellation handle for one in-flight turn.
struct TurnHandle {
    generation: u64,
    token: CancellationToken,
}

/// Registry of agents plus per-session dispatch and cancellation.
pub struct AgentManager {
    config: Config,
    workspace: PathBuf,
    registry: AgentRegistry,
    sessions: Arc<SessionStore>,
    tools: Arc<ToolRegistry>,
    skills: Arc<SkillsLoader>,
    loops: Mutex<HashMap<String, Arc<AgentLoop>>>,
    turns: StdMutex<HashMap<String, TurnHandle>>,
    turn_counter: AtomicU64,
    root_cancel: CancellationToken,
    provider_override: Option<Arc<dyn Provider>>,
    restart_func: StdMutex<Option<Arc<dyn Fn() + Send + Sync>>>,
}

impl AgentManager {
    /// Construct the manager, loading the agent registry from
    /// `{workspace}/agents/registry.json`.
    pub async fn new(
        config: Config,
        sessions: Arc<SessionStore>,
        tools: Arc<ToolRegistry>,
        skills: Arc<SkillsLoader>,
        root_cancel: CancellationToken,
    ) -> Self {
        let workspace = config.workspace_path();
        let registry = AgentRegistry::load(workspace.join("agents"), &config.agents).await;
        Self {
            config,
            workspace,
            registry,
            sessions,
            tools,
            skills,
            loops: Mutex::new(HashMap::new()),
            turns: StdMutex::new(HashMap::new()),
            turn_counter: AtomicU64::new(0),
            root_cancel,
            provider_override: None,
            restart_func: StdMutex::new(None),
        }
    }

    /// Replace the provider for every agent. Used by tests and by
    /// embedders that bring their own transport.
    pub fn with_provider(mut self, provider: Arc<dyn Provider>) -> Self {
        self.provider_override = Some(provider);
        self
    }

    /// The agent registry.
    pub fn registry(&self) -> &AgentRegistry {
        &self.registry
    }

    /// Install the restart hook invoked by
    /// [`request_restart`](Self::request_restart).
    pub fn set_restart_func(&self, f: Arc<dyn Fn() + Send + Sync>) {
        let mut slot = self.restart_func.lock().expect("restart lock poisoned");
        *slot = Some(f);
    }

    /// Request a graceful, draining restart. Returns whether a hook
    /// was installed.
    pub fn request_restart(&self) -> bool {
        let hook = {
            let slot = self.restart_func.lock().expect("restart lock poisoned");
            slot.clone()
        };
        match hook {
            Some(f) => {
                info!("restart requested");
                f();
                true
            }
            None => {
                warn!("restart requested but no restart hook is installed");
                false
            }
        }
    }

    /// Consume the bus until the root cancellation fires, spawning one
    /// task per inbound envelope and dispatching replies outbound.
    pub async fn run(self: Arc<Self>, bus: Arc<MessageBus>) {
        info!("agent manager started, waiting for messages");
        loop {
            let Some(msg) = bus.consume_inbound(&self.root_cancel).await else {
                info!("agent manager exiting");
                break;
            };

            let manager = Arc::clone(&self);
            let bus = Arc::clone(&bus);
            tokio::spawn(async move {
                let channel = msg.channel.clone();
                let chat_id = msg.chat_id.clone();
                match manager.process_message(&msg).await {
                    Ok(reply) if !reply.is_empty() => {
                        if let Err(e) =
                            bus.dispatch_outbound(OutboundMessage::new(channel, chat_id, reply))
                        {
                            warn!(error = %e, "failed to dispatch outbound message");
                        }
                    }
                    Ok(_) => {}
                    Err(e) => error!(error = %e, "failed to process message"),
                }
            });
        }
    }

    /// Process one inbound envelope to a reply string.
    pub async fn process_message(&self, msg: &InboundMessage) -> Result<String> {
        self.dispatch(msg, None).await
    }

    /// Streaming variant of [`process_message`](Self::process_message).
    /// Slash-command replies arrive as a single chunk.
    pub async fn process_message_stream(
        &self,
        msg: &InboundMessage,
        tx: mpsc::Sender<StreamChunk>,
    ) -> Result<String> {
        self.dispatch(msg, Some(tx)).await
    }

    async fn dispatch(
        &self,
        msg: &InboundMessage,
        stream: Option<mpsc::Sender<StreamChunk>>,
    ) -> Result<String> {
        let session_key = msg.session_key();

        if let Some(reply) = self.handle_command(msg, &session_key).await {
            if let Some(tx) = stream {
                let _ = tx.send(StreamChunk::Text { text: reply.clone() }).await;
                let _ = tx
                    .send(StreamChunk::Done {
                        finish_reason: None,
                        usage: None,
                    })
                    .await;
            }
            return Ok(reply);
        }

        let agent_name = self.resolve_agent_name(msg);
        let agent = self.agent_loop(&agent_name).await?;

        let token = self.root_cancel.child_token();
        let generation = self.turn_counter.fetch_add(1, Ordering::Relaxed);
        {
            let mut turns = self.turns.lock().expect("turn map lock poisoned");
            turns.insert(
                session_key.clone(),
                TurnHandle {
                    generation,
                    token: token.clone(),
                },
            );
        }

        let result = match stream {
            Some(tx) => agent.process_stream(msg, token, tx).await,
            None => agent.process(msg, token).await,
        };

        {
            let mut turns = self.turns.lock().expect("turn map lock poisoned");
            if turns
                .get(&session_key)
                .is_some_and(|h| h.generation == generation)
            {
                turns.remove(&session_key);
            }
        }

        result
    }

    /// Intercept slash commands. Unknown commands fall through as
    /// normal messages.
    async fn handle_command(&self, msg: &InboundMessage, session_key: &str) -> Option<String> {
        let content = msg.content.trim();
        if !content.starts_with('/') {
            return None;
        }
        let command = content.split_whitespace().next().unwrap_or(content);

        match command {
            "/new" => {
                self.sessions.clear(session_key).await;
                if let Err(e) = self.sessions.save(session_key).await {
                    warn!(session = %session_key, error = %e, "failed to persist cleared session");
                }
                debug!(session = %session_key, "session cleared");
                Some("Started a fresh session.".to_string())
            }
            "/stop" => {
                let fired = {
                    let turns = self.turns.lock().expect("turn map lock poisoned");
                    match turns.get(session_key) {
                        Some(handle) => {
                            handle.token.cancel();
                            true
                        }
                        None => false,
                    }
                };
                if fired {
                    Some("Stopping.".to_string())
                } else {
                    Some("Nothing is processing.".to_string())
                }
            }
            "/status" => {
                let agent_name = self.resolve_agent_name(msg);
                let model = self
                    .registry
                    .get(&agent_name)
                    .await
                    .map(|a| a.model)
                    .unwrap_or_else(|| self.config.agents.model.clone());
                let processing = {
                    let turns = self.turns.lock().expect("turn map lock poisoned");
                    turns.contains_key(session_key)
                };
                Some(format!(
                    "Agent: {agent_name}\nModel: {model}\nSession: {session_key}\nState: {}",
                    if processing { "processing" } else { "idle" }
                ))
            }
            "/help" => Some(HELP_TEXT.to_string()),
            _ => None,
        }
    }

    /// Resolve the target agent from envelope metadata, falling back
    /// to `default`.
    fn resolve_agent_name(&self, msg: &InboundMessage) -> String {
        msg.metadata
            .get(metadata_keys::AGENT)
            .cloned()
            .unwrap_or_else(|| DEFAULT_AGENT.to_string())
    }

    /// Lazily instantiate (and cache) the loop for one agent.
    async fn agent_loop(&self, name: &str) -> Result<Arc<AgentLoop>> {
        {
            let loops = self.loops.lock().await;
            if let Some(agent) = loops.get(name) {
                return Ok(agent.clone());
            }
        }

        let definition = self
            .registry
            .get(name)
            .await
            .ok_or_else(|| PepebotError::Provider {
                message: format!("unknown agent: {name}"),
            })?;

        let (provider, model) = self.build_provider(&definition)?;
        let prompt_dir = definition.prompt_file.as_ref().map(|p| {
            let path = PathBuf::from(p);
            if path.is_absolute() {
                path
            } else {
                self.workspace.join("agents").join(path)
            }
        });

        let context = ContextBuilder::new(self.workspace.clone(), self.skills.clone());
        let summarizer = Arc::new(Summarizer::new(
            self.sessions.clone(),
            provider.clone(),
            model.clone(),
            definition.max_tokens,
        ));

        let agent = Arc::new(AgentLoop::new(
            name,
            definition,
            model,
            provider,
            self.config.agents.max_tool_iterations,
            self.sessions.clone(),
            self.tools.clone(),
            context,
            summarizer,
            prompt_dir,
        ));

        let mut loops = self.loops.lock().await;
        Ok(loops.entry(name.to_string()).or_insert(agent).clone())
    }

    /// Build the provider + bare model for an agent definition.
    fn build_provider(
        &self,
        definition: &AgentDefinition,
    ) -> Result<(Arc<dyn Provider>, String)> {
        if let Some(ref provider) = self.provider_override {
            let (_, bare) = pepebot_llm::split_model_id(&definition.model);
            return Ok((provider.clone(), bare.to_string()));
        }
        let (config, bare) = ProviderConfig::resolve(
            &self.config,
            &definition.model,
            definition.provider.as_deref(),
        )
        .map_err(PepebotError::from)?;
        Ok((Arc::new(OpenAiCompatProvider::new(config)), bare))
    }
}
