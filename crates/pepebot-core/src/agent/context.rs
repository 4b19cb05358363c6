//! Context builder for assembling LLM prompts.
//!
//! Composes the system prompt deterministically each turn from the
//! instruction template, agent bootstrap markdown, the skills index,
//! the session summary, and a conversation-context block, then appends
//! history and the current user message.
//!
//! Agent customization lives in bootstrap files, not code: each
//! bootstrap filename is resolved against the agent's prompt directory
//! first, then the workspace root, so an agent can override some
//! documents while inheriting others.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::Utc;
use tracing::warn;

use pepebot_types::event::{metadata_keys, InboundMessage};
use pepebot_types::message::{ChatMessage, ContentBlock, MessageContent};
use pepebot_types::session::Session;

use super::skills::SkillsLoader;

/// Bootstrap documents injected into the system prompt, in order.
const BOOTSTRAP_FILES: &[&str] = &[
    "AGENTS.md",
    "SOUL.md",
    "USER.md",
    "TOOLS.md",
    "IDENTITY.md",
    "MEMORY.md",
];

/// Builder for assembling the per-turn message list.
pub struct ContextBuilder {
    workspace: PathBuf,
    skills: Arc<SkillsLoader>,
}

impl ContextBuilder {
    /// Create a builder over the given workspace.
    pub fn new(workspace: PathBuf, skills: Arc<SkillsLoader>) -> Self {
        Self { workspace, skills }
    }

    /// The workspace root.
    pub fn workspace(&self) -> &Path {
        &self.workspace
    }

    /// Build the system prompt.
    ///
    /// `prompt_dir` is the agent's bootstrap directory; `include_skills`
    /// names the skills whose full text is injected (every installed
    /// skill appears in the index regardless).
    pub async fn build_system_prompt(
        &self,
        prompt_dir: Option<&Path>,
        include_skills: &[String],
    ) -> String {
        let mut parts = Vec::new();

        let now = Utc::now().format("%Y-%m-%d %H:%M:%S UTC");
        parts.push(format!(
            "# pepebot\n\n\
            You are pepebot, a personal AI assistant. You converse with your \
            operator across chat channels and may call tools to get things done.\n\n\
            Current time: {now}\n\
            Workspace: {workspace}\n\
            Skills: {workspace}/skills/\n\
            Memory: {workspace}/memory/MEMORY.md",
            workspace = self.workspace.display(),
        ));

        // Bootstrap documents, agent directory first, workspace second.
        for filename in BOOTSTRAP_FILES {
            if let Some(content) = self.read_bootstrap(prompt_dir, filename).await {
                parts.push(format!("## {filename}\n\n{content}"));
            }
        }

        // Skills index, then the full text of included skills.
        let index = self.skills.list().await;
        if !index.is_empty() {
            let mut lines = vec!["## Skills".to_string()];
            for (name, description) in &index {
                if description.is_empty() {
                    lines.push(format!("- {name}"));
                } else {
                    lines.push(format!("- {name}: {description}"));
                }
            }
            parts.push(lines.join("\n"));
        }
        for name in include_skills {
            match self.skills.get(name).await {
                Some(skill) if !skill.content.is_empty() => {
                    parts.push(format!("## Skill: {}\n\n{}", skill.name, skill.content));
                }
                Some(_) => {}
                None => warn!(skill = %name, "included skill not found"),
            }
        }

        parts.join("\n\n---\n\n")
    }

    /// Build the complete message list for one turn: system prompt
    /// (with summary and conversation context), history, and the
    /// current user message (with media blocks when present).
    pub async fn build_messages(
        &self,
        session: &Session,
        msg: &InboundMessage,
        prompt_dir: Option<&Path>,
        include_skills: &[String],
    ) -> Vec<ChatMessage> {
        let mut system = self.build_system_prompt(prompt_dir, include_skills).await;

        if !session.summary.trim().is_empty() {
            system.push_str("\n\n---\n\n## Conversation Summary\n\n");
            system.push_str(&session.summary);
        }

        let channel = msg
            .metadata
            .get(metadata_keys::CHANNEL)
            .cloned()
            .unwrap_or_else(|| msg.channel.clone());
        let channel_id = msg
            .metadata
            .get(metadata_keys::CHANNEL_ID)
            .cloned()
            .unwrap_or_else(|| msg.chat_id.clone());
        if !channel.is_empty() {
            system.push_str(&format!(
                "\n\n---\n\n## Conversation Context\n\nChannel: {channel}\nChannel ID: {channel_id}"
            ));
        }

        let mut messages = vec![ChatMessage::system(system)];
        messages.extend(session.messages.iter().cloned());
        messages.push(Self::user_message(msg));
        messages
    }

    /// The current user message: plain text, or a block sequence with
    /// the text first and one image block per media reference.
    pub fn user_message(msg: &InboundMessage) -> ChatMessage {
        if msg.media.is_empty() {
            return ChatMessage::user(msg.content.clone());
        }
        let mut blocks = vec![ContentBlock::text(msg.content.clone())];
        for reference in &msg.media {
            blocks.push(ContentBlock::image(reference.clone()));
        }
        ChatMessage::user(MessageContent::Blocks(blocks))
    }

    /// Read one bootstrap file with per-file directory fallback.
    async fn read_bootstrap(&self, prompt_dir: Option<&Path>, filename: &str) -> Option<String> {
        let mut candidates = Vec::new();
        if let Some(dir) = prompt_dir {
            candidates.push(dir.join(filename));
        }
        candidates.push(self.workspace.join(filename));

        for path in candidates {
            match tokio::fs::read_to_string(&path).await {
                Ok(content) if !content.trim().is_empty() => return Some(content),
                Ok(_) => return None,
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => continue,
                Err(e) => {
                    warn!(file = %path.display(), error = %e, "failed to read bootstrap file");
                    return None;
                }
            }
        }
        None
    }
}
