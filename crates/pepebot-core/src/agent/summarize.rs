//! Background session summarization.
//!
//! When a session grows past the history or token trigger, the agent
//! loop fires a background consolidation task: the pre-tail history is
//! compressed into a textual summary, the last four messages are kept
//! verbatim for continuity, and the session is saved. A per-session
//! set-if-absent flag guarantees at most one consolidation runs per
//! session at a time.

use std::collections::HashSet;
use std::sync::{Arc, Mutex as StdMutex};
use std::time::Duration;

use tracing::{debug, warn};

use pepebot_llm::types::ChatRequest;
use pepebot_llm::Provider;
use pepebot_types::error::PepebotError;
use pepebot_types::message::{ChatMessage, MessageContent};
use pepebot_types::session::Session;

use crate::session::SessionStore;

/// History length beyond which summarization triggers.
pub const HISTORY_TRIGGER: usize = 20;

/// Fraction of `max_tokens` beyond which summarization triggers.
pub const TOKEN_TRIGGER_RATIO: f64 = 0.75;

/// Messages kept verbatim after consolidation.
pub const KEEP_TAIL: usize = 4;

/// Valid messages beyond which the pre-tail is split and merged.
const SPLIT_THRESHOLD: usize = 10;

/// Budget for one background consolidation.
const SUMMARIZE_TIMEOUT: Duration = Duration::from_secs(120);

/// Note appended when the oversized guard dropped messages.
const OVERSIZED_NOTE: &str = " (Some oversized messages were omitted from this summary.)";

/// Background summarizer for one agent's sessions.
pub struct Summarizer {
    sessions: Arc<SessionStore>,
    provider: Arc<dyn Provider>,
    model: String,
    max_tokens: u32,
    in_progress: StdMutex<HashSet<String>>,
}

impl Summarizer {
    /// Create a summarizer that condenses with the given provider and
    /// bare model id.
    pub fn new(
        sessions: Arc<SessionStore>,
        provider: Arc<dyn Provider>,
        model: String,
        max_tokens: u32,
    ) -> Self {
        Self {
            sessions,
            provider,
            model,
            max_tokens,
            in_progress: StdMutex::new(HashSet::new()),
        }
    }

    /// Whether the session has outgrown its budget.
    pub fn should_summarize(&self, session: &Session) -> bool {
        let token_limit = (self.max_tokens as f64 * TOKEN_TRIGGER_RATIO) as usize;
        session.history_len() > HISTORY_TRIGGER || session.estimated_tokens() > token_limit
    }

    /// Fire-and-forget consolidation for a session.
    ///
    /// No-ops when a consolidation for this key is already in flight.
    pub fn spawn(self: &Arc<Self>, key: &str) {
        {
            let mut flags = self.in_progress.lock().expect("summarizer flag lock poisoned");
            if !flags.insert(key.to_string()) {
                debug!(key, "summarization already in progress, skipping");
                return;
            }
        }

        let this = Arc::clone(self);
        let key = key.to_string();
        tokio::spawn(async move {
            let result = tokio::time::timeout(SUMMARIZE_TIMEOUT, this.run_once(&key)).await;
            match result {
                Ok(Ok(())) => {}
                Ok(Err(e)) => warn!(key = %key, error = %e, "summarization failed"),
                Err(_) => warn!(key = %key, "summarization timed out"),
            }
            let mut flags = this.in_progress.lock().expect("summarizer flag lock poisoned");
            flags.remove(&key);
        });
    }

    /// One consolidation pass, synchronous from the caller's view.
    /// Exposed for deterministic testing; [`spawn`](Self::spawn) wraps
    /// it with the timeout and the in-progress flag.
    pub async fn run_once(&self, key: &str) -> Result<(), PepebotError> {
        let history = self.sessions.get_history(key).await;
        if history.len() <= KEEP_TAIL {
            return Ok(());
        }

        let pre_tail = &history[..history.len() - KEEP_TAIL];

        // Oversized guard: a single enormous message would blow the
        // summarization call itself.
        let char_limit = (self.max_tokens as usize / 2) * 4;
        let mut dropped_oversized = false;
        let valid: Vec<&ChatMessage> = pre_tail
            .iter()
            .filter(|m| {
                if m.role != "user" && m.role != "assistant" {
                    return false;
                }
                if m.content.estimated_chars() > char_limit {
                    dropped_oversized = true;
                    return false;
                }
                true
            })
            .collect();

        if valid.is_empty() {
            debug!(key, "no summarizable messages in pre-tail");
            return Ok(());
        }

        let prior = self.sessions.get_summary(key).await;
        let prior = if prior.trim().is_empty() {
            None
        } else {
            Some(prior)
        };

        let mut summary = if valid.len() > SPLIT_THRESHOLD {
            let mid = valid.len() / 2;
            let first = self.condense(&valid[..mid], prior.as_deref()).await?;
            let second = self.condense(&valid[mid..], None).await?;
            match self.merge(&first, &second).await {
                Ok(merged) => merged,
                Err(e) => {
                    warn!(key, error = %e, "summary merge failed, concatenating");
                    format!("{first}\n\n{second}")
                }
            }
        } else {
            self.condense(&valid, prior.as_deref()).await?
        };

        if dropped_oversized {
            summary.push_str(OVERSIZED_NOTE);
        }

        self.sessions
            .update_and_save(key, |session| {
                session.summary = summary;
                session.truncate_to_tail(KEEP_TAIL);
            })
            .await?;

        debug!(key, "session consolidated");
        Ok(())
    }

    /// Ask the model to condense a transcript slice.
    async fn condense(
        &self,
        messages: &[&ChatMessage],
        prior_summary: Option<&str>,
    ) -> Result<String, PepebotError> {
        let transcript: String = messages
            .iter()
            .map(|m| format!("{}: {}\n", m.role, m.content.as_text()))
            .collect();

        let mut prompt = String::from(
            "Condense the following conversation into a compact summary. \
            Preserve facts, decisions, names, and open tasks. Reply with the \
            summary only.",
        );
        if let Some(prior) = prior_summary {
            prompt.push_str("\n\nEarlier summary of this conversation:\n");
            prompt.push_str(prior);
        }

        let request = ChatRequest {
            model: self.model.clone(),
            messages: vec![
                ChatMessage::system(prompt),
                ChatMessage::user(MessageContent::Text(transcript)),
            ],
            max_tokens: Some(self.max_tokens.min(1024)),
            temperature: Some(0.3),
            tools: Vec::new(),
            stream: None,
        };

        let response = self.provider.chat(&request).await.map_err(PepebotError::from)?;
        Ok(response.content())
    }

    /// Ask the model to merge two half-summaries into one.
    async fn merge(&self, first: &str, second: &str) -> Result<String, PepebotError> {
        let request = ChatRequest {
            model: self.model.clone(),
            messages: vec![
                ChatMessage::system(
                    "Merge the two conversation summaries below into a single \
                    coherent summary. Reply with the merged summary only.",
                ),
                ChatMessage::user(format!("Summary 1:\n{first}\n\nSummary 2:\n{second}")),
            ],
            max_tokens: Some(self.max_tokens.min(1024)),
            temperature: Some(0.3),
            tools: Vec::new(),
            stream: None,
        };

        let response = self.provider.chat(&request).await.map_err(PepebotError::from)?;
        let merged = response.content();
        if merged.trim().is_empty() {
            return Err(PepebotError::Provider {
                message: "merge call returned empty content".into(),
            });
        }
        Ok(merged)
    }
}
