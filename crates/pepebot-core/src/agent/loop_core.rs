//! The agent loop: bounded LLM ↔ tool iteration for one inbound turn.
//!
//! Each invocation walks a small state machine:
//!
//! ```text
//! BUILD  context builder produces the message list
//!   |
//! CALL   invoke the provider with messages + tool schemas
//!   |      zero tool_calls -> FINAL
//!   |      tool_calls      -> TOOLS
//! TOOLS  append assistant(tool_calls), run each tool in emission
//!   |    order, append tool-role results; loop back to CALL until
//!   |    the iteration cap
//! FINAL  commit user + assistant to the session, save, maybe fire
//!        background summarization, return the final text
//! ```
//!
//! Only completed FINALs mutate the session: cancellation mid-turn
//! leaves the history exactly as it was.

use std::path::PathBuf;
use std::sync::Arc;

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use pepebot_llm::types::{ChatRequest, StreamChunk};
use pepebot_llm::Provider;
use pepebot_types::agent::AgentDefinition;
use pepebot_types::error::{PepebotError, Result};
use pepebot_types::event::InboundMessage;
use pepebot_types::message::{ChatMessage, ToolCall};

use crate::session::SessionStore;
use crate::tools::{ToolContext, ToolRegistry};

use super::context::ContextBuilder;
use super::summarize::Summarizer;

/// Terminal text when the iteration cap is reached.
pub const FALLBACK_TERMINAL: &str = "I've completed processing but have no response to give.";

/// Terminal text when the user stops an in-flight turn.
pub const STOPPED_MESSAGE: &str = "Processing stopped.";

/// One agent's tool-using LLM loop.
pub struct AgentLoop {
    name: String,
    definition: AgentDefinition,
    /// Bare model id for the wire (provider prefix already stripped).
    model: String,
    provider: Arc<dyn Provider>,
    max_iterations: u32,
    sessions: Arc<SessionStore>,
    tools: Arc<ToolRegistry>,
    context: ContextBuilder,
    summarizer: Arc<Summarizer>,
    prompt_dir: Option<PathBuf>,
}

impl AgentLoop {
    /// Wire up a loop for one agent.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        name: impl Into<String>,
        definition: AgentDefinition,
        model: impl Into<String>,
        provider: Arc<dyn Provider>,
        max_iterations: u32,
        sessions: Arc<SessionStore>,
        tools: Arc<ToolRegistry>,
        context: ContextBuilder,
        summarizer: Arc<Summarizer>,
        prompt_dir: Option<PathBuf>,
    ) -> Self {
        Self {
            name: name.into(),
            definition,
            model: model.into(),
            provider,
            max_iterations: max_iterations.max(1),
            sessions,
            tools,
            context,
            summarizer,
            prompt_dir,
        }
    }

    /// The agent's name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The agent's definition.
    pub fn definition(&self) -> &AgentDefinition {
        &self.definition
    }

    /// Process one inbound turn, returning the final assistant text.
    pub async fn process(&self, msg: &InboundMessage, cancel: CancellationToken) -> Result<String> {
        self.run(msg, cancel, None).await
    }

    /// Streaming variant: tool iterations run non-streaming; the final
    /// call is re-issued in streaming mode and text chunks flow through
    /// `tx`. A terminal [`StreamChunk::Done`] is always emitted.
    pub async fn process_stream(
        &self,
        msg: &InboundMessage,
        cancel: CancellationToken,
        tx: mpsc::Sender<StreamChunk>,
    ) -> Result<String> {
        self.run(msg, cancel, Some(tx)).await
    }

    async fn run(
        &self,
        msg: &InboundMessage,
        cancel: CancellationToken,
        stream: Option<mpsc::Sender<StreamChunk>>,
    ) -> Result<String> {
        let session_key = msg.session_key();

        // BUILD: snapshot the session before anything is committed.
        let session = self.sessions.get_or_create(&session_key).await;
        let mut messages = self
            .context
            .build_messages(&session, msg, self.prompt_dir.as_deref(), &[])
            .await;
        let tool_defs = self.tools.definitions();

        let tool_ctx = ToolContext {
            cancel: cancel.clone(),
            channel: msg.channel.clone(),
            chat_id: msg.chat_id.clone(),
        };

        let mut iterations = 0u32;

        let final_text = loop {
            // CALL
            let request = ChatRequest {
                model: self.model.clone(),
                messages: messages.clone(),
                max_tokens: Some(self.definition.max_tokens),
                temperature: Some(self.definition.temperature),
                tools: tool_defs.clone(),
                stream: None,
            };

            let response = tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    debug!(agent = %self.name, session = %session_key, "turn cancelled during call");
                    self.emit_text_and_done(&stream, STOPPED_MESSAGE).await;
                    return Ok(STOPPED_MESSAGE.to_string());
                }
                response = self.provider.chat(&request) => response,
            };

            let response = match response {
                Ok(response) => response,
                Err(e) => {
                    // Provider failures surface once as the turn's
                    // final content, after the session commit.
                    let text = e.to_string();
                    warn!(agent = %self.name, session = %session_key, error = %text, "provider error");
                    self.commit_turn(&session_key, msg, &text).await;
                    self.emit_text_and_done(&stream, &text).await;
                    return Ok(text);
                }
            };

            let tool_calls = response.tool_calls();
            if tool_calls.is_empty() {
                let content = response.content();
                if let Some(ref tx) = stream {
                    // A cancelled re-issue must not reach FINAL: the
                    // turn ends uncommitted, like any other stop.
                    break match self.restream_final(&messages, content, tx, &cancel).await {
                        Ok(text) => text,
                        Err(PepebotError::Cancelled) => {
                            return Ok(STOPPED_MESSAGE.to_string());
                        }
                        Err(e) => return Err(e),
                    };
                }
                break content;
            }

            // TOOLS: the assistant message carrying the calls goes
            // first, then one tool-role result per call, in emission
            // order. That ordering is what the model keys on next CALL.
            debug!(
                agent = %self.name,
                iteration = iterations,
                tool_count = tool_calls.len(),
                "executing tool calls"
            );
            messages.push(ChatMessage::assistant_with_tool_calls(
                response.content(),
                tool_calls.clone(),
            ));

            let mut stopped = false;
            for call in &tool_calls {
                if cancel.is_cancelled() {
                    stopped = true;
                    break;
                }
                let result_text = self.execute_tool(&tool_ctx, call).await;
                messages.push(ChatMessage::tool(call.id.clone(), result_text));
            }
            if stopped {
                debug!(agent = %self.name, session = %session_key, "turn cancelled during tools");
                self.emit_text_and_done(&stream, STOPPED_MESSAGE).await;
                return Ok(STOPPED_MESSAGE.to_string());
            }

            iterations += 1;
            if iterations >= self.max_iterations {
                debug!(agent = %self.name, iterations, "iteration cap reached");
                self.emit_text_and_done(&stream, FALLBACK_TERMINAL).await;
                break FALLBACK_TERMINAL.to_string();
            }
        };

        // FINAL
        self.commit_turn(&session_key, msg, &final_text).await;

        let snapshot = self.sessions.get_or_create(&session_key).await;
        if self.summarizer.should_summarize(&snapshot) {
            self.summarizer.spawn(&session_key);
        }

        Ok(final_text)
    }

    /// Execute one tool call; errors become `Error:`-prefixed tool
    /// content so the model can recover.
    async fn execute_tool(&self, ctx: &ToolContext, call: &ToolCall) -> String {
        let args = call.parsed_arguments();
        match self.tools.execute(ctx, &call.function.name, args).await {
            Ok(text) => text,
            Err(e) => {
                warn!(tool = %call.function.name, error = %e, "tool execution failed");
                format!("Error: {e}")
            }
        }
    }

    /// Re-issue the final call in streaming mode, forwarding text
    /// chunks and emitting exactly one terminal done chunk.
    ///
    /// `buffered` is the content from the non-streaming detection call;
    /// it backstops a failed or empty re-issue.
    async fn restream_final(
        &self,
        messages: &[ChatMessage],
        buffered: String,
        tx: &mpsc::Sender<StreamChunk>,
        cancel: &CancellationToken,
    ) -> Result<String> {
        let request = ChatRequest {
            model: self.model.clone(),
            messages: messages.to_vec(),
            max_tokens: Some(self.definition.max_tokens),
            temperature: Some(self.definition.temperature),
            tools: Vec::new(),
            stream: Some(true),
        };

        let (chunk_tx, mut chunk_rx) = mpsc::channel::<StreamChunk>(64);
        let provider = self.provider.clone();
        let stream_task =
            tokio::spawn(async move { provider.chat_stream(&request, chunk_tx).await });

        let mut collected = String::new();
        let mut finish_reason = None;
        let mut usage = None;
        let mut failed = false;

        loop {
            let chunk = tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    stream_task.abort();
                    self.emit_text_and_done(&Some(tx.clone()), STOPPED_MESSAGE).await;
                    return Err(PepebotError::Cancelled);
                }
                chunk = chunk_rx.recv() => chunk,
            };
            match chunk {
                Some(StreamChunk::Text { text }) => {
                    collected.push_str(&text);
                    let _ = tx.send(StreamChunk::Text { text }).await;
                }
                Some(StreamChunk::Done {
                    finish_reason: fr,
                    usage: u,
                }) => {
                    finish_reason = fr.or(finish_reason);
                    usage = u.or(usage);
                }
                None => break,
            }
        }

        match stream_task.await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => {
                warn!(agent = %self.name, error = %e, "streaming re-issue failed, using buffered response");
                failed = true;
            }
            Err(e) => {
                warn!(agent = %self.name, error = %e, "streaming task panicked, using buffered response");
                failed = true;
            }
        }

        let final_text = if failed || collected.is_empty() {
            if !buffered.is_empty() {
                let _ = tx
                    .send(StreamChunk::Text {
                        text: buffered.clone(),
                    })
                    .await;
            }
            buffered
        } else {
            collected
        };

        let _ = tx
            .send(StreamChunk::Done {
                finish_reason,
                usage,
            })
            .await;
        Ok(final_text)
    }

    /// Send `text` as one chunk followed by the terminal done chunk.
    async fn emit_text_and_done(&self, stream: &Option<mpsc::Sender<StreamChunk>>, text: &str) {
        if let Some(tx) = stream {
            if !text.is_empty() {
                let _ = tx
                    .send(StreamChunk::Text {
                        text: text.to_string(),
                    })
                    .await;
            }
            let _ = tx
                .send(StreamChunk::Done {
                    finish_reason: None,
                    usage: None,
                })
                .await;
        }
    }

    /// Commit the user + assistant pair and persist. Persistence
    /// failures are logged; in-memory state stays authoritative.
    async fn commit_turn(&self, session_key: &str, msg: &InboundMessage, final_text: &str) {
        let user = ContextBuilder::user_message(msg);
        let assistant = ChatMessage::assistant(final_text.to_string());
        if let Err(e) = self
            .sessions
            .update_and_save(session_key, |session| {
                session.add(user);
                session.add(assistant);
            })
            .await
        {
            warn!(session = %session_key, error = %e, "failed to persist session");
        }
    }
}
