//! The [`Provider`] trait.

use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::error::Result;
use crate::types::{ChatRequest, ChatResponse, StreamChunk};

/// An LLM provider capable of chat completion.
///
/// Two operations: non-streaming [`chat`](Provider::chat), which
/// supports tool calling, and [`chat_stream`](Provider::chat_stream),
/// which streams text chunks through the channel until a terminal
/// [`StreamChunk::Done`] (tools are not supported in stream mode —
/// final-response streaming only).
#[async_trait]
pub trait Provider: Send + Sync {
    /// The provider's name (used in logs and error messages).
    fn name(&self) -> &str;

    /// Perform a non-streaming chat completion.
    async fn chat(&self, request: &ChatRequest) -> Result<ChatResponse>;

    /// Perform a streaming chat completion, sending chunks through
    /// `tx`. The implementation stops early (without error) when the
    /// receiver is dropped.
    async fn chat_stream(
        &self,
        request: &ChatRequest,
        tx: mpsc::Sender<StreamChunk>,
    ) -> Result<()>;
}
