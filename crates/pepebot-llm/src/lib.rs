//! LLM provider abstraction for pepebot.
//!
//! Exposes a [`Provider`] trait with two operations — non-streaming
//! [`chat`](Provider::chat) and SSE [`chat_stream`](Provider::chat_stream)
//! — plus [`OpenAiCompatProvider`], an implementation of the
//! OpenAI-compatible chat-completion wire format that covers OpenAI,
//! OpenRouter, DeepSeek, Groq, local llama.cpp/vLLM servers, and any
//! other endpoint speaking the same protocol.
//!
//! Model identifiers are provider-qualified (`"openai/gpt-4o"`): the
//! prefix selects a [`ProviderConfig`], the suffix goes on the wire.

pub mod config;
pub mod error;
pub mod openai_compat;
pub mod provider;
pub mod sse;
pub mod types;

pub use config::ProviderConfig;
pub use error::{ProviderError, Result};
pub use openai_compat::OpenAiCompatProvider;
pub use provider::Provider;
pub use types::{ChatRequest, ChatResponse, ResponseMessage, StreamChunk, Usage};

/// Split a provider-qualified model id into `(prefix, bare_model)`.
///
/// `"openai/gpt-4o"` → `("openai", "gpt-4o")`. An unqualified id maps
/// to an empty prefix and is sent verbatim.
pub fn split_model_id(model: &str) -> (&str, &str) {
    match model.split_once('/') {
        Some((prefix, rest)) => (prefix, rest),
        None => ("", model),
    }
}
