//! SSE line parser for OpenAI-compatible streaming.
//!
//! The streaming format sends lines like:
//!
//! ```text
//! data: {"id":"...","choices":[{"delta":{"content":"Hello"},...}],...}
//!
//! data: [DONE]
//! ```
//!
//! Each non-empty `data:` line is either a JSON delta or the literal
//! `[DONE]` sentinel marking end of stream.

use crate::error::{ProviderError, Result};
use crate::types::{StreamChunk, StreamDelta};

/// The sentinel that marks the end of an SSE stream.
const DONE_SENTINEL: &str = "[DONE]";

/// Parse a single SSE line into zero or more [`StreamChunk`] values.
///
/// Returns an empty vec for event boundaries, comments, non-`data:`
/// lines, and empty payloads.
///
/// # Errors
///
/// Returns [`ProviderError::InvalidResponse`] when a `data:` payload is
/// not valid delta JSON.
pub fn parse_sse_line(line: &str) -> Result<Vec<StreamChunk>> {
    let line = line.trim_end();

    if line.is_empty() || line.starts_with(':') {
        return Ok(vec![]);
    }

    let payload = match line.strip_prefix("data:") {
        Some(rest) => rest.trim_start(),
        // event:, id:, retry: lines
        None => return Ok(vec![]),
    };

    if payload.is_empty() {
        return Ok(vec![]);
    }

    if payload == DONE_SENTINEL {
        return Ok(vec![StreamChunk::Done {
            finish_reason: None,
            usage: None,
        }]);
    }

    let delta: StreamDelta = serde_json::from_str(payload)
        .map_err(|e| ProviderError::InvalidResponse(format!("failed to parse SSE delta: {e}")))?;

    let mut chunks = Vec::new();
    if let Some(choice) = delta.choices.first() {
        if let Some(ref text) = choice.delta.content {
            if !text.is_empty() {
                chunks.push(StreamChunk::Text { text: text.clone() });
            }
        }
        if choice.finish_reason.is_some() {
            chunks.push(StreamChunk::Done {
                finish_reason: choice.finish_reason.clone(),
                usage: delta.usage.clone(),
            });
        }
    }
    Ok(chunks)
}
