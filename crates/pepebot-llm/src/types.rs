//! Wire types for OpenAI-compatible chat completion calls.
//!
//! Requests reuse [`ChatMessage`] from `pepebot-types` so multi-block
//! content serializes directly into the content-part format. Response
//! messages get their own struct because providers return `content:
//! null` alongside `tool_calls`.

use serde::{Deserialize, Serialize};

use pepebot_types::message::{ChatMessage, ToolCall};

/// A chat completion request.
#[derive(Debug, Clone, Serialize)]
pub struct ChatRequest {
    /// Bare model identifier (provider prefix already stripped).
    pub model: String,

    /// The conversation messages.
    pub messages: Vec<ChatMessage>,

    /// Maximum number of tokens to generate.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,

    /// Sampling temperature.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f64>,

    /// Tool definitions in `{type:"function", function:{...}}` shape.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub tools: Vec<serde_json::Value>,

    /// Whether to stream the response.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stream: Option<bool>,
}

impl ChatRequest {
    /// Create a minimal request with a model and messages.
    pub fn new(model: impl Into<String>, messages: Vec<ChatMessage>) -> Self {
        Self {
            model: model.into(),
            messages,
            max_tokens: None,
            temperature: None,
            tools: Vec::new(),
            stream: None,
        }
    }
}

/// A chat completion response.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ChatResponse {
    /// Completion identifier.
    #[serde(default)]
    pub id: String,

    /// The list of completion choices.
    pub choices: Vec<Choice>,

    /// Token usage statistics, if the provider reports them.
    #[serde(default)]
    pub usage: Option<Usage>,

    /// The model that generated the response.
    #[serde(default)]
    pub model: String,
}

impl ChatResponse {
    /// The first choice's text content, empty when absent.
    pub fn content(&self) -> String {
        self.choices
            .first()
            .and_then(|c| c.message.content.clone())
            .unwrap_or_default()
    }

    /// The first choice's tool calls, empty when absent.
    pub fn tool_calls(&self) -> Vec<ToolCall> {
        self.choices
            .first()
            .and_then(|c| c.message.tool_calls.clone())
            .unwrap_or_default()
    }

    /// The first choice's finish reason.
    pub fn finish_reason(&self) -> Option<&str> {
        self.choices.first().and_then(|c| c.finish_reason.as_deref())
    }
}

/// A single completion choice.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Choice {
    /// Index of this choice.
    #[serde(default)]
    pub index: u32,

    /// The assistant's response message.
    pub message: ResponseMessage,

    /// Why generation stopped (`"stop"`, `"tool_calls"`, `"length"`).
    #[serde(default)]
    pub finish_reason: Option<String>,
}

/// The assistant message inside a response choice.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct ResponseMessage {
    /// Role, always `"assistant"` in practice.
    #[serde(default)]
    pub role: String,

    /// Text content. Null when the model only emits tool calls.
    #[serde(default)]
    pub content: Option<String>,

    /// Tool calls requested by the model.
    #[serde(default)]
    pub tool_calls: Option<Vec<ToolCall>>,
}

/// Token usage statistics.
#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq)]
pub struct Usage {
    /// Tokens in the prompt.
    #[serde(default)]
    pub prompt_tokens: u32,

    /// Tokens in the generated completion.
    #[serde(default)]
    pub completion_tokens: u32,

    /// Total tokens.
    #[serde(default)]
    pub total_tokens: u32,
}

// ── Streaming types ─────────────────────────────────────────────────────

/// A chunk delivered during SSE streaming.
///
/// Stream mode is final-response only (no tools), so chunks are text
/// deltas followed by exactly one terminal [`StreamChunk::Done`].
#[derive(Debug, Clone, PartialEq)]
pub enum StreamChunk {
    /// A partial text delta.
    Text {
        /// The partial content.
        text: String,
    },
    /// The stream is complete.
    Done {
        /// Finish reason from the last delta, if any.
        finish_reason: Option<String>,
        /// Usage statistics, if the provider sends them.
        usage: Option<Usage>,
    },
}

/// A streaming delta payload (`chat.completion.chunk`).
#[derive(Debug, Clone, Deserialize)]
pub(crate) struct StreamDelta {
    #[serde(default)]
    pub choices: Vec<StreamDeltaChoice>,
    #[serde(default)]
    pub usage: Option<Usage>,
}

/// A single choice within a streaming delta.
#[derive(Debug, Clone, Deserialize)]
pub(crate) struct StreamDeltaChoice {
    #[serde(default)]
    pub delta: StreamDeltaContent,
    #[serde(default)]
    pub finish_reason: Option<String>,
}

/// The delta object within a streaming choice.
#[derive(Debug, Clone, Default, Deserialize)]
pub(crate) struct StreamDeltaContent {
    #[serde(default)]
    pub content: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_skips_absent_fields() {
        let req = ChatRequest::new("gpt-4o", vec![ChatMessage::user("Hi")]);
        let json = serde_json::to_string(&req).unwrap();
        assert!(json.contains(r#""model":"gpt-4o""#));
        assert!(!json.contains("tools"));
        assert!(!json.contains("stream"));
        assert!(!json.contains("max_tokens"));
    }

    #[test]
    fn request_with_all_fields() {
        let req = ChatRequest {
            model: "gpt-4o".into(),
            messages: vec![ChatMessage::user("test")],
            max_tokens: Some(100),
            temperature: Some(0.7),
            tools: vec![serde_json::json!({"type": "function", "function": {"name": "t"}})],
            stream: Some(true),
        };
        let json = serde_json::to_string(&req).unwrap();
        assert!(json.contains("max_tokens"));
        assert!(json.contains("tools"));
        assert!(json.contains("stream"));
    }

    #[test]
    fn response_with_text() {
        let json = r#"{
            "id": "chatcmpl-1",
            "choices": [{
                "index": 0,
                "message": {"role": "assistant", "content": "Hello!"},
                "finish_reason": "stop"
            }],
            "usage": {"prompt_tokens": 10, "completion_tokens": 5, "total_tokens": 15},
            "model": "gpt-4o"
        }"#;
        let resp: ChatResponse = serde_json::from_str(json).unwrap();
        assert_eq!(resp.content(), "Hello!");
        assert!(resp.tool_calls().is_empty());
        assert_eq!(resp.finish_reason(), Some("stop"));
        assert_eq!(resp.usage.unwrap().total_tokens, 15);
    }

    #[test]
    fn response_with_null_content_and_tool_calls() {
        let json = r#"{
            "choices": [{
                "message": {
                    "role": "assistant",
                    "content": null,
                    "tool_calls": [{
                        "id": "call_1",
                        "type": "function",
                        "function": {"name": "add", "arguments": "{\"x\":2,\"y\":3}"}
                    }]
                },
                "finish_reason": "tool_calls"
            }]
        }"#;
        let resp: ChatResponse = serde_json::from_str(json).unwrap();
        assert_eq!(resp.content(), "");
        let calls = resp.tool_calls();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].function.name, "add");
        assert_eq!(calls[0].parsed_arguments()["y"], 3);
    }

    #[test]
    fn response_without_usage() {
        let json = r#"{"choices": [{"message": {"role": "assistant", "content": "Ok"}}]}"#;
        let resp: ChatResponse = serde_json::from_str(json).unwrap();
        assert!(resp.usage.is_none());
        assert!(resp.finish_reason().is_none());
    }

    #[test]
    fn response_with_no_choices() {
        let resp: ChatResponse = serde_json::from_str(r#"{"choices": []}"#).unwrap();
        assert_eq!(resp.content(), "");
        assert!(resp.tool_calls().is_empty());
    }
}
