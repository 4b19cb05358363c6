//! Outbound message tool.
//!
//! Lets the model send a message proactively (cron-triggered check-ins,
//! long-running task updates) by publishing an outbound envelope onto
//! the bus. The destination defaults to the conversation the tool call
//! originated from.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::json;

use pepebot_core::bus::MessageBus;
use pepebot_core::tools::{Tool, ToolContext, ToolError};
use pepebot_types::event::OutboundMessage;

/// Send a message to a chat channel.
pub struct SendMessageTool {
    bus: Arc<MessageBus>,
}

impl SendMessageTool {
    /// Create the tool over the given bus.
    pub fn new(bus: Arc<MessageBus>) -> Self {
        Self { bus }
    }
}

#[async_trait]
impl Tool for SendMessageTool {
    fn name(&self) -> &str {
        "send_message"
    }

    fn description(&self) -> &str {
        "Send a message to a chat channel. Defaults to the current conversation."
    }

    fn parameters(&self) -> serde_json::Value {
        json!({
            "type": "object",
            "properties": {
                "content": {"type": "string", "description": "The message text"},
                "channel": {"type": "string", "description": "Target channel (defaults to the current one)"},
                "chat_id": {"type": "string", "description": "Target chat id (defaults to the current one)"}
            },
            "required": ["content"]
        })
    }

    async fn execute(
        &self,
        ctx: &ToolContext,
        args: serde_json::Value,
    ) -> Result<String, ToolError> {
        let content = args
            .get("content")
            .and_then(|v| v.as_str())
            .ok_or_else(|| ToolError::InvalidArgs("missing required field: content".into()))?;

        let channel = args
            .get("channel")
            .and_then(|v| v.as_str())
            .unwrap_or(&ctx.channel);
        let chat_id = args
            .get("chat_id")
            .and_then(|v| v.as_str())
            .unwrap_or(&ctx.chat_id);

        if channel.is_empty() || chat_id.is_empty() {
            return Err(ToolError::InvalidArgs(
                "no target: specify channel and chat_id outside a conversation".into(),
            ));
        }

        self.bus
            .dispatch_outbound(OutboundMessage::new(channel, chat_id, content))
            .map_err(|e| ToolError::ExecutionFailed(e.to_string()))?;
        Ok(format!("Message sent to {channel}:{chat_id}"))
    }
}
