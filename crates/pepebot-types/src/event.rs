//! Message envelopes for the channel bus.
//!
//! [`InboundMessage`] represents user input arriving from a chat
//! transport, [`OutboundMessage`] an agent response heading back out.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Metadata keys the agent manager recognizes on inbound envelopes.
pub mod metadata_keys {
    /// Target agent name override.
    pub const AGENT: &str = "agent";
    /// Originating channel name (duplicated for the context block).
    pub const CHANNEL: &str = "channel";
    /// Channel-native conversation id for the context block.
    pub const CHANNEL_ID: &str = "channel_id";
    /// Transport message id.
    pub const MESSAGE_ID: &str = "message_id";
    /// `"true"` when the message came from a group conversation.
    pub const IS_GROUP: &str = "is_group";
}

/// An inbound message received from a chat channel.
///
/// Carries the raw user input plus channel-specific metadata. Use
/// [`session_key`](InboundMessage::session_key) to derive a stable
/// session identifier; transports that need a different grouping set
/// the explicit `session_key` field and it wins.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InboundMessage {
    /// Channel name (e.g. "telegram", "discord", "cli").
    pub channel: String,

    /// Sender identifier within the channel.
    pub sender_id: String,

    /// Chat / conversation identifier within the channel.
    pub chat_id: String,

    /// Message text content.
    pub content: String,

    /// When the message was received.
    #[serde(default = "Utc::now")]
    pub timestamp: DateTime<Utc>,

    /// URLs or local paths for attached media, in order.
    #[serde(default)]
    pub media: Vec<String>,

    /// Transport-assigned session key. When absent the key is derived
    /// as `"{channel}:{chat_id}"`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_key: Option<String>,

    /// Channel-specific metadata (see [`metadata_keys`]).
    #[serde(default)]
    pub metadata: HashMap<String, String>,
}

impl InboundMessage {
    /// Create a text-only envelope with derived session key.
    pub fn new(
        channel: impl Into<String>,
        sender_id: impl Into<String>,
        chat_id: impl Into<String>,
        content: impl Into<String>,
    ) -> Self {
        Self {
            channel: channel.into(),
            sender_id: sender_id.into(),
            chat_id: chat_id.into(),
            content: content.into(),
            timestamp: Utc::now(),
            media: Vec::new(),
            session_key: None,
            metadata: HashMap::new(),
        }
    }

    /// Stable key for session identification.
    ///
    /// Returns the transport-supplied key when present, otherwise
    /// `"{channel}:{chat_id}"`. Two envelopes with identical transport
    /// and chat always route to the same session.
    pub fn session_key(&self) -> String {
        match &self.session_key {
            Some(key) => key.clone(),
            None => format!("{}:{}", self.channel, self.chat_id),
        }
    }
}

/// An outbound message to send to a chat channel.
///
/// Produced by the agent loop (or a tool) and dispatched to the
/// matching channel adapter. Content may contain markdown which the
/// transport renders to its native format.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutboundMessage {
    /// Target channel name.
    pub channel: String,

    /// Target chat / conversation identifier.
    pub chat_id: String,

    /// Message text content.
    pub content: String,

    /// URLs or local paths for attached media, in order.
    #[serde(default)]
    pub media: Vec<String>,
}

impl OutboundMessage {
    /// Create a text-only outbound envelope.
    pub fn new(
        channel: impl Into<String>,
        chat_id: impl Into<String>,
        content: impl Into<String>,
    ) -> Self {
        Self {
            channel: channel.into(),
            chat_id: chat_id.into(),
            content: content.into(),
            media: Vec::new(),
        }
    }
}
