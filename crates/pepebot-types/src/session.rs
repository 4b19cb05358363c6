//! Conversation session types.
//!
//! A [`Session`] holds the ordered message history for one logical
//! conversation plus a compressed summary of everything truncated away
//! by consolidation. Sessions are keyed by `"{channel}:{chat_id}"`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::message::ChatMessage;

/// A conversation session.
///
/// Invariant: every tool-role message in `messages` is preceded
/// (possibly after other tool responses) by an assistant message whose
/// `tool_calls` contains the matching id. The agent loop maintains this
/// by committing only completed user/assistant pairs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    /// Session key, typically `"{channel}:{chat_id}"`.
    pub key: String,

    /// Ordered message history.
    #[serde(default)]
    pub messages: Vec<ChatMessage>,

    /// Compressed summary of pre-truncation history. Empty when no
    /// consolidation has run yet.
    #[serde(default)]
    pub summary: String,

    /// When the session was first created.
    #[serde(default = "Utc::now")]
    pub created_at: DateTime<Utc>,

    /// When the session was last updated.
    #[serde(default = "Utc::now")]
    pub updated_at: DateTime<Utc>,
}

impl Session {
    /// Create a new empty session with the given key.
    pub fn new(key: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            key: key.into(),
            messages: Vec::new(),
            summary: String::new(),
            created_at: now,
            updated_at: now,
        }
    }

    /// Append a message and bump the updated timestamp.
    pub fn add(&mut self, message: ChatMessage) {
        self.messages.push(message);
        self.updated_at = Utc::now();
    }

    /// Number of messages in the history.
    pub fn history_len(&self) -> usize {
        self.messages.len()
    }

    /// Rough token estimate: total content characters divided by 4.
    /// Image blocks count a flat 1000 characters each.
    pub fn estimated_tokens(&self) -> usize {
        let chars: usize = self
            .messages
            .iter()
            .map(|m| m.content.estimated_chars())
            .sum();
        chars / 4
    }

    /// Retain only the last `keep_tail` messages.
    pub fn truncate_to_tail(&mut self, keep_tail: usize) {
        let len = self.messages.len();
        if len > keep_tail {
            self.messages.drain(..len - keep_tail);
            self.updated_at = Utc::now();
        }
    }

    /// Drop history and summary.
    pub fn clear(&mut self) {
        self.messages.clear();
        self.summary.clear();
        self.updated_at = Utc::now();
    }
}

impl Default for Session {
    fn default() -> Self {
        Self::new("")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::{ContentBlock, MessageContent};

    #[test]
    fn new_session_is_empty() {
        let s = Session::new("telegram:123");
        assert_eq!(s.key, "telegram:123");
        assert!(s.messages.is_empty());
        assert!(s.summary.is_empty());
    }

    #[test]
    fn add_bumps_updated_at() {
        let mut s = Session::new("t");
        let before = s.updated_at;
        s.add(ChatMessage::user("hello"));
        assert_eq!(s.history_len(), 1);
        assert!(s.updated_at >= before);
    }

    #[test]
    fn estimated_tokens_divides_by_four() {
        let mut s = Session::new("t");
        s.add(ChatMessage::user("x".repeat(400)));
        assert_eq!(s.estimated_tokens(), 100);
    }

    #[test]
    fn estimated_tokens_counts_images() {
        let mut s = Session::new("t");
        s.add(ChatMessage::user(MessageContent::Blocks(vec![
            ContentBlock::text(""),
            ContentBlock::image("u"),
        ])));
        assert_eq!(s.estimated_tokens(), 250);
    }

    #[test]
    fn truncate_keeps_tail() {
        let mut s = Session::new("t");
        for i in 0..10 {
            s.add(ChatMessage::user(format!("msg {i}")));
        }
        s.truncate_to_tail(4);
        assert_eq!(s.history_len(), 4);
        assert_eq!(s.messages[0].content.as_text(), "msg 6");
        assert_eq!(s.messages[3].content.as_text(), "msg 9");
    }

    #[test]
    fn truncate_noop_when_short() {
        let mut s = Session::new("t");
        s.add(ChatMessage::user("only"));
        s.truncate_to_tail(4);
        assert_eq!(s.history_len(), 1);
    }

    #[test]
    fn clear_resets_everything() {
        let mut s = Session::new("t");
        s.add(ChatMessage::user("hello"));
        s.summary = "old summary".into();
        s.clear();
        assert!(s.messages.is_empty());
        assert!(s.summary.is_empty());
    }

    #[test]
    fn serde_roundtrip_preserves_tool_calls() {
        use crate::message::ToolCall;

        let mut s = Session::new("slack:C123");
        s.add(ChatMessage::user("add 2 and 3"));
        s.add(ChatMessage::assistant_with_tool_calls(
            "",
            vec![ToolCall::function("a", "add", r#"{"x":2,"y":3}"#)],
        ));
        s.add(ChatMessage::tool("a", "5"));
        s.add(ChatMessage::assistant("5"));
        s.summary = "earlier maths".into();

        let json = serde_json::to_string(&s).unwrap();
        let restored: Session = serde_json::from_str(&json).unwrap();
        assert_eq!(restored.key, "slack:C123");
        assert_eq!(restored.messages, s.messages);
        assert_eq!(restored.summary, "earlier maths");
        assert_eq!(
            restored.messages[2].tool_call_id.as_deref(),
            Some("a")
        );
    }
}
