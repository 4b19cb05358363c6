//! Channel trait definitions.
//!
//! [`Channel`] is implemented by each transport binding; [`ChannelHost`]
//! is implemented by the host and consumed by channels to deliver
//! inbound messages without holding references to application state.

use std::sync::Arc;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use pepebot_types::error::ChannelError;
use pepebot_types::event::{InboundMessage, OutboundMessage};

/// Lifecycle status of a channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChannelStatus {
    /// Not yet started.
    Stopped,
    /// Running and processing messages.
    Running,
    /// Encountered an error.
    Error(String),
}

/// The trait every channel binding implements.
///
/// The host manages the lifecycle: [`start`](Channel::start) is
/// long-lived and runs until the cancellation token fires; the host
/// calls [`send`](Channel::send) to push outbound messages.
#[async_trait]
pub trait Channel: Send + Sync {
    /// Unique channel identifier (e.g. `"telegram"`).
    fn name(&self) -> &str;

    /// Current lifecycle status.
    fn status(&self) -> ChannelStatus;

    /// Whether a sender may interact with this channel. An empty
    /// allow-list means everyone.
    fn is_allowed(&self, sender_id: &str) -> bool;

    /// Start receiving messages, delivering them through
    /// [`ChannelHost::deliver_inbound`] until `cancel` fires.
    async fn start(
        &self,
        host: Arc<dyn ChannelHost>,
        cancel: CancellationToken,
    ) -> Result<(), ChannelError>;

    /// Send an outbound message through this channel.
    async fn send(&self, msg: &OutboundMessage) -> Result<(), ChannelError>;
}

/// Services the host exposes to channels.
#[async_trait]
pub trait ChannelHost: Send + Sync {
    /// Deliver an inbound message to the processing pipeline.
    async fn deliver_inbound(&self, msg: InboundMessage) -> Result<(), ChannelError>;
}
