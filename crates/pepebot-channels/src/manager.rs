//! Channel lifecycle management and bus binding.
//!
//! The [`ChannelManager`] owns the registered channels, starts each in
//! its own task, gates inbound delivery on the channel's allow-list,
//! and pumps the bus's outbound queue to the matching channel's
//! `send`.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use pepebot_core::bus::MessageBus;
use pepebot_types::error::ChannelError;
use pepebot_types::event::InboundMessage;

use crate::traits::{Channel, ChannelHost};

/// Host implementation that publishes inbound messages onto the bus,
/// enforcing the owning channel's allow-list first.
struct BusHost {
    bus: Arc<MessageBus>,
    channel: Arc<dyn Channel>,
}

#[async_trait]
impl ChannelHost for BusHost {
    async fn deliver_inbound(&self, msg: InboundMessage) -> Result<(), ChannelError> {
        if !self.channel.is_allowed(&msg.sender_id) {
            debug!(
                channel = %msg.channel,
                sender = %msg.sender_id,
                "sender not in allow-list, dropping message"
            );
            return Ok(());
        }
        self.bus
            .publish_inbound_async(msg)
            .await
            .map_err(|e| ChannelError::SendFailed(e.to_string()))
    }
}

/// Owns channels and their tasks.
pub struct ChannelManager {
    bus: Arc<MessageBus>,
    channels: HashMap<String, Arc<dyn Channel>>,
}

impl ChannelManager {
    /// Create a manager bound to the given bus.
    pub fn new(bus: Arc<MessageBus>) -> Self {
        Self {
            bus,
            channels: HashMap::new(),
        }
    }

    /// Register a channel. Last registration wins on name collision.
    pub fn register(&mut self, channel: Arc<dyn Channel>) {
        let name = channel.name().to_string();
        if self.channels.insert(name.clone(), channel).is_some() {
            warn!(channel = %name, "replaced existing channel registration");
        } else {
            debug!(channel = %name, "registered channel");
        }
    }

    /// Registered channel names, sorted.
    pub fn channel_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.channels.keys().cloned().collect();
        names.sort();
        names
    }

    /// Look up a channel by name.
    pub fn get(&self, name: &str) -> Option<Arc<dyn Channel>> {
        self.channels.get(name).cloned()
    }

    /// Start every channel and the outbound pump. Returns once all
    /// tasks are spawned; they run until `cancel` fires.
    pub fn start_all(&self, cancel: CancellationToken) {
        for (name, channel) in &self.channels {
            let host: Arc<dyn ChannelHost> = Arc::new(BusHost {
                bus: self.bus.clone(),
                channel: channel.clone(),
            });
            let channel = channel.clone();
            let cancel = cancel.clone();
            let name = name.clone();
            tokio::spawn(async move {
                info!(channel = %name, "starting channel");
                if let Err(e) = channel.start(host, cancel).await {
                    warn!(channel = %name, error = %e, "channel exited with error");
                }
            });
        }

        // Outbound pump: route each envelope to its channel.
        let bus = self.bus.clone();
        let channels = self.channels.clone();
        tokio::spawn(async move {
            loop {
                let Some(msg) = bus.consume_outbound(&cancel).await else {
                    info!("outbound pump exiting");
                    break;
                };
                match channels.get(&msg.channel) {
                    Some(channel) => {
                        if let Err(e) = channel.send(&msg).await {
                            warn!(channel = %msg.channel, error = %e, "outbound send failed");
                        }
                    }
                    None => {
                        warn!(channel = %msg.channel, "outbound message for unknown channel dropped");
                    }
                }
            }
        });
    }
}
