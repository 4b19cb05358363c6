//! Channel plugin system for pepebot.
//!
//! A channel is a bidirectional binding to a chat platform. Concrete
//! SDK glue (Telegram, Discord, ...) lives in its own crates; this one
//! defines the [`Channel`] / [`ChannelHost`] contract and the
//! [`ChannelManager`] that owns lifecycles, enforces allow-lists, and
//! binds channels to the message bus.
//!
//! [`Channel`]: traits::Channel
//! [`ChannelHost`]: traits::ChannelHost
//! [`ChannelManager`]: manager::ChannelManager

pub mod manager;
pub mod traits;

pub use manager::ChannelManager;
pub use traits::{Channel, ChannelHost, ChannelStatus};
