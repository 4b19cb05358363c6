//! Core types for the pepebot assistant platform.
//!
//! This crate has no async machinery of its own: it defines the data
//! model shared by every other pepebot crate — configuration, errors,
//! message envelopes, chat messages, sessions, agent definitions, MCP
//! server definitions, workflows, cron jobs, and skills.

pub mod agent;
pub mod config;
pub mod cron;
pub mod error;
pub mod event;
pub mod mcp;
pub mod message;
pub mod session;
pub mod skill;
pub mod workflow;

pub use error::{ChannelError, PepebotError, Result};
