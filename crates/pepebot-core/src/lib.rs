//! Core engine for pepebot.
//!
//! Wires the message bus, session store, tool registry, context
//! builder, agent loop, agent manager, and workflow executor together.
//! Chat transports publish [`InboundMessage`]s onto the
//! [`bus::MessageBus`]; the [`agent::manager::AgentManager`] consumes
//! them, runs the tool-using LLM loop, and dispatches replies back out.
//!
//! [`InboundMessage`]: pepebot_types::event::InboundMessage

pub mod agent;
pub mod bus;
pub mod session;
pub mod tools;
pub mod workflow;
