//! Tool contract and registry.

pub mod registry;

pub use registry::{Tool, ToolContext, ToolError, ToolRegistry};
