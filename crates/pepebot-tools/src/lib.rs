//! Built-in tool implementations for pepebot.
//!
//! - **File tools** ([`file_tools`]): `read_file`, `write_file`,
//!   `edit_file`, `list_directory`, all resolved against the workspace.
//! - **Shell tool** ([`shell_tool`]): `exec_shell` with timeout
//!   enforcement.
//! - **Message tool** ([`message_tool`]): `send_message`, publishing an
//!   outbound envelope onto the bus.

pub mod file_tools;
pub mod message_tool;
pub mod shell_tool;

use std::path::PathBuf;
use std::sync::Arc;

use pepebot_core::bus::MessageBus;
use pepebot_core::tools::ToolRegistry;

/// Register every built-in tool with the given registry.
///
/// File tools resolve paths against `workspace_dir`; the shell tool
/// runs with it as working directory and `exec_timeout_secs` as its
/// cap; the message tool publishes through `bus`.
pub fn register_all(
    registry: &ToolRegistry,
    workspace_dir: PathBuf,
    exec_timeout_secs: u64,
    bus: Arc<MessageBus>,
) {
    registry.register(Arc::new(file_tools::ReadFileTool::new(workspace_dir.clone())));
    registry.register(Arc::new(file_tools::WriteFileTool::new(workspace_dir.clone())));
    registry.register(Arc::new(file_tools::EditFileTool::new(workspace_dir.clone())));
    registry.register(Arc::new(file_tools::ListDirectoryTool::new(
        workspace_dir.clone(),
    )));
    registry.register(Arc::new(shell_tool::ShellExecTool::new(
        workspace_dir,
        exec_timeout_secs,
    )));
    registry.register(Arc::new(message_tool::SendMessageTool::new(bus)));
}
