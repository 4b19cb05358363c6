//! File tools: read, write, edit, and list within the workspace.
//!
//! All tools enforce workspace containment: paths are resolved against
//! the workspace root, canonicalized, and rejected when the canonical
//! result escapes the canonical workspace. Write targets that do not
//! exist yet are checked through their nearest existing ancestor.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde_json::json;

use pepebot_core::tools::{Tool, ToolContext, ToolError};

/// Validate that `raw` resolves to an existing location within
/// `workspace`, following symlinks.
///
/// Returns the canonical path on success.
fn validate_path(workspace: &Path, raw: &str) -> Result<PathBuf, ToolError> {
    let resolved = workspace.join(raw);
    let canonical = std::fs::canonicalize(&resolved)
        .map_err(|e| ToolError::ExecutionFailed(format!("{}: {e}", resolved.display())))?;

    let workspace_canonical = std::fs::canonicalize(workspace)
        .map_err(|e| ToolError::ExecutionFailed(format!("workspace: {e}")))?;

    if !canonical.starts_with(&workspace_canonical) {
        return Err(ToolError::InvalidArgs(format!(
            "path escapes workspace: {raw}"
        )));
    }
    Ok(canonical)
}

/// Validate a write target that may not exist yet.
///
/// Walks up to the deepest existing ancestor, canonicalizes it, and
/// requires it to stay within the workspace. Returns the resolved
/// (non-canonical) path for the caller to create.
fn validate_parent_path(workspace: &Path, raw: &str) -> Result<PathBuf, ToolError> {
    let resolved = workspace.join(raw);

    let mut ancestor = resolved.as_path();
    loop {
        if ancestor.exists() {
            break;
        }
        ancestor = ancestor.parent().ok_or_else(|| {
            ToolError::InvalidArgs(format!("path escapes workspace: {raw}"))
        })?;
    }

    let canonical_ancestor = std::fs::canonicalize(ancestor)
        .map_err(|e| ToolError::ExecutionFailed(format!("{}: {e}", ancestor.display())))?;

    let workspace_canonical = std::fs::canonicalize(workspace)
        .map_err(|e| ToolError::ExecutionFailed(format!("workspace: {e}")))?;

    if !canonical_ancestor.starts_with(&workspace_canonical) {
        return Err(ToolError::InvalidArgs(format!(
            "path escapes workspace: {raw}"
        )));
    }
    Ok(resolved)
}

fn path_arg(args: &serde_json::Value) -> Result<&str, ToolError> {
    args.get("path")
        .and_then(|v| v.as_str())
        .ok_or_else(|| ToolError::InvalidArgs("missing required field: path".into()))
}

/// Read a file's contents. Rejects paths that escape the workspace.
pub struct ReadFileTool {
    workspace: PathBuf,
}

impl ReadFileTool {
    /// Create the tool sandboxed to the workspace.
    pub fn new(workspace: PathBuf) -> Self {
        Self { workspace }
    }
}

#[async_trait]
impl Tool for ReadFileTool {
    fn name(&self) -> &str {
        "read_file"
    }

    fn description(&self) -> &str {
        "Read a file and return its contents."
    }

    fn parameters(&self) -> serde_json::Value {
        json!({
            "type": "object",
            "properties": {
                "path": {"type": "string", "description": "File path (relative to workspace)"}
            },
            "required": ["path"]
        })
    }

    async fn execute(
        &self,
        _ctx: &ToolContext,
        args: serde_json::Value,
    ) -> Result<String, ToolError> {
        let path = validate_path(&self.workspace, path_arg(&args)?)?;
        tokio::fs::read_to_string(&path)
            .await
            .map_err(|e| ToolError::ExecutionFailed(format!("{}: {e}", path.display())))
    }
}

/// Write (create or overwrite) a file. Rejects paths that escape the
/// workspace.
pub struct WriteFileTool {
    workspace: PathBuf,
}

impl WriteFileTool {
    /// Create the tool sandboxed to the workspace.
    pub fn new(workspace: PathBuf) -> Self {
        Self { workspace }
    }
}

#[async_trait]
impl Tool for WriteFileTool {
    fn name(&self) -> &str {
        "write_file"
    }

    fn description(&self) -> &str {
        "Write content to a file, creating parent directories as needed."
    }

    fn parameters(&self) -> serde_json::Value {
        json!({
            "type": "object",
            "properties": {
                "path": {"type": "string", "description": "File path (relative to workspace)"},
                "content": {"type": "string", "description": "Content to write"}
            },
            "required": ["path", "content"]
        })
    }

    async fn execute(
        &self,
        _ctx: &ToolContext,
        args: serde_json::Value,
    ) -> Result<String, ToolError> {
        let path = validate_parent_path(&self.workspace, path_arg(&args)?)?;
        let content = args
            .get("content")
            .and_then(|v| v.as_str())
            .ok_or_else(|| ToolError::InvalidArgs("missing required field: content".into()))?;

        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| ToolError::ExecutionFailed(e.to_string()))?;
        }
        tokio::fs::write(&path, content)
            .await
            .map_err(|e| ToolError::ExecutionFailed(format!("{}: {e}", path.display())))?;
        Ok(format!("Wrote {} bytes to {}", content.len(), path.display()))
    }
}

/// Replace an exact string occurrence in a file. Rejects paths that
/// escape the workspace.
pub struct EditFileTool {
    workspace: PathBuf,
}

impl EditFileTool {
    /// Create the tool sandboxed to the workspace.
    pub fn new(workspace: PathBuf) -> Self {
        Self { workspace }
    }
}

#[async_trait]
impl Tool for EditFileTool {
    fn name(&self) -> &str {
        "edit_file"
    }

    fn description(&self) -> &str {
        "Replace an exact text occurrence in a file."
    }

    fn parameters(&self) -> serde_json::Value {
        json!({
            "type": "object",
            "properties": {
                "path": {"type": "string", "description": "File path (relative to workspace)"},
                "old_text": {"type": "string", "description": "Exact text to replace"},
                "new_text": {"type": "string", "description": "Replacement text"}
            },
            "required": ["path", "old_text", "new_text"]
        })
    }

    async fn execute(
        &self,
        _ctx: &ToolContext,
        args: serde_json::Value,
    ) -> Result<String, ToolError> {
        let path = validate_path(&self.workspace, path_arg(&args)?)?;
        let old_text = args
            .get("old_text")
            .and_then(|v| v.as_str())
            .ok_or_else(|| ToolError::InvalidArgs("missing required field: old_text".into()))?;
        let new_text = args
            .get("new_text")
            .and_then(|v| v.as_str())
            .ok_or_else(|| ToolError::InvalidArgs("missing required field: new_text".into()))?;

        let content = tokio::fs::read_to_string(&path)
            .await
            .map_err(|e| ToolError::ExecutionFailed(format!("{}: {e}", path.display())))?;

        if !content.contains(old_text) {
            return Err(ToolError::ExecutionFailed(format!(
                "text not found in {}",
                path.display()
            )));
        }

        let updated = content.replacen(old_text, new_text, 1);
        tokio::fs::write(&path, updated)
            .await
            .map_err(|e| ToolError::ExecutionFailed(e.to_string()))?;
        Ok(format!("Edited {}", path.display()))
    }
}

/// List a directory's entries. Rejects paths that escape the
/// workspace.
pub struct ListDirectoryTool {
    workspace: PathBuf,
}

impl ListDirectoryTool {
    /// Create the tool sandboxed to the workspace.
    pub fn new(workspace: PathBuf) -> Self {
        Self { workspace }
    }
}

#[async_trait]
impl Tool for ListDirectoryTool {
    fn name(&self) -> &str {
        "list_directory"
    }

    fn description(&self) -> &str {
        "List the entries of a directory."
    }

    fn parameters(&self) -> serde_json::Value {
        json!({
            "type": "object",
            "properties": {
                "path": {"type": "string", "description": "Directory path (defaults to the workspace root)"}
            }
        })
    }

    async fn execute(
        &self,
        _ctx: &ToolContext,
        args: serde_json::Value,
    ) -> Result<String, ToolError> {
        let raw = args.get("path").and_then(|v| v.as_str()).unwrap_or(".");
        let path = validate_path(&self.workspace, raw)?;

        let mut dir = tokio::fs::read_dir(&path)
            .await
            .map_err(|e| ToolError::ExecutionFailed(format!("{}: {e}", path.display())))?;

        let mut entries = Vec::new();
        while let Some(dirent) = dir
            .next_entry()
            .await
            .map_err(|e| ToolError::ExecutionFailed(e.to_string()))?
        {
            let name = dirent.file_name().to_string_lossy().into_owned();
            let suffix = match dirent.file_type().await {
                Ok(ft) if ft.is_dir() => "/",
                _ => "",
            };
            entries.push(format!("{name}{suffix}"));
        }
        entries.sort();
        if entries.is_empty() {
            Ok("(empty)".into())
        } else {
            Ok(entries.join("\n"))
        }
    }
}
