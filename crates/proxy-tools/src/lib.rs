//! Tool Registry and MCP-style server degradation.
//!
//! The individual tool backends (task board, web search, shell runner, ...)
//! are external collaborators; this crate only owns the uniform
//! `execute(name, params) -> text` surface over them, plus the built-in
//! handlers that are cheap enough to implement directly (shell, filesystem,
//! clock) rather than proxy out.

pub mod handlers;
pub mod mcp;
pub mod registry;
pub mod safety;

pub use handlers::{FsReadTool, FsWriteTool, HttpBackendTool, ShellTool, TimeTool};
pub use mcp::{McpServerDescriptor, McpStatus};
pub use registry::{RegistryHealth, ToolOutput, ToolRegistry};

use async_trait::async_trait;
use proxy_core::types::ToolDefinition;

/// Implemented by every tool backend the registry dispatches to. Handlers
/// never propagate exceptions out of the loop — failures come back as an
/// `Err(String)` with a short human-readable message, which the registry turns into the tool-role message
/// text the orchestrator feeds back to the model.
#[async_trait]
pub trait ToolHandler: Send + Sync {
    fn definition(&self) -> ToolDefinition;
    async fn call(&self, params: serde_json::Value) -> Result<String, String>;
}
