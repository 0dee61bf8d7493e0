use std::collections::BTreeMap;
use std::path::PathBuf;

use async_trait::async_trait;
use tracing::debug;

use proxy_core::types::ToolDefinition;

use crate::safety;
use crate::ToolHandler;

/// One-shot shell command execution via `sh -c`.
pub struct ShellTool;

#[async_trait]
impl ToolHandler for ShellTool {
    fn definition(&self) -> ToolDefinition {
        let mut parameters = BTreeMap::new();
        parameters.insert("command".to_string(), "the shell command to run".to_string());
        ToolDefinition {
            name: "shell".to_string(),
            description: "Execute a shell command and return its stdout/stderr.".to_string(),
            parameters,
        }
    }

    async fn call(&self, params: serde_json::Value) -> Result<String, String> {
        let command = params
            .get("command")
            .and_then(|v| v.as_str())
            .ok_or_else(|| "missing required parameter: command".to_string())?;

        if let Err(reason) = safety::check_command(command) {
            debug!(command, reason, "blocked unsafe shell command");
            return Err(format!("blocked: {reason}"));
        }

        debug!(command, "executing shell command");
        let output = tokio::process::Command::new("sh")
            .arg("-c")
            .arg(command)
            .output()
            .await
            .map_err(|e| format!("failed to spawn: {e}"))?;

        let mut text = String::new();
        text.push_str(&String::from_utf8_lossy(&output.stdout));
        if !output.stderr.is_empty() {
            if !text.is_empty() {
                text.push('\n');
            }
            text.push_str("[stderr]\n");
            text.push_str(&String::from_utf8_lossy(&output.stderr));
        }
        if !output.status.success() {
            text.push_str(&format!("\n[exit code: {}]", output.status.code().unwrap_or(-1)));
        }
        if text.is_empty() {
            text.push_str("(no output)");
        }
        Ok(text)
    }
}

/// Read a file under the configured workspace root.
pub struct FsReadTool {
    root: PathBuf,
}

impl FsReadTool {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

#[async_trait]
impl ToolHandler for FsReadTool {
    fn definition(&self) -> ToolDefinition {
        let mut parameters = BTreeMap::new();
        parameters.insert("path".to_string(), "path relative to the workspace root".to_string());
        ToolDefinition {
            name: "fs_read".to_string(),
            description: "Read the contents of a file.".to_string(),
            parameters,
        }
    }

    async fn call(&self, params: serde_json::Value) -> Result<String, String> {
        let path = params
            .get("path")
            .and_then(|v| v.as_str())
            .ok_or_else(|| "missing required parameter: path".to_string())?;
        let full = self.root.join(path);
        tokio::fs::read_to_string(&full)
            .await
            .map_err(|e| format!("read failed: {e}"))
    }
}

/// Write a file under the configured workspace root, creating parent
/// directories as needed.
pub struct FsWriteTool {
    root: PathBuf,
}

impl FsWriteTool {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

#[async_trait]
impl ToolHandler for FsWriteTool {
    fn definition(&self) -> ToolDefinition {
        let mut parameters = BTreeMap::new();
        parameters.insert("path".to_string(), "path relative to the workspace root".to_string());
        parameters.insert("content".to_string(), "content to write".to_string());
        ToolDefinition {
            name: "fs_write".to_string(),
            description: "Write content to a file, creating parent directories as needed.".to_string(),
            parameters,
        }
    }

    async fn call(&self, params: serde_json::Value) -> Result<String, String> {
        let path = params
            .get("path")
            .and_then(|v| v.as_str())
            .ok_or_else(|| "missing required parameter: path".to_string())?;
        let content = params
            .get("content")
            .and_then(|v| v.as_str())
            .ok_or_else(|| "missing required parameter: content".to_string())?;
        let full = self.root.join(path);
        if let Some(parent) = full.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| format!("mkdir failed: {e}"))?;
        }
        tokio::fs::write(&full, content)
            .await
            .map_err(|e| format!("write failed: {e}"))?;
        Ok(format!("✅ wrote {} bytes to {path}", content.len()))
    }
}

/// Current time in UTC — grounds the `{time}` tool set from the classifier.
pub struct TimeTool;

#[async_trait]
impl ToolHandler for TimeTool {
    fn definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: "time".to_string(),
            description: "Return the current date and time (UTC).".to_string(),
            parameters: BTreeMap::new(),
        }
    }

    async fn call(&self, _params: serde_json::Value) -> Result<String, String> {
        Ok(chrono::Utc::now().to_rfc3339())
    }
}

/// Generic proxy for an external tool backend (task board, web search,
/// calendar, mail, ...) reached over HTTP. The backend's own interface is
/// out of scope; this only forwards `params` as a JSON POST body
/// and returns the response body as text.
pub struct HttpBackendTool {
    name: String,
    description: String,
    endpoint: String,
    client: reqwest::Client,
}

impl HttpBackendTool {
    pub fn new(name: impl Into<String>, description: impl Into<String>, endpoint: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            endpoint: endpoint.into(),
            client: reqwest::Client::new(),
        }
    }
}

#[async_trait]
impl ToolHandler for HttpBackendTool {
    fn definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: self.name.clone(),
            description: self.description.clone(),
            parameters: BTreeMap::new(),
        }
    }

    async fn call(&self, params: serde_json::Value) -> Result<String, String> {
        let resp = self
            .client
            .post(&self.endpoint)
            .json(&params)
            .send()
            .await
            .map_err(|e| format!("backend request failed: {e}"))?;

        if !resp.status().is_success() {
            return Err(format!("backend returned {}", resp.status()));
        }

        resp.text().await.map_err(|e| format!("reading backend response failed: {e}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn shell_tool_returns_stdout() {
        let tool = ShellTool;
        let out = tool.call(serde_json::json!({"command": "echo hi"})).await.unwrap();
        assert!(out.contains("hi"));
    }

    #[tokio::test]
    async fn fs_write_then_read_roundtrips() {
        let dir = tempfile::tempdir().unwrap();
        let writer = FsWriteTool::new(dir.path());
        let reader = FsReadTool::new(dir.path());

        writer
            .call(serde_json::json!({"path": "note.md", "content": "hello"}))
            .await
            .unwrap();
        let content = reader.call(serde_json::json!({"path": "note.md"})).await.unwrap();
        assert_eq!(content, "hello");
    }

    #[tokio::test]
    async fn fs_read_missing_file_is_an_error_not_a_panic() {
        let dir = tempfile::tempdir().unwrap();
        let reader = FsReadTool::new(dir.path());
        assert!(reader.call(serde_json::json!({"path": "missing.md"})).await.is_err());
    }
}
