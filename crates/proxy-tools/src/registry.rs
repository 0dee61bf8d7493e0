use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use tracing::warn;

use proxy_core::types::ToolDefinition;

use crate::mcp::McpStatus;
use crate::ToolHandler;

/// Tool outputs longer than this are truncated, keeping a prefix and suffix
/// around a marker.
pub const DEFAULT_OUTPUT_CAP: usize = 8_000;
/// Per-call timeout.
pub const DEFAULT_TIMEOUT_S: u64 = 30;

const TRUNCATION_MARKER: &str = "\n...[truncated]...\n";

#[derive(Debug, Clone, serde::Serialize)]
pub struct ToolOutput {
    pub text: String,
    pub truncated: bool,
}

#[derive(Debug, Clone, serde::Serialize)]
pub struct RegistryHealth {
    pub healthy: usize,
    pub failed: usize,
    pub total: usize,
}

/// Name-keyed map of tool handlers.
pub struct ToolRegistry {
    handlers: DashMap<String, Arc<dyn ToolHandler>>,
    timeout: Duration,
    output_cap: usize,
    mcp_status: DashMap<String, McpStatus>,
}

impl ToolRegistry {
    pub fn new(timeout_s: u64, output_cap: usize) -> Self {
        Self {
            handlers: DashMap::new(),
            timeout: Duration::from_secs(timeout_s),
            output_cap,
            mcp_status: DashMap::new(),
        }
    }

    pub fn register(&self, handler: Arc<dyn ToolHandler>) {
        let name = handler.definition().name.clone();
        self.handlers.insert(name, handler);
    }

    /// Mark an MCP-backed server's tools as healthy or failed, surfaced on
    /// the `/health` endpoint.
    pub fn set_mcp_status(&self, server: &str, status: McpStatus) {
        self.mcp_status.insert(server.to_string(), status);
    }

    pub fn mcp_health(&self) -> RegistryHealth {
        let mut healthy = 0;
        let mut failed = 0;
        for entry in self.mcp_status.iter() {
            match entry.value() {
                McpStatus::Healthy => healthy += 1,
                McpStatus::Failed => failed += 1,
            }
        }
        RegistryHealth {
            healthy,
            failed,
            total: healthy + failed,
        }
    }

    pub fn names(&self) -> Vec<String> {
        self.handlers.iter().map(|e| e.key().clone()).collect()
    }

    /// Tool descriptors for healthy tools, optionally restricted to a
    /// classifier-selected subset. An empty `allowed` means "all healthy
    /// tools".
    pub fn manifest(&self, allowed: &[String]) -> Vec<ToolDefinition> {
        self.handlers
            .iter()
            .filter(|e| allowed.is_empty() || allowed.iter().any(|a| a == e.key()))
            .map(|e| e.value().definition())
            .collect()
    }

    /// Execute `name` with `params`, bounded by the per-call timeout, with
    /// the result truncated to `output_cap`. Never propagates an error out
    /// — every failure mode becomes a short human-readable string instead
    ///.
    pub async fn execute(&self, name: &str, params: serde_json::Value) -> ToolOutput {
        let Some(handler) = self.handlers.get(name).map(|e| e.value().clone()) else {
            warn!(tool = name, "tool not found");
            return ToolOutput {
                text: format!("❌ unknown tool: {name}"),
                truncated: false,
            };
        };

        let result = tokio::time::timeout(self.timeout, handler.call(params)).await;

        let text = match result {
            Ok(Ok(text)) => text,
            Ok(Err(message)) => format!("❌ {message}"),
            Err(_) => {
                warn!(tool = name, timeout_s = self.timeout.as_secs(), "tool call timed out");
                "❌ timeout".to_string()
            }
        };

        self.cap_output(text)
    }

    fn cap_output(&self, text: String) -> ToolOutput {
        if text.chars().count() <= self.output_cap {
            return ToolOutput {
                text,
                truncated: false,
            };
        }

        let half = self.output_cap.saturating_sub(TRUNCATION_MARKER.len()) / 2;
        let chars: Vec<char> = text.chars().collect();
        let prefix: String = chars[..half].iter().collect();
        let suffix: String = chars[chars.len() - half..].iter().collect();

        ToolOutput {
            text: format!("{prefix}{TRUNCATION_MARKER}{suffix}"),
            truncated: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;

    struct EchoTool;

    #[async_trait]
    impl ToolHandler for EchoTool {
        fn definition(&self) -> ToolDefinition {
            ToolDefinition {
                name: "echo".to_string(),
                description: "echoes input".to_string(),
                parameters: Default::default(),
            }
        }
        async fn call(&self, params: serde_json::Value) -> Result<String, String> {
            Ok(params.to_string())
        }
    }

    struct SlowTool;

    #[async_trait]
    impl ToolHandler for SlowTool {
        fn definition(&self) -> ToolDefinition {
            ToolDefinition {
                name: "slow".to_string(),
                description: "sleeps".to_string(),
                parameters: Default::default(),
            }
        }
        async fn call(&self, _params: serde_json::Value) -> Result<String, String> {
            tokio::time::sleep(Duration::from_secs(60)).await;
            Ok("never".to_string())
        }
    }

    #[tokio::test]
    async fn unknown_tool_returns_error_text_not_panic() {
        let registry = ToolRegistry::new(1, DEFAULT_OUTPUT_CAP);
        let out = registry.execute("nonexistent", serde_json::json!({})).await;
        assert!(out.text.contains("unknown tool"));
    }

    #[tokio::test]
    async fn timeout_is_surfaced_as_text_not_error() {
        let registry = ToolRegistry::new(0, DEFAULT_OUTPUT_CAP);
        registry.register(Arc::new(SlowTool));
        let out = registry.execute("slow", serde_json::json!({})).await;
        assert!(out.text.contains("timeout"));
    }

    #[tokio::test]
    async fn large_output_is_truncated_with_marker() {
        let registry = ToolRegistry::new(5, 100);
        registry.register(Arc::new(EchoTool));
        let huge = "x".repeat(1000);
        let out = registry.execute("echo", serde_json::json!(huge)).await;
        assert!(out.truncated);
        assert!(out.text.len() <= 100 + TRUNCATION_MARKER.len() + 16);
        assert!(out.text.contains("truncated"));
    }

    #[test]
    fn manifest_empty_allowlist_returns_all() {
        let registry = ToolRegistry::new(30, DEFAULT_OUTPUT_CAP);
        registry.register(Arc::new(EchoTool));
        assert_eq!(registry.manifest(&[]).len(), 1);
        assert_eq!(registry.manifest(&["echo".to_string()]).len(), 1);
        assert_eq!(registry.manifest(&["other".to_string()]).len(), 0);
    }
}
