use figment::{
    providers::{Env, Format, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};

pub const DEFAULT_PORT: u16 = 8015;
pub const DEFAULT_BIND: &str = "0.0.0.0";

/// Top-level config (`proxy.toml` + `PROXY_*` env overrides).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProxyConfig {
    #[serde(default)]
    pub gateway: GatewayConfig,
    #[serde(default)]
    pub local_llm: LocalLlmConfig,
    #[serde(default)]
    pub premium_llm: PremiumLlmConfig,
    #[serde(default)]
    pub infra: InfraConfig,
    #[serde(default)]
    pub identity: IdentityConfig,
    #[serde(default)]
    pub session: SessionConfig,
    #[serde(default)]
    pub retrieval: RetrievalConfig,
    #[serde(default)]
    pub budget: BudgetConfig,
    #[serde(default)]
    pub pruning: PruningConfig,
    #[serde(default)]
    pub tools: ToolsConfig,
}

impl Default for ProxyConfig {
    fn default() -> Self {
        Self {
            gateway: GatewayConfig::default(),
            local_llm: LocalLlmConfig::default(),
            premium_llm: PremiumLlmConfig::default(),
            infra: InfraConfig::default(),
            identity: IdentityConfig::default(),
            session: SessionConfig::default(),
            retrieval: RetrievalConfig::default(),
            budget: BudgetConfig::default(),
            pruning: PruningConfig::default(),
            tools: ToolsConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayConfig {
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_bind")]
    pub bind: String,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            port: default_port(),
            bind: default_bind(),
        }
    }
}

/// Local backend — free-text tool-call convention, no auth required.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LocalLlmConfig {
    #[serde(default = "default_llm_endpoint")]
    pub endpoint: String,
    #[serde(default = "default_llm_model")]
    pub model: String,
    #[serde(default = "default_llm_max_tokens")]
    pub max_tokens: u32,
    #[serde(default = "default_context_window")]
    pub context_window: u32,
}

impl Default for LocalLlmConfig {
    fn default() -> Self {
        Self {
            endpoint: default_llm_endpoint(),
            model: default_llm_model(),
            max_tokens: default_llm_max_tokens(),
            context_window: default_context_window(),
        }
    }
}

/// Premium ("god mode") backend — native structured tool calling.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PremiumLlmConfig {
    pub api_key: Option<String>,
    #[serde(default = "default_premium_model")]
    pub model: String,
    #[serde(default = "default_premium_max_tokens")]
    pub max_tokens: u32,
    #[serde(default = "default_premium_base_url")]
    pub base_url: String,
}

impl Default for PremiumLlmConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            model: default_premium_model(),
            max_tokens: default_premium_max_tokens(),
            base_url: default_premium_base_url(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InfraConfig {
    #[serde(default = "default_vector_db_uri")]
    pub vector_db_uri: String,
    #[serde(default = "default_embedding_model")]
    pub embedding_model_path: String,
    #[serde(default = "default_workspace_path")]
    pub workspace_path: String,
}

impl Default for InfraConfig {
    fn default() -> Self {
        Self {
            vector_db_uri: default_vector_db_uri(),
            embedding_model_path: default_embedding_model(),
            workspace_path: default_workspace_path(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IdentityConfig {
    #[serde(default = "default_owner_id")]
    pub owner_id: String,
    #[serde(default = "default_owner_id")]
    pub default_caller_id: String,
}

impl Default for IdentityConfig {
    fn default() -> Self {
        Self {
            owner_id: default_owner_id(),
            default_caller_id: default_owner_id(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    #[serde(default = "default_session_max_messages")]
    pub session_max_messages: usize,
    #[serde(default = "default_session_timeout_s")]
    pub session_timeout_s: i64,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            session_max_messages: default_session_max_messages(),
            session_timeout_s: default_session_timeout_s(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrievalConfig {
    #[serde(default = "default_vector_weight")]
    pub vector_weight: f32,
    #[serde(default = "default_bm25_weight")]
    pub bm25_weight: f32,
    #[serde(default = "default_search_top_k")]
    pub search_top_k: usize,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            vector_weight: default_vector_weight(),
            bm25_weight: default_bm25_weight(),
            search_top_k: default_search_top_k(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BudgetConfig {
    #[serde(default = "default_flush_threshold")]
    pub flush_threshold: u32,
    #[serde(default = "default_reserve_tokens")]
    pub reserve_tokens: u32,
    #[serde(default = "default_min_response_tokens")]
    pub min_response_tokens: u32,
}

impl Default for BudgetConfig {
    fn default() -> Self {
        Self {
            flush_threshold: default_flush_threshold(),
            reserve_tokens: default_reserve_tokens(),
            min_response_tokens: default_min_response_tokens(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PruningConfig {
    #[serde(default = "default_prune_after_messages")]
    pub prune_after_messages: usize,
    #[serde(default = "default_prune_tool_max_chars")]
    pub prune_tool_max_chars: usize,
}

impl Default for PruningConfig {
    fn default() -> Self {
        Self {
            prune_after_messages: default_prune_after_messages(),
            prune_tool_max_chars: default_prune_tool_max_chars(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolsConfig {
    #[serde(default = "default_max_tool_iterations")]
    pub max_tool_iterations: usize,
    #[serde(default = "default_tool_timeout_s")]
    pub tool_timeout_s: u64,
    #[serde(default = "default_tool_output_cap")]
    pub tool_output_cap: usize,
    /// MCP-style tool server descriptors probed at startup (combined, then
    /// individually on failure). Empty by default — nothing to degrade.
    #[serde(default)]
    pub mcp_servers: Vec<McpServerEntry>,
}

impl Default for ToolsConfig {
    fn default() -> Self {
        Self {
            max_tool_iterations: default_max_tool_iterations(),
            tool_timeout_s: default_tool_timeout_s(),
            tool_output_cap: default_tool_output_cap(),
            mcp_servers: Vec::new(),
        }
    }
}

/// One configured MCP-style tool server: a name (matched against classifier
/// tool-sets) and a health-check URL probed at startup.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct McpServerEntry {
    pub name: String,
    pub health_url: String,
}

fn default_port() -> u16 {
    DEFAULT_PORT
}
fn default_bind() -> String {
    DEFAULT_BIND.to_string()
}
fn default_llm_endpoint() -> String {
    "http://127.0.0.1:8010".to_string()
}
fn default_llm_model() -> String {
    "qwen3".to_string()
}
fn default_llm_max_tokens() -> u32 {
    2000
}
fn default_context_window() -> u32 {
    32768
}
fn default_premium_model() -> String {
    "gpt-4o-mini".to_string()
}
fn default_premium_max_tokens() -> u32 {
    2000
}
fn default_premium_base_url() -> String {
    "https://api.openai.com".to_string()
}
fn default_vector_db_uri() -> String {
    "http://localhost:19530".to_string()
}
fn default_embedding_model() -> String {
    "bge-m3".to_string()
}
fn default_workspace_path() -> String {
    let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
    format!("{}/proxy/workspace", home)
}
fn default_owner_id() -> String {
    "owner".to_string()
}
fn default_session_max_messages() -> usize {
    20
}
fn default_session_timeout_s() -> i64 {
    1800
}
fn default_vector_weight() -> f32 {
    0.7
}
fn default_bm25_weight() -> f32 {
    0.3
}
fn default_search_top_k() -> usize {
    5
}
fn default_flush_threshold() -> u32 {
    28_000
}
fn default_reserve_tokens() -> u32 {
    4_000
}
fn default_min_response_tokens() -> u32 {
    256
}
fn default_prune_after_messages() -> usize {
    3
}
fn default_prune_tool_max_chars() -> usize {
    200
}
fn default_max_tool_iterations() -> usize {
    5
}
fn default_tool_timeout_s() -> u64 {
    30
}
fn default_tool_output_cap() -> usize {
    8_000
}

impl ProxyConfig {
    /// Load config from a TOML file with `PROXY_*` env var overrides.
    ///
    /// Checks in order: explicit path argument, `PROXY_CONFIG` env var,
    /// `~/.proxy/proxy.toml`.
    pub fn load(config_path: Option<&str>) -> crate::error::Result<Self> {
        let path = config_path
            .map(String::from)
            .unwrap_or_else(default_config_path);

        let config: ProxyConfig = Figment::new()
            .merge(Toml::file(&path))
            .merge(Env::prefixed("PROXY_").split("__"))
            .extract()
            .map_err(|e| crate::error::ProxyError::Config(e.to_string()))?;

        Ok(config)
    }
}

fn default_config_path() -> String {
    let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
    format!("{}/.proxy/proxy.toml", home)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_constants() {
        let cfg = ProxyConfig::default();
        assert_eq!(cfg.session.session_max_messages, 20);
        assert_eq!(cfg.pruning.prune_after_messages, 3);
        assert_eq!(cfg.tools.max_tool_iterations, 5);
        assert_eq!(cfg.budget.min_response_tokens, 256);
    }
}
