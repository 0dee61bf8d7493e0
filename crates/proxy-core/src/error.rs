use thiserror::Error;

/// Error kinds shared across the proxy workspace. Individual subsystems
/// (adapters, tools, retriever) wrap their own errors into these kinds rather
/// than inventing parallel taxonomies — see each crate's own error enum for
/// finer-grained variants that convert into these.
#[derive(Debug, Error)]
pub enum ProxyError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Backend HTTP error: {status} {message}")]
    BackendHttp { status: u16, message: String },

    #[error("Backend timeout after {ms}ms")]
    BackendTimeout { ms: u64 },

    #[error("Both backend adapters exhausted: {0}")]
    BackendExhausted(String),

    #[error("Tool not found: {0}")]
    ToolNotFound(String),

    #[error("Tool timeout: {0}")]
    ToolTimeout(String),

    #[error("Tool failure: {0}")]
    ToolFailure(String),

    #[error("MCP server init failed: {0}")]
    McpInitFailed(String),

    #[error("Memory flush failed: {0}")]
    FlushFailure(String),

    #[error("Fact extraction failed: {0}")]
    FactExtractFailure(String),

    #[error("Malformed request: {0}")]
    MalformedRequest(String),

    #[error("Not initialized")]
    NotInitialized,

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl ProxyError {
    /// Short machine-readable error code, used in HTTP error bodies.
    pub fn code(&self) -> &'static str {
        match self {
            ProxyError::Config(_) => "CONFIG_ERROR",
            ProxyError::BackendHttp { .. } => "BACKEND_HTTP",
            ProxyError::BackendTimeout { .. } => "BACKEND_TIMEOUT",
            ProxyError::BackendExhausted(_) => "BACKEND_EXHAUSTED",
            ProxyError::ToolNotFound(_) => "TOOL_NOT_FOUND",
            ProxyError::ToolTimeout(_) => "TOOL_TIMEOUT",
            ProxyError::ToolFailure(_) => "TOOL_FAILURE",
            ProxyError::McpInitFailed(_) => "MCP_INIT_FAILED",
            ProxyError::FlushFailure(_) => "FLUSH_FAILURE",
            ProxyError::FactExtractFailure(_) => "FACT_EXTRACT_FAILURE",
            ProxyError::MalformedRequest(_) => "MALFORMED_REQUEST",
            ProxyError::NotInitialized => "NOT_INITIALIZED",
            ProxyError::Serialization(_) => "SERIALIZATION_ERROR",
            ProxyError::Io(_) => "IO_ERROR",
            ProxyError::Internal(_) => "INTERNAL_ERROR",
        }
    }

    /// HTTP status this error kind maps to on the gateway surface.
    pub fn status(&self) -> u16 {
        match self {
            ProxyError::MalformedRequest(_) => 400,
            ProxyError::NotInitialized => 503,
            _ => 500,
        }
    }
}

pub type Result<T> = std::result::Result<T, ProxyError>;
