//! Backend Adapters.
//!
//! Two concrete LLM backends differ in tool-call wire shape: the local
//! backend relies on a free-text `<tool>{json}</tool>` convention embedded in
//! the system prompt, the premium backend uses the provider's native
//! structured tool-calling. Spec §9 models both as one capability set so the
//! orchestrator never special-cases either — `generate` is that seam.

use async_trait::async_trait;

use proxy_core::types::{Message, ToolCall, ToolDefinition};

pub use crate::error::AdapterError;

/// Everything a single `generate` call needs. Borrowed, not owned — the
/// orchestrator keeps the turn's scratch state.
pub struct GenerateRequest<'a> {
    pub system_prompt: &'a str,
    /// Full message history for this turn, oldest first, including any
    /// tool-call/tool-result messages appended by earlier ReAct iterations.
    pub history: &'a [Message],
    /// Tool manifest to expose. Empty means tools are disabled for this call
    ///.
    pub tools: &'a [ToolDefinition],
    pub model: &'a str,
    pub max_output: u32,
    pub temperature: f32,
}

/// What a `generate` call produced.
#[derive(Debug, Clone)]
pub enum GenerateOutcome {
    /// A final assistant reply — the ReAct loop stops.
    Final(String),
    /// The model wants to invoke one or more tools before continuing.
    ToolCalls(Vec<ToolCall>),
}

/// Common interface for the local and premium LLM backends.
#[async_trait]
pub trait BackendAdapter: Send + Sync {
    /// Name used in logs and `animara_stats.model`.
    fn name(&self) -> &str;

    async fn generate(&self, req: &GenerateRequest<'_>) -> Result<GenerateOutcome, AdapterError>;
}
