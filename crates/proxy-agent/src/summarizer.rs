//! Wraps a [`BackendAdapter`] as the [`proxy_memory::Summarizer`] the memory
//! flush path needs, without pulling the orchestrator into `proxy-memory`'s
//! dependency graph.

use std::sync::Arc;

use async_trait::async_trait;

use proxy_core::types::{Message, Role};
use proxy_memory::Summarizer;

use crate::adapter::{BackendAdapter, GenerateOutcome, GenerateRequest};

/// Low temperature and a tight output cap — a flush summary is meant to be
/// a handful of terse bullet points, not prose.
const FLUSH_MAX_OUTPUT: u32 = 400;
const FLUSH_TEMPERATURE: f32 = 0.2;

pub struct AdapterSummarizer {
    adapter: Arc<dyn BackendAdapter>,
    model: String,
}

impl AdapterSummarizer {
    pub fn new(adapter: Arc<dyn BackendAdapter>, model: impl Into<String>) -> Self {
        Self {
            adapter,
            model: model.into(),
        }
    }
}

#[async_trait]
impl Summarizer for AdapterSummarizer {
    async fn summarize(&self, transcript: &str) -> Result<String, String> {
        let history = vec![Message::new(Role::User, transcript, 0)];
        let req = GenerateRequest {
            system_prompt: proxy_memory::flush::FLUSH_PROMPT,
            history: &history,
            tools: &[],
            model: &self.model,
            max_output: FLUSH_MAX_OUTPUT,
            temperature: FLUSH_TEMPERATURE,
        };

        match self.adapter.generate(&req).await {
            Ok(GenerateOutcome::Final(text)) => Ok(text),
            Ok(GenerateOutcome::ToolCalls(_)) => Ok(String::new()),
            Err(e) => Err(e.to_string()),
        }
    }
}
