//! Local backend adapter.
//!
//! Posts to an OpenAI-compatible `/v1/chat/completions` endpoint. Tools are advertised as
//! text inside the system prompt using a `<tool>{json}</tool>` convention —
//! there is no native function-calling parameter in the request body. The
//! adapter also toggles a boolean "thinking" instruction from cues in the
//! user's turn and strips `<think>` spans from the visible reply.

use std::sync::LazyLock;
use std::time::Duration;

use async_trait::async_trait;
use regex::Regex;
use serde::Deserialize;
use tracing::{debug, warn};

use proxy_core::types::{Message, Role, ToolCall, ToolDefinition};

use crate::adapter::{BackendAdapter, GenerateOutcome, GenerateRequest};
use crate::error::AdapterError;
use crate::thinking;

/// Timeout for a single local-model call.
const LOCAL_TIMEOUT_S: u64 = 120;

static TOOL_CALL_TAG: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)<tool>\s*(\{.*?\})\s*</tool>").unwrap());

pub struct LocalAdapter {
    client: reqwest::Client,
    endpoint: String,
}

impl LocalAdapter {
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            endpoint: endpoint.into(),
        }
    }

    fn render_tools_block(tools: &[ToolDefinition]) -> String {
        if tools.is_empty() {
            return String::new();
        }
        let mut out = String::from(
            "\n\nYou may call at most one tool per turn. To do so, emit exactly one block of \
             the form `<tool>{\"name\": \"<tool name>\", \"params\": {...}}</tool>` and nothing \
             else. Never fabricate a tool call for a tool that is not listed below. Available \
             tools:\n",
        );
        for t in tools {
            out.push_str(&format!("- {}: {}\n", t.name, t.description));
            for (param, desc) in &t.parameters {
                out.push_str(&format!("    - {param}: {desc}\n"));
            }
        }
        out
    }
}

#[async_trait]
impl BackendAdapter for LocalAdapter {
    fn name(&self) -> &str {
        "local"
    }

    async fn generate(&self, req: &GenerateRequest<'_>) -> Result<GenerateOutcome, AdapterError> {
        let last_user = req
            .history
            .iter()
            .rev()
            .find(|m| m.role == Role::User)
            .map(|m| m.content.as_str())
            .unwrap_or("");
        let thinking_on = thinking::needs_thinking(last_user);

        let mut system = req.system_prompt.to_string();
        system.push_str(&Self::render_tools_block(req.tools));
        if thinking_on {
            system.push_str(
                "\n\nThink the problem through step by step inside a single \
                 <think>...</think> block first, then give your final answer outside it.",
            );
        }

        let mut messages = vec![serde_json::json!({ "role": "system", "content": system })];
        messages.extend(req.history.iter().map(render_message));

        let body = serde_json::json!({
            "model": req.model,
            "messages": messages,
            "max_tokens": req.max_output,
            "temperature": req.temperature,
            "stream": false,
        });

        debug!(model = req.model, thinking_on, "local adapter: sending request");

        let resp = tokio::time::timeout(
            Duration::from_secs(LOCAL_TIMEOUT_S),
            self.client.post(&self.endpoint).json(&body).send(),
        )
        .await
        .map_err(|_| AdapterError::Timeout {
            secs: LOCAL_TIMEOUT_S,
        })??;

        let status = resp.status().as_u16();
        if !resp.status().is_success() {
            let text = resp.text().await.unwrap_or_default();
            warn!(status, body = %text, "local adapter: backend error");
            return Err(AdapterError::Api {
                status,
                message: text,
            });
        }

        let parsed: ChatCompletionResponse = resp
            .json()
            .await
            .map_err(|e| AdapterError::Parse(e.to_string()))?;

        let raw = parsed
            .choices
            .into_iter()
            .next()
            .map(|c| c.message.content)
            .unwrap_or_default();

        if let Some(captures) = TOOL_CALL_TAG.captures(&raw) {
            let json_text = &captures[1];
            match serde_json::from_str::<ToolCallConvention>(json_text) {
                Ok(call) => {
                    return Ok(GenerateOutcome::ToolCalls(vec![ToolCall {
                        tool_name: call.name,
                        params: call.params,
                        call_id: None,
                    }]));
                }
                Err(e) => {
                    warn!(error = %e, json = json_text, "local adapter: malformed <tool> block, treating as final text");
                }
            }
        }

        Ok(GenerateOutcome::Final(thinking::strip_think(&raw)))
    }
}

fn render_message(m: &Message) -> serde_json::Value {
    let role = match m.role {
        Role::System => "system",
        Role::User => "user",
        Role::Assistant => "assistant",
        // The local adapter has no native tool role; a tool result is just
        // another user-visible line the model reads as context.
        Role::Tool => "user",
    };
    let content = if m.is_tool_result {
        format!("[tool result]\n{}", m.content)
    } else {
        m.content.clone()
    };
    serde_json::json!({ "role": role, "content": content })
}

#[derive(Debug, Deserialize)]
struct ToolCallConvention {
    name: String,
    #[serde(default)]
    params: serde_json::Value,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    choices: Vec<ChatCompletionChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionChoice {
    message: ChatCompletionMessage,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionMessage {
    #[serde(default)]
    content: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn render_tools_block_is_empty_when_no_tools() {
        assert_eq!(LocalAdapter::render_tools_block(&[]), "");
    }

    #[test]
    fn render_tools_block_lists_names_and_params() {
        let mut params = std::collections::BTreeMap::new();
        params.insert("title".to_string(), "task title".to_string());
        let tools = vec![ToolDefinition {
            name: "task.create".to_string(),
            description: "create a task".to_string(),
            parameters: params,
        }];
        let block = LocalAdapter::render_tools_block(&tools);
        assert!(block.contains("task.create"));
        assert!(block.contains("title"));
    }

    #[test]
    fn tool_call_tag_extracts_json() {
        let text = r#"noise <tool>{"name": "time", "params": {}}</tool> trailing"#;
        let caps = TOOL_CALL_TAG.captures(text).unwrap();
        let call: ToolCallConvention = serde_json::from_str(&caps[1]).unwrap();
        assert_eq!(call.name, "time");
    }
}
