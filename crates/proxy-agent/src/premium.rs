//! Premium ("god mode") backend adapter.
//!
//! Uses an OpenAI-compatible endpoint's native structured tool-calling:
//! tools are declared as a typed `tools` array and the response carries
//! `tool_calls` with a `call_id`, which the orchestrator threads back through
//! explicit tool-role messages.
//!
//! Wire correlation convention: the orchestrator records a tool-call round
//! trip in the session/scratch history as two `Message`s whose `content` is
//! a small JSON envelope (`{"tool_calls":[...]}` / `{"call_id":...,"text":...}`)
//! rather than free text — see [`render_message`]. This keeps `Message`
//! backend-agnostic while still letting this adapter reconstruct
//! the exact `tool_call_id` pairing the API requires.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use proxy_core::types::{Message, Role, ToolCall, ToolDefinition};

use crate::adapter::{BackendAdapter, GenerateOutcome, GenerateRequest};
use crate::error::AdapterError;

/// Timeout for a single premium-model call.
const PREMIUM_TIMEOUT_S: u64 = 120;

pub struct PremiumAdapter {
    client: reqwest::Client,
    api_key: String,
    endpoint: String,
}

impl PremiumAdapter {
    pub fn new(api_key: impl Into<String>, base_url: &str) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_key: api_key.into(),
            endpoint: format!("{}/v1/chat/completions", base_url.trim_end_matches('/')),
        }
    }
}

/// Marker envelope stored in a `Message.content` to correlate a tool round
/// trip across iterations without widening the shared `Message` type.
#[derive(Debug, Serialize, Deserialize)]
struct ToolCallEnvelope {
    tool_calls: Vec<EnvelopeCall>,
}

#[derive(Debug, Serialize, Deserialize)]
struct EnvelopeCall {
    id: String,
    name: String,
    params: serde_json::Value,
}

#[derive(Debug, Serialize, Deserialize)]
struct ToolResultEnvelope {
    call_id: String,
    text: String,
}

/// Build the assistant-turn `Message` the orchestrator appends to history
/// right after receiving [`GenerateOutcome::ToolCalls`].
pub fn assistant_tool_call_message(calls: &[ToolCall]) -> Message {
    let envelope = ToolCallEnvelope {
        tool_calls: calls
            .iter()
            .enumerate()
            .map(|(i, c)| EnvelopeCall {
                id: c.call_id.clone().unwrap_or_else(|| format!("call_{i}")),
                name: c.tool_name.clone(),
                params: c.params.clone(),
            })
            .collect(),
    };
    Message::new(
        Role::Assistant,
        serde_json::to_string(&envelope).unwrap_or_default(),
        0,
    )
}

/// Build the tool-result `Message` the orchestrator appends after executing
/// one of the calls from [`assistant_tool_call_message`].
pub fn tool_result_message(call_id: &str, text: &str) -> Message {
    let envelope = ToolResultEnvelope {
        call_id: call_id.to_string(),
        text: text.to_string(),
    };
    Message::tool_result(serde_json::to_string(&envelope).unwrap_or_default(), 0)
}

#[async_trait]
impl BackendAdapter for PremiumAdapter {
    fn name(&self) -> &str {
        "premium"
    }

    async fn generate(&self, req: &GenerateRequest<'_>) -> Result<GenerateOutcome, AdapterError> {
        let mut messages = vec![serde_json::json!({
            "role": "system",
            "content": req.system_prompt,
        })];
        messages.extend(req.history.iter().map(render_message));

        let mut body = serde_json::json!({
            "model": req.model,
            "messages": messages,
            "max_tokens": req.max_output,
            "temperature": req.temperature,
            "stream": false,
        });

        if !req.tools.is_empty() {
            body["tools"] = serde_json::json!(req
                .tools
                .iter()
                .map(tool_to_function_schema)
                .collect::<Vec<_>>());
        }

        debug!(model = req.model, tools = req.tools.len(), "premium adapter: sending request");

        let resp = tokio::time::timeout(
            Duration::from_secs(PREMIUM_TIMEOUT_S),
            self.client
                .post(&self.endpoint)
                .bearer_auth(&self.api_key)
                .json(&body)
                .send(),
        )
        .await
        .map_err(|_| AdapterError::Timeout {
            secs: PREMIUM_TIMEOUT_S,
        })??;

        let status = resp.status().as_u16();
        if status == 429 {
            return Err(AdapterError::Api {
                status,
                message: "rate limited".to_string(),
            });
        }
        if !resp.status().is_success() {
            let text = resp.text().await.unwrap_or_default();
            warn!(status, body = %text, "premium adapter: backend error");
            return Err(AdapterError::Api {
                status,
                message: text,
            });
        }

        let parsed: ChatCompletionResponse = resp
            .json()
            .await
            .map_err(|e| AdapterError::Parse(e.to_string()))?;

        let Some(choice) = parsed.choices.into_iter().next() else {
            return Ok(GenerateOutcome::Final(String::new()));
        };

        if let Some(tool_calls) = choice.message.tool_calls {
            let calls = tool_calls
                .into_iter()
                .map(|tc| ToolCall {
                    tool_name: tc.function.name,
                    params: serde_json::from_str(&tc.function.arguments).unwrap_or_default(),
                    call_id: Some(tc.id),
                })
                .collect();
            return Ok(GenerateOutcome::ToolCalls(calls));
        }

        Ok(GenerateOutcome::Final(choice.message.content.unwrap_or_default()))
    }
}

fn tool_to_function_schema(t: &ToolDefinition) -> serde_json::Value {
    let properties: serde_json::Map<String, serde_json::Value> = t
        .parameters
        .iter()
        .map(|(name, desc)| {
            (
                name.clone(),
                serde_json::json!({ "type": "string", "description": desc }),
            )
        })
        .collect();
    serde_json::json!({
        "type": "function",
        "function": {
            "name": t.name,
            "description": t.description,
            "parameters": {
                "type": "object",
                "properties": properties,
                "required": t.parameters.keys().collect::<Vec<_>>(),
            }
        }
    })
}

fn render_message(m: &Message) -> serde_json::Value {
    if m.role == Role::Assistant {
        if let Ok(envelope) = serde_json::from_str::<ToolCallEnvelope>(&m.content) {
            let tool_calls: Vec<_> = envelope
                .tool_calls
                .iter()
                .map(|c| {
                    serde_json::json!({
                        "id": c.id,
                        "type": "function",
                        "function": {
                            "name": c.name,
                            "arguments": serde_json::to_string(&c.params).unwrap_or_default(),
                        }
                    })
                })
                .collect();
            return serde_json::json!({
                "role": "assistant",
                "content": serde_json::Value::Null,
                "tool_calls": tool_calls,
            });
        }
    }

    if m.role == Role::Tool {
        if let Ok(envelope) = serde_json::from_str::<ToolResultEnvelope>(&m.content) {
            return serde_json::json!({
                "role": "tool",
                "tool_call_id": envelope.call_id,
                "content": envelope.text,
            });
        }
        // Not a structured round trip (e.g. carried over from a local-mode
        // turn) — fall back to a plain user-visible line.
        return serde_json::json!({
            "role": "user",
            "content": format!("[tool result]\n{}", m.content),
        });
    }

    let role = match m.role {
        Role::System => "system",
        Role::User => "user",
        Role::Assistant => "assistant",
        Role::Tool => unreachable!(),
    };
    serde_json::json!({ "role": role, "content": m.content })
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
    content: Option<String>,
    #[serde(default)]
    tool_calls: Option<Vec<ApiToolCall>>,
}

#[derive(Debug, Deserialize)]
struct ApiToolCall {
    id: String,
    function: ApiFunction,
}

#[derive(Debug, Deserialize)]
struct ApiFunction {
    name: String,
    arguments: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn assistant_tool_call_message_round_trips_through_render() {
        let calls = vec![ToolCall {
            tool_name: "task.create".to_string(),
            params: serde_json::json!({"title": "buy milk"}),
            call_id: Some("call_1".to_string()),
        }];
        let msg = assistant_tool_call_message(&calls);
        let rendered = render_message(&msg);
        assert_eq!(rendered["tool_calls"][0]["function"]["name"], "task.create");
    }

    #[test]
    fn tool_result_message_round_trips_through_render() {
        let msg = tool_result_message("call_1", "done");
        let rendered = render_message(&msg);
        assert_eq!(rendered["role"], "tool");
        assert_eq!(rendered["tool_call_id"], "call_1");
        assert_eq!(rendered["content"], "done");
    }

    #[test]
    fn plain_tool_message_falls_back_to_user_role() {
        let msg = Message::tool_result("some legacy text".to_string(), 0);
        let rendered = render_message(&msg);
        assert_eq!(rendered["role"], "user");
    }
}
