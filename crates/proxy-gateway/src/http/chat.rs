//! `POST /v1/chat/completions` — the OpenAI-compatible chat endpoint that
//! fronts the whole turn pipeline.

use std::sync::Arc;

use axum::{extract::State, http::StatusCode, Json};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::app::AppState;
use crate::http::{error_body, session_envelope};

#[derive(Debug, Deserialize)]
pub struct ChatMessage {
    #[allow(dead_code)]
    pub role: String,
    pub content: String,
}

#[derive(Debug, Deserialize)]
pub struct ChatCompletionsRequest {
    #[serde(default)]
    pub model: Option<String>,
    pub messages: Vec<ChatMessage>,
    #[serde(default)]
    pub person_id: Option<String>,
    #[serde(default)]
    pub extra_body: Option<ExtraBody>,
    #[serde(default = "default_true")]
    #[allow(dead_code)]
    pub enable_tools: bool,
    #[serde(default = "default_temperature")]
    #[allow(dead_code)]
    pub temperature: f32,
    #[serde(default = "default_max_tokens")]
    #[allow(dead_code)]
    pub max_tokens: u32,
    #[serde(default = "default_true")]
    pub show_stats: bool,
}

#[derive(Debug, Deserialize)]
pub struct ExtraBody {
    #[serde(default)]
    pub person_id: Option<String>,
}

fn default_true() -> bool {
    true
}
fn default_temperature() -> f32 {
    0.7
}
fn default_max_tokens() -> u32 {
    2000
}

impl ChatCompletionsRequest {
    /// `caller_id` resolution order: top-level `person_id`, then
    /// `extra_body.person_id`, then the configured default caller.
    fn caller_id(&self, default_caller_id: &str) -> String {
        self.person_id
            .clone()
            .or_else(|| self.extra_body.as_ref().and_then(|b| b.person_id.clone()))
            .unwrap_or_else(|| default_caller_id.to_string())
    }

    fn last_user_content(&self) -> Option<&str> {
        self.messages
            .iter()
            .rev()
            .find(|m| m.role == "user")
            .map(|m| m.content.as_str())
    }
}

#[derive(Debug, Serialize)]
struct ChoiceMessage {
    role: &'static str,
    content: String,
}

#[derive(Debug, Serialize)]
struct Choice {
    index: u32,
    message: ChoiceMessage,
}

pub async fn chat_completions(
    State(state): State<Arc<AppState>>,
    Json(req): Json<ChatCompletionsRequest>,
) -> Result<Json<Value>, (StatusCode, Json<Value>)> {
    if req.messages.is_empty() {
        return Err((StatusCode::BAD_REQUEST, error_body("messages must not be empty")));
    }
    let Some(content) = req.last_user_content() else {
        return Err((StatusCode::BAD_REQUEST, error_body("no user message found")));
    };
    if content.trim().is_empty() {
        return Err((StatusCode::BAD_REQUEST, error_body("user message must not be empty")));
    }

    let caller_id = req.caller_id(&state.config.identity.default_caller_id);
    let result = state.orchestrator.handle_turn(&caller_id, content).await;

    let mut body = json!({
        "choices": [Choice {
            index: 0,
            message: ChoiceMessage {
                role: "assistant",
                content: result.content,
            },
        }],
    });

    if req.show_stats {
        let mut stats = json!({
            "session": session_envelope(&state, &caller_id, result.flush_done),
            "model": result.model,
        });
        if !result.tools_used.is_empty() {
            stats["tools_used"] = json!(result.tools_used);
        }
        body["animara_stats"] = stats;
    }

    Ok(Json(body))
}
