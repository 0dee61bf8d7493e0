//! `GET /v1/models` — proxies the local LLM's own model list.

use std::sync::Arc;

use axum::{extract::State, http::StatusCode, Json};
use serde_json::Value;
use tracing::warn;

use crate::app::AppState;
use crate::http::error_body;

/// Local backends speak the OpenAI `/v1/chat/completions` convention; their
/// model-listing endpoint lives at the sibling `/v1/models` path on the same
/// host. `endpoint` is the full chat-completions URL, so this derives the
/// sibling by replacing the tail segment.
fn models_url(chat_endpoint: &str) -> String {
    if let Some(base) = chat_endpoint.strip_suffix("/chat/completions") {
        format!("{base}/models")
    } else if let Some(base) = chat_endpoint.strip_suffix("/completions") {
        format!("{base}/models")
    } else {
        format!("{}/models", chat_endpoint.trim_end_matches('/'))
    }
}

/// GET /v1/models
pub async fn models_handler(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Value>, (StatusCode, Json<Value>)> {
    let url = models_url(&state.config.local_llm.endpoint);
    let client = reqwest::Client::new();

    let resp = client
        .get(&url)
        .timeout(std::time::Duration::from_secs(5))
        .send()
        .await
        .map_err(|e| {
            warn!(error = %e, url, "failed to reach local LLM for model listing");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                error_body(format!("local LLM unreachable: {e}")),
            )
        })?;

    if !resp.status().is_success() {
        let status = resp.status();
        return Err((
            StatusCode::INTERNAL_SERVER_ERROR,
            error_body(format!("local LLM returned {status}")),
        ));
    }

    let body: Value = resp.json().await.map_err(|e| {
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            error_body(format!("local LLM model list was not valid JSON: {e}")),
        )
    })?;

    Ok(Json(body))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn derives_sibling_models_url_from_chat_completions_endpoint() {
        assert_eq!(
            models_url("http://127.0.0.1:8010/v1/chat/completions"),
            "http://127.0.0.1:8010/v1/models"
        );
    }

    #[test]
    fn falls_back_to_appending_models_when_shape_is_unrecognized() {
        assert_eq!(models_url("http://127.0.0.1:8010"), "http://127.0.0.1:8010/models");
    }
}
