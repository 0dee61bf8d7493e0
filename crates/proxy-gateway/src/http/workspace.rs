//! `GET /workspace`, `POST /workspace/write`.

use std::sync::Arc;

use axum::{extract::State, http::StatusCode, Json};
use serde::Deserialize;
use serde_json::{json, Value};

use crate::app::AppState;
use crate::http::error_body;

/// Preview length for `GET /workspace` — enough to eyeball freshness without
/// echoing the whole persona/memory context back over HTTP.
const PREVIEW_CHARS: usize = 500;

/// GET /workspace — `{chars, tokens, preview}`.
pub async fn workspace_handler(State(state): State<Arc<AppState>>) -> Json<Value> {
    let context = state.workspace.get_context().await;
    let preview: String = context.chars().take(PREVIEW_CHARS).collect();

    Json(json!({
        "chars": context.chars().count(),
        "tokens": proxy_budget::tokens(&context),
        "preview": preview,
    }))
}

#[derive(Debug, Deserialize)]
pub struct WorkspaceWriteRequest {
    pub content: String,
}

/// POST /workspace/write — appends `{content}` to today's memory file.
pub async fn workspace_write_handler(
    State(state): State<Arc<AppState>>,
    Json(req): Json<WorkspaceWriteRequest>,
) -> Result<Json<Value>, (StatusCode, Json<Value>)> {
    if req.content.trim().is_empty() {
        return Err((StatusCode::BAD_REQUEST, error_body("content must not be empty")));
    }

    state
        .workspace
        .write_memory(&req.content, "Manual Write")
        .await
        .map_err(|e| {
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                error_body(format!("workspace write failed: {e}")),
            )
        })?;

    Ok(Json(json!({ "ok": true })))
}
