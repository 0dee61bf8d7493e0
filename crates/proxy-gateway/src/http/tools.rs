//! `GET /tools`, `POST /tools/{name}`.

use std::sync::Arc;

use axum::{
    extract::{Path, State},
    Json,
};
use serde_json::{json, Value};

use crate::app::AppState;

/// GET /tools — `{tools: [name]}`.
pub async fn tools_handler(State(state): State<Arc<AppState>>) -> Json<Value> {
    Json(json!({ "tools": state.tools.names() }))
}

/// POST /tools/{name} — `{params}`; direct tool invocation, bypassing the
/// agent loop. Returns `{result}` even on failure — the registry never
/// propagates an error, it turns every failure mode into result text.
pub async fn tool_invoke_handler(
    State(state): State<Arc<AppState>>,
    Path(name): Path<String>,
    Json(params): Json<Value>,
) -> Json<Value> {
    let outcome = state.tools.execute(&name, params).await;
    Json(json!({ "result": outcome.text, "truncated": outcome.truncated }))
}
