//! HTTP surface: chat-completions, session, workspace, tool,
//! search, and godmode-admin endpoints, wired onto [`crate::app::AppState`]
//! in [`crate::app::build_router`].

pub mod chat;
pub mod godmode;
pub mod health;
pub mod models;
pub mod search;
pub mod session;
pub mod tools;
pub mod workspace;

use axum::Json;
use serde_json::{json, Value};
use std::sync::Arc;

use crate::app::AppState;

/// Shared `animara_stats.session` envelope: session bookkeeping
/// plus whatever this call actually did (`flush_done`, `tools_used`).
pub(crate) fn session_envelope(state: &Arc<AppState>, caller_id: &str, flush_done: bool) -> Value {
    let stats = state.sessions.stats(caller_id);
    let needs_flush = state.sessions.needs_flush(caller_id);
    json!({
        "id": stats.id,
        "messages": stats.messages,
        "total_tokens": stats.total_tokens,
        "flush_threshold": state.config.budget.flush_threshold,
        "needs_flush": needs_flush,
        "flush_done": flush_done,
        "tool_calls": stats.tool_calls,
        "god_mode": stats.god_mode,
    })
}

pub(crate) fn error_body(message: impl Into<String>) -> Json<Value> {
    Json(json!({ "error": message.into() }))
}
