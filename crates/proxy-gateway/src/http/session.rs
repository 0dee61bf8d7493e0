//! `/session/{caller_id}` family — stats, forced finalize, forced flush
//!.

use std::sync::Arc;

use axum::{
    extract::{Path, State},
    Json,
};
use serde_json::{json, Value};

use crate::app::AppState;

/// GET /session/{caller_id} — session stats + extracted facts.
pub async fn session_handler(State(state): State<Arc<AppState>>, Path(caller_id): Path<String>) -> Json<Value> {
    let stats = state.sessions.stats(&caller_id);
    let facts = match state.retriever.caller_facts(&caller_id, 50).await {
        Ok(facts) => facts,
        Err(e) => {
            tracing::warn!(error = %e, caller_id, "failed to list caller facts");
            Vec::new()
        }
    };

    Json(json!({
        "id": stats.id,
        "messages": stats.messages,
        "total_tokens": stats.total_tokens,
        "tool_calls": stats.tool_calls,
        "god_mode": stats.god_mode,
        "flush_counter": stats.flush_counter,
        "facts": facts,
    }))
}

/// POST /session/{caller_id}/end — finalize the session (may trigger a
/// summary flush first), then drop it from the live map entirely.
pub async fn session_end_handler(State(state): State<Arc<AppState>>, Path(caller_id): Path<String>) -> Json<Value> {
    let flushed = state.orchestrator.force_flush(&caller_id).await;
    let existed = state.sessions.remove(&caller_id);

    Json(json!({
        "finalized": existed,
        "flush_done": flushed,
    }))
}

/// POST /session/{caller_id}/flush — force a flush regardless of the token
/// threshold.
pub async fn session_flush_handler(State(state): State<Arc<AppState>>, Path(caller_id): Path<String>) -> Json<Value> {
    let flush_done = state.orchestrator.force_flush(&caller_id).await;
    Json(json!({ "flush_done": flush_done }))
}
