//! `GET /health` — liveness probe, session/tool/index counters.

use std::sync::Arc;

use axum::{extract::State, Json};
use serde_json::{json, Value};

use crate::app::AppState;

pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// GET /health
pub async fn health_handler(State(state): State<Arc<AppState>>) -> Json<Value> {
    let mcp = state.tools.mcp_health();
    let routes = state.classifier.counters();

    Json(json!({
        "status": "ok",
        "version": VERSION,
        "features": {
            "god_mode": true,
            "hybrid_retrieval": true,
            "tool_loop": true,
        },
        "tools": state.tools.names(),
        "active_sessions": state.sessions.active_session_count(),
        "bm25_docs": state.retriever.lexical().doc_count(),
        "mcp": {
            "healthy_servers": mcp.healthy,
            "failed_servers": mcp.failed,
            "agent_available": mcp.total == 0 || mcp.healthy > 0,
        },
        "route_counters": {
            "direct": routes.direct,
            "agent": routes.agent,
            "total": routes.total,
        },
    }))
}
