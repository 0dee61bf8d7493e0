use std::sync::Arc;

use axum::{
    routing::{get, post},
    Router,
};

use proxy_agent::Orchestrator;
use proxy_classifier::Classifier;
use proxy_core::config::ProxyConfig;
use proxy_retriever::HybridRetriever;
use proxy_sessions::SessionManager;
use proxy_tools::ToolRegistry;
use proxy_workspace::WorkspaceLoader;

/// Central shared state, passed as `Arc<AppState>` to every Axum handler.
///
/// The orchestrator owns the actual turn-processing pipeline; everything
/// else here is what the HTTP surface needs directly (session stats,
/// workspace reads, tool introspection, lexical rebuild) without reaching
/// back through the orchestrator's private fields.
pub struct AppState {
    pub config: ProxyConfig,
    pub orchestrator: Arc<Orchestrator>,
    pub sessions: Arc<SessionManager>,
    pub workspace: Arc<WorkspaceLoader>,
    pub retriever: Arc<HybridRetriever>,
    pub classifier: Arc<Classifier>,
    pub tools: Arc<ToolRegistry>,
}

/// Assemble the full Axum router.
pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route(
            "/v1/chat/completions",
            post(crate::http::chat::chat_completions),
        )
        .route("/health", get(crate::http::health::health_handler))
        .route("/v1/models", get(crate::http::models::models_handler))
        .route(
            "/session/{caller_id}",
            get(crate::http::session::session_handler),
        )
        .route(
            "/session/{caller_id}/end",
            post(crate::http::session::session_end_handler),
        )
        .route(
            "/session/{caller_id}/flush",
            post(crate::http::session::session_flush_handler),
        )
        .route("/workspace", get(crate::http::workspace::workspace_handler))
        .route(
            "/workspace/write",
            post(crate::http::workspace::workspace_write_handler),
        )
        .route("/tools", get(crate::http::tools::tools_handler))
        .route(
            "/tools/{name}",
            post(crate::http::tools::tool_invoke_handler),
        )
        .route(
            "/bm25/rebuild",
            post(crate::http::search::bm25_rebuild_handler),
        )
        .route("/search", get(crate::http::search::search_handler))
        .route("/godmode", get(crate::http::godmode::godmode_handler))
        .route(
            "/godmode/model",
            post(crate::http::godmode::godmode_model_handler),
        )
        .route(
            "/godmode/refresh",
            post(crate::http::godmode::godmode_refresh_handler),
        )
        .with_state(state)
        .layer(tower_http::trace::TraceLayer::new_for_http())
}
