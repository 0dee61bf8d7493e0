//! `POST /bm25/rebuild`, `GET /search`.

use std::sync::Arc;

use axum::{extract::State, http::StatusCode, Json};
use serde::Deserialize;
use serde_json::{json, Value};

use crate::app::AppState;
use crate::http::error_body;

/// POST /bm25/rebuild — rebuild the lexical index from the vector store's
/// current snapshot.
pub async fn bm25_rebuild_handler(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Value>, (StatusCode, Json<Value>)> {
    match state.retriever.rebuild_lexical().await {
        Ok(docs) => Ok(Json(json!({ "rebuilt": true, "docs": docs }))),
        Err(e) => Err((
            StatusCode::INTERNAL_SERVER_ERROR,
            error_body(format!("lexical rebuild failed: {e}")),
        )),
    }
}

#[derive(Debug, Deserialize)]
pub struct SearchQuery {
    pub q: String,
    #[serde(default)]
    pub person_id: Option<String>,
}

/// GET /search?q=…&person_id=… — top-K fused retrieval contents.
pub async fn search_handler(
    State(state): State<Arc<AppState>>,
    axum::extract::Query(query): axum::extract::Query<SearchQuery>,
) -> Result<Json<Value>, (StatusCode, Json<Value>)> {
    if query.q.trim().is_empty() {
        return Err((StatusCode::BAD_REQUEST, error_body("q must not be empty")));
    }
    let caller_id = query
        .person_id
        .unwrap_or_else(|| state.config.identity.default_caller_id.clone());

    match state
        .retriever
        .search(&query.q, &caller_id, state.config.retrieval.search_top_k)
        .await
    {
        Ok(results) => Ok(Json(json!({ "results": results }))),
        Err(e) => Err((
            StatusCode::INTERNAL_SERVER_ERROR,
            error_body(format!("search failed: {e}")),
        )),
    }
}
