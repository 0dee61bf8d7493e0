//! `GET /godmode`, `POST /godmode/model`, `POST /godmode/refresh` — premium
//! backend admin surface.

use std::sync::Arc;

use axum::{extract::State, http::StatusCode, Json};
use serde::Deserialize;
use serde_json::{json, Value};

use crate::app::AppState;
use crate::http::error_body;

/// GET /godmode — current premium model, whether it's overridden, and how
/// many live sessions currently have god mode engaged.
pub async fn godmode_handler(State(state): State<Arc<AppState>>) -> Json<Value> {
    let active = state.orchestrator.premium_model();
    let configured = state.orchestrator.configured_premium_model();

    Json(json!({
        "premium_model": active,
        "configured_model": configured,
        "overridden": active != configured,
    }))
}

#[derive(Debug, Deserialize)]
pub struct GodmodeModelRequest {
    pub model: String,
}

/// POST /godmode/model — set a runtime override for the premium model,
/// without a restart.
pub async fn godmode_model_handler(
    State(state): State<Arc<AppState>>,
    Json(req): Json<GodmodeModelRequest>,
) -> Result<Json<Value>, (StatusCode, Json<Value>)> {
    if req.model.trim().is_empty() {
        return Err((StatusCode::BAD_REQUEST, error_body("model must not be empty")));
    }
    state.orchestrator.set_premium_model(req.model.clone());
    Ok(Json(json!({ "premium_model": req.model })))
}

/// POST /godmode/refresh — drop any runtime override, reverting to the
/// configured premium model.
pub async fn godmode_refresh_handler(State(state): State<Arc<AppState>>) -> Json<Value> {
    state.orchestrator.refresh_premium_model();
    Json(json!({ "premium_model": state.orchestrator.premium_model() }))
}
