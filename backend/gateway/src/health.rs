use axum::{extract::State, Json};
use serde_json::{json, Value};

use crate::state::AppState;

/// `GET /health`, unauthenticated.
pub async fn health(State(state): State<AppState>) -> Json<Value> {
    Json(json!({
        "status": "ok",
        "service": "examlens",
        "version": env!("CARGO_PKG_VERSION"),
        "mode": state.mode().to_string(),
    }))
}
