//! `POST /analyze-exam`

use axum::{
    extract::{rejection::JsonRejection, State},
    http::StatusCode,
    Json,
};
use examlens_analyzer::AnalyzeBody;
use examlens_core::{FieldCategory, RelayError};
use serde::Serialize;
use tracing::debug;

use crate::auth::RequireAuth;
use crate::error::ApiError;
use crate::state::AppState;

#[derive(Debug, Serialize)]
pub struct AnalyzeResponse {
    pub success: bool,
    pub text: String,
}

/// Runs the analysis pipeline for the authenticated caller.
///
/// An empty extraction is a success carrying the sentinel text.
pub async fn analyze_exam(
    State(state): State<AppState>,
    RequireAuth(caller): RequireAuth,
    body: Result<Json<AnalyzeBody>, JsonRejection>,
) -> Result<Json<AnalyzeResponse>, ApiError> {
    let Json(body) = body.map_err(|rejection| {
        debug!(error = %rejection, "Unreadable analysis body");
        if rejection.status() == StatusCode::PAYLOAD_TOO_LARGE {
            ApiError::PayloadTooLarge
        } else {
            RelayError::InvalidRequest(vec![FieldCategory::Body]).into()
        }
    })?;

    let extraction = state
        .analyzer
        .analyze(caller, body)
        .await
        .map_err(|e| ApiError::from_relay(e, state.retry_after))?;

    Ok(Json(AnalyzeResponse {
        success: true,
        text: extraction.text().to_string(),
    }))
}
