//! Read-only views of recorded state.

use axum::{
    extract::{Path, Query, State},
    Json,
};
use examlens_core::{ExamRecord, SessionRecord};
use serde::{Deserialize, Serialize};
use tracing::error;

use crate::auth::RequireAuth;
use crate::error::ApiError;
use crate::state::{AppState, Lookups};

const DEFAULT_EXAM_LIMIT: usize = 50;
const MAX_EXAM_LIMIT: usize = 200;

/// `GET /sessions/:id`: only the caller's own sessions are visible.
pub async fn get_session(
    State(state): State<AppState>,
    RequireAuth(caller): RequireAuth,
    Path(session_id): Path<String>,
) -> Result<Json<SessionRecord>, ApiError> {
    let Lookups::Sessions(store) = &state.lookups else {
        return Err(ApiError::NotFound);
    };
    match store.get(&caller.subject, &session_id).await {
        Ok(Some(record)) => Ok(Json(record)),
        Ok(None) => Err(ApiError::NotFound),
        Err(e) => {
            error!(session_id = %session_id, error = %e, "Failed to read session");
            Err(ApiError::Internal)
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct ExamsQuery {
    pub limit: Option<usize>,
}

#[derive(Debug, Serialize)]
pub struct ExamsResponse {
    pub exams: Vec<ExamRecord>,
}

/// `GET /exams`: the caller's own history, newest first.
pub async fn list_exams(
    State(state): State<AppState>,
    RequireAuth(caller): RequireAuth,
    Query(query): Query<ExamsQuery>,
) -> Result<Json<ExamsResponse>, ApiError> {
    let Lookups::Exams(log) = &state.lookups else {
        return Err(ApiError::NotFound);
    };
    let limit = query.limit.unwrap_or(DEFAULT_EXAM_LIMIT).clamp(1, MAX_EXAM_LIMIT);
    match log.list(&caller.subject, limit).await {
        Ok(exams) => Ok(Json(ExamsResponse { exams })),
        Err(e) => {
            error!(subject = %caller.subject, error = %e, "Failed to list exams");
            Err(ApiError::Internal)
        }
    }
}
