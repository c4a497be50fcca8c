//! Stored session history routes.

use axum::{
    extract::{Path, Query, State},
    response::Json,
    routing::get,
    Router,
};
use serde::Deserialize;

use crate::api::error::{ApiError, ApiResult};
use crate::db::{SqliteSessionStore, StoredSession};

const MAX_LIMIT: usize = 500;

#[derive(Clone)]
pub struct HistoryState {
    pub store: SqliteSessionStore,
}

/// Query parameters for listing sessions.
#[derive(Debug, Deserialize, Default)]
pub struct HistoryQueryParams {
    /// Only sessions for this subject
    pub subject: Option<String>,
    /// Maximum results (default: all)
    pub limit: Option<usize>,
}

pub fn router(state: HistoryState) -> Router {
    Router::new()
        .route("/api/sessions", get(list_sessions))
        .route("/api/sessions/:id", get(get_session))
        .with_state(state)
}

/// GET /api/sessions - Stored sessions, newest first.
async fn list_sessions(
    State(state): State<HistoryState>,
    Query(params): Query<HistoryQueryParams>,
) -> ApiResult<Json<Vec<StoredSession>>> {
    let limit = params.limit.map(|limit| limit.min(MAX_LIMIT));
    let subject = params.subject.filter(|s| !s.trim().is_empty());

    let sessions = state.store.list(limit, subject).await?;
    Ok(Json(sessions))
}

/// GET /api/sessions/:id - A single stored session.
async fn get_session(
    State(state): State<HistoryState>,
    Path(id): Path<i64>,
) -> ApiResult<Json<StoredSession>> {
    let session = state
        .store
        .get(id)
        .await?
        .ok_or_else(|| ApiError::not_found(format!("Session {} not found", id)))?;

    Ok(Json(session))
}
