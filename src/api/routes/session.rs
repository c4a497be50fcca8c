//! Session control endpoints.
//!
//! Provides HTTP endpoints for:
//! - Starting a session (POST /api/start-session)
//! - Stopping a session (POST /api/stop-session)
//! - Live metrics and transcript (GET /api/metrics, GET /api/transcription)
//! - Orchestrator status (GET /api/status)

use axum::{
    extract::{rejection::JsonRejection, State},
    response::Json,
    routing::{get, post},
    Router,
};
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::{error, info};

use crate::api::error::{ApiError, ApiResult};
use crate::session::{SessionContext, SessionMetrics, SessionOrchestrator, SessionOverrides};

#[derive(Clone)]
pub struct SessionState {
    pub orchestrator: Arc<SessionOrchestrator>,
}

/// Request body for starting a session.
#[derive(Debug, Default, Deserialize)]
pub struct StartSessionRequest {
    #[serde(default)]
    pub subject: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub education: Option<String>,
}

impl From<StartSessionRequest> for SessionContext {
    fn from(req: StartSessionRequest) -> Self {
        SessionContext {
            subject: req.subject,
            name: req.name.unwrap_or_default(),
            education: req.education.unwrap_or_default(),
        }
    }
}

pub fn router(state: SessionState) -> Router {
    Router::new()
        .route("/api/start-session", post(start_session))
        .route("/api/stop-session", post(stop_session))
        .route("/api/metrics", get(current_metrics))
        .route("/api/transcription", get(current_transcription))
        .route("/api/status", get(session_status))
        .with_state(state)
}

async fn start_session(
    State(state): State<SessionState>,
    body: Result<Json<StartSessionRequest>, JsonRejection>,
) -> ApiResult<Json<Value>> {
    let Json(req) = body.map_err(|e| ApiError::bad_request(e.body_text()))?;

    info!("Session start requested via API");
    let ack = state.orchestrator.start(req.into()).await?;

    Ok(Json(json!({
        "status": "success",
        "message": "Session started",
        "session_id": ack.session_id,
        "started_at": ack.started_at,
        "observers": {
            "transcript": ack.transcript_observer,
            "emotion": ack.emotion_observer,
        },
    })))
}

/// Finalization runs on its own task so a dropped connection cannot
/// interrupt it halfway.
async fn stop_session(
    State(state): State<SessionState>,
    body: Option<Json<SessionOverrides>>,
) -> ApiResult<Json<Value>> {
    let overrides = body.map(|Json(req)| req).unwrap_or_default();

    info!("Session stop requested via API");
    let orchestrator = Arc::clone(&state.orchestrator);
    let summary = tokio::spawn(async move { orchestrator.stop(&overrides).await })
        .await
        .map_err(|e| {
            error!("Session finalization task failed: {}", e);
            ApiError::internal("Session finalization failed")
        })??;

    let record = summary.record;
    Ok(Json(json!({
        "status": "success",
        "record_id": summary.record_id,
        "session_id": record.session_id,
        "subject": record.context.subject,
        "name": record.context.name,
        "education": record.context.education,
        "final_metrics": record.metrics,
        "duration_seconds": record.duration_seconds,
        "transcription": record.transcription,
        "llm_evaluation": record.evaluation,
    })))
}

async fn current_metrics(State(state): State<SessionState>) -> ApiResult<Json<SessionMetrics>> {
    Ok(Json(state.orchestrator.current_metrics().await?))
}

async fn current_transcription(State(state): State<SessionState>) -> Json<Value> {
    let text = state.orchestrator.current_transcript().await;
    Json(json!({ "transcription": text }))
}

async fn session_status(State(state): State<SessionState>) -> ApiResult<Json<Value>> {
    let status = state.orchestrator.status().await;
    let elapsed = status.elapsed_seconds();

    let mut body = serde_json::to_value(&status)
        .map_err(|e| ApiError::internal(format!("Failed to encode status: {}", e)))?;
    body["elapsed_seconds"] = json!(elapsed);

    Ok(Json(body))
}
