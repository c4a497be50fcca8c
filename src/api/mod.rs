//! REST API server for Cognspective.
//!
//! Provides HTTP endpoints for:
//! - Session control (start, stop)
//! - Live metrics, transcript and status
//! - Stored session history

pub mod error;
pub mod routes;

use anyhow::{Context, Result};
use axum::{response::Json, routing::get, Router};
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::info;

use crate::config::ServerConfig;
use crate::db::SqliteSessionStore;
use crate::session::SessionOrchestrator;

pub use routes::history::HistoryState;
pub use routes::session::SessionState;

pub struct ApiServer {
    host: String,
    port: u16,
    session_state: SessionState,
    history_state: HistoryState,
}

impl ApiServer {
    pub fn new(
        config: &ServerConfig,
        orchestrator: Arc<SessionOrchestrator>,
        store: SqliteSessionStore,
    ) -> Self {
        Self {
            host: config.host.clone(),
            port: config.port,
            session_state: SessionState { orchestrator },
            history_state: HistoryState { store },
        }
    }

    pub fn router(&self) -> Router {
        Router::new()
            .route("/", get(service_info))
            .route("/version", get(version))
            .merge(routes::session::router(self.session_state.clone()))
            .merge(routes::history::router(self.history_state.clone()))
    }

    pub async fn start(self) -> Result<()> {
        let app = self.router();
        let addr = format!("{}:{}", self.host, self.port);

        let listener = tokio::net::TcpListener::bind(&addr)
            .await
            .with_context(|| format!("Failed to bind API server to {}", addr))?;

        info!("API server listening on http://{}", addr);
        info!("Endpoints:");
        info!("  GET  /                    - Service info");
        info!("  GET  /version             - Get version info");
        info!("  POST /api/start-session   - Start a teaching session");
        info!("  POST /api/stop-session    - Stop and evaluate the session");
        info!("  GET  /api/metrics         - Live emotion metrics");
        info!("  GET  /api/transcription   - Live transcript");
        info!("  GET  /api/status          - Session status");
        info!("  GET  /api/sessions        - List stored sessions");
        info!("  GET  /api/sessions/:id    - Get a stored session");

        axum::serve(listener, app).await?;

        Ok(())
    }
}

async fn service_info() -> Json<Value> {
    Json(json!({
        "service": "cognspective",
        "version": env!("CARGO_PKG_VERSION"),
        "status": "running"
    }))
}

async fn version() -> Json<Value> {
    Json(json!({
        "version": env!("CARGO_PKG_VERSION"),
        "name": "cognspective"
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{JudgeConfig, ObserverConfig};
    use crate::judge::AnthropicJudge;
    use crate::observer::CommandObserverFactory;
    use crate::session::OrchestratorOptions;
    use axum::body::{to_bytes, Body};
    use axum::http::{Request, StatusCode};
    use std::time::Duration;
    use tower::ServiceExt;

    /// A server whose observers are unconfigured and whose judge has no key.
    fn server() -> ApiServer {
        server_with_store(SqliteSessionStore::in_memory().unwrap())
    }

    fn server_with_store(store: SqliteSessionStore) -> ApiServer {
        let judge = AnthropicJudge::with_api_key(&JudgeConfig::default(), None).unwrap();

        let orchestrator = SessionOrchestrator::new(
            Arc::new(CommandObserverFactory::new(&ObserverConfig::default())),
            Arc::new(judge),
            Arc::new(store.clone()),
            OrchestratorOptions {
                judge_timeout: Duration::from_secs(1),
                observer_timeout: Duration::from_secs(1),
            },
        )
        .unwrap();

        ApiServer::new(&ServerConfig::default(), Arc::new(orchestrator), store)
    }

    async fn send(app: &Router, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
        let mut request = Request::builder().method(method).uri(uri);
        let body = match body {
            Some(json) => {
                request = request.header("content-type", "application/json");
                Body::from(json.to_string())
            }
            None => Body::empty(),
        };

        let response = app
            .clone()
            .oneshot(request.body(body).unwrap())
            .await
            .unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let json = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        (status, json)
    }

    #[tokio::test]
    async fn test_service_info() {
        let app = server().router();
        let (status, body) = send(&app, "GET", "/", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["service"], "cognspective");
    }

    #[tokio::test]
    async fn test_session_round_trip() {
        let app = server().router();

        let (status, body) = send(
            &app,
            "POST",
            "/api/start-session",
            Some(json!({"subject": "Biology", "name": "Ada"})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "success");
        assert_eq!(body["observers"]["transcript"]["state"], "failed");

        let (status, body) = send(&app, "GET", "/api/status", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["phase"], "active");
        assert_eq!(body["subject"], "Biology");

        let (status, body) = send(&app, "GET", "/api/metrics", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["face_presence"], 0.0);

        let (status, body) = send(
            &app,
            "POST",
            "/api/stop-session",
            Some(json!({"education": "high school"})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["subject"], "Biology");
        assert_eq!(body["education"], "high school");
        assert_eq!(body["transcription"], "");
        assert_eq!(body["llm_evaluation"]["score"], "N/A");
        assert_eq!(
            body["llm_evaluation"]["strengths"],
            "No transcription available"
        );
        let record_id = body["record_id"].as_i64().unwrap();

        let (status, body) = send(&app, "GET", &format!("/api/sessions/{}", record_id), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["subject"], "Biology");
        assert_eq!(body["name"], "Ada");

        let (status, body) = send(&app, "GET", "/api/sessions?subject=Biology", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body.as_array().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_history_rows_are_flat_and_unlimited() {
        use crate::db::SessionStore;
        use crate::session::{EvaluationResult, SessionContext, SessionMetrics, SessionRecord};
        use chrono::{Duration as ChronoDuration, Utc};
        use uuid::Uuid;

        let store = SqliteSessionStore::in_memory().unwrap();
        for minutes_ago in (1..=25).rev() {
            let started_at = Utc::now() - ChronoDuration::minutes(minutes_ago);
            let record = SessionRecord::new(
                Uuid::new_v4(),
                SessionContext::new("Biology"),
                started_at,
                started_at + ChronoDuration::seconds(60),
                SessionMetrics {
                    teaching_effectiveness: 64.0,
                    face_presence: 90.0,
                    ..SessionMetrics::default()
                },
                "Cells divide.".to_string(),
                EvaluationResult {
                    score: format!("{}%", 100 - minutes_ago),
                    strengths: "clear".to_string(),
                    improvements: "pace".to_string(),
                    detailed_feedback: "solid".to_string(),
                },
            );
            store.save(&record).await.unwrap();
        }
        let app = server_with_store(store).router();

        let (status, body) = send(&app, "GET", "/api/sessions", None).await;
        assert_eq!(status, StatusCode::OK);
        let rows = body.as_array().unwrap();
        assert_eq!(rows.len(), 25);
        assert_eq!(body[0]["llm_score"], "99%");
        assert_eq!(body[0]["teaching_effectiveness"], 64.0);
        assert_eq!(body[0]["face_presence"], 90.0);
        assert_eq!(body[0]["transcription_text"], "Cells divide.");
        assert_eq!(body[0]["llm_strengths"], "clear");
        assert!(body[0].get("evaluation").is_none());

        let (_, body) = send(&app, "GET", "/api/sessions?limit=3", None).await;
        assert_eq!(body.as_array().unwrap().len(), 3);

        let id = rows[0]["id"].as_i64().unwrap();
        let (status, body) = send(&app, "GET", &format!("/api/sessions/{}", id), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["llm_improvements"], "pace");
        assert_eq!(body["llm_feedback"], "solid");
    }

    #[tokio::test]
    async fn test_start_rejects_blank_subject() {
        let app = server().router();
        let (status, body) = send(&app, "POST", "/api/start-session", Some(json!({"subject": " "}))).await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], true);
    }

    #[tokio::test]
    async fn test_second_start_conflicts() {
        let app = server().router();
        let start = json!({"subject": "Chemistry"});

        let (status, _) = send(&app, "POST", "/api/start-session", Some(start.clone())).await;
        assert_eq!(status, StatusCode::OK);

        let (status, body) = send(&app, "POST", "/api/start-session", Some(start)).await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(body["message"], "cannot start while session is active");
    }

    #[tokio::test]
    async fn test_idle_endpoints() {
        let app = server().router();

        let (status, body) = send(&app, "GET", "/api/metrics", None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["message"], "No active session");

        let (status, body) = send(&app, "GET", "/api/transcription", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["transcription"], "");

        // Stopping with nothing running is a no-op that stores nothing
        let (status, body) = send(&app, "POST", "/api/stop-session", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["duration_seconds"], 0);
        assert!(body["record_id"].is_null());

        let (_, body) = send(&app, "GET", "/api/sessions", None).await;
        assert!(body.as_array().unwrap().is_empty());

        let (status, _) = send(&app, "GET", "/api/sessions/99", None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }
}
