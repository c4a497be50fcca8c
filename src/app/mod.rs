use anyhow::{Context, Result};
use std::sync::Arc;
use tracing::{error, info, warn};

use crate::api::ApiServer;
use crate::config::Config;
use crate::db::SqliteSessionStore;
use crate::judge::AnthropicJudge;
use crate::observer::CommandObserverFactory;
use crate::session::{OrchestratorOptions, SessionOrchestrator, SessionOverrides, SessionPhase};

pub async fn run_service(config: Config) -> Result<()> {
    info!("Starting Cognspective service");

    let db_path = config.storage.resolve_db_path()?;
    let store = SqliteSessionStore::open(&db_path)?;

    let judge = AnthropicJudge::new(&config.judge)?;

    if config.observers.transcript_command.is_none() {
        warn!("observers.transcript_command is not set; sessions will have no transcript");
    }
    if config.observers.emotion_command.is_none() {
        warn!("observers.emotion_command is not set; sessions will have no emotion metrics");
    }
    let factory = CommandObserverFactory::new(&config.observers);

    let orchestrator = Arc::new(
        SessionOrchestrator::new(
            Arc::new(factory),
            Arc::new(judge),
            Arc::new(store.clone()),
            OrchestratorOptions::from_config(&config),
        )
        .context("Failed to build session orchestrator")?,
    );

    let api_server = ApiServer::new(&config.server, Arc::clone(&orchestrator), store);

    info!("Cognspective is ready!");
    info!(
        "Start a session with: curl -X POST http://{}:{}/api/start-session -H 'content-type: application/json' -d '{{\"subject\":\"Biology\"}}'",
        config.server.host, config.server.port
    );

    tokio::select! {
        result = api_server.start() => result?,
        _ = tokio::signal::ctrl_c() => info!("Shutdown requested"),
    }

    // Don't leave observer processes behind or lose a running session.
    // A stop already in flight is left to finish and persist.
    if orchestrator.settle().await == SessionPhase::Active {
        info!("Finalizing the active session before exit");
        match orchestrator.stop(&SessionOverrides::default()).await {
            Ok(summary) => info!(
                "Session {} finalized (record: {:?})",
                summary.record.session_id, summary.record_id
            ),
            Err(e) => error!("Failed to finalize session on shutdown: {}", e),
        }
    }

    Ok(())
}
