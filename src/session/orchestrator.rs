//! The session state machine: `Idle -> Active -> Finalizing -> Idle`.
//!
//! One orchestrator owns at most one session. `start` holds the slot lock for
//! its whole run, so concurrent starts are serialized. `stop` takes the session
//! out of the slot, leaves `Finalizing` behind, and does the slow work (observer
//! shutdown, judge call, persistence) without holding the lock.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, Notify};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use super::{
    EvaluationResult, SessionContext, SessionError, SessionMetrics, SessionOverrides,
    SessionPhase, SessionRecord, SessionStatus, SessionSummary,
};
use crate::config::Config;
use crate::db::SessionStore;
use crate::judge::{JudgeError, JudgeService, ResponseExtractor};
use crate::observer::{ObserverFactory, ObserverState, ObserverSupervisor};

/// Time limits applied by the orchestrator.
#[derive(Debug, Clone, Copy)]
pub struct OrchestratorOptions {
    pub judge_timeout: Duration,
    pub observer_timeout: Duration,
}

impl Default for OrchestratorOptions {
    fn default() -> Self {
        Self {
            judge_timeout: Duration::from_secs(60),
            observer_timeout: Duration::from_secs(15),
        }
    }
}

impl OrchestratorOptions {
    pub fn from_config(config: &Config) -> Self {
        Self {
            judge_timeout: config.judge.timeout(),
            observer_timeout: config.observers.timeout(),
        }
    }
}

/// Returned by a successful `start`.
#[derive(Debug, Clone, Serialize)]
pub struct StartAck {
    pub session_id: Uuid,
    pub started_at: DateTime<Utc>,
    pub transcript_observer: ObserverState,
    pub emotion_observer: ObserverState,
}

struct ActiveSession {
    session_id: Uuid,
    context: SessionContext,
    started_at: DateTime<Utc>,
    supervisor: ObserverSupervisor,
}

enum SessionSlot {
    Idle,
    Active(Box<ActiveSession>),
    Finalizing,
}

impl SessionSlot {
    fn phase(&self) -> SessionPhase {
        match self {
            Self::Idle => SessionPhase::Idle,
            Self::Active(_) => SessionPhase::Active,
            Self::Finalizing => SessionPhase::Finalizing,
        }
    }
}

pub struct SessionOrchestrator {
    slot: Mutex<SessionSlot>,
    finalized: Notify,
    factory: Arc<dyn ObserverFactory>,
    judge: Arc<dyn JudgeService>,
    store: Arc<dyn SessionStore>,
    extractor: ResponseExtractor,
    options: OrchestratorOptions,
}

impl SessionOrchestrator {
    pub fn new(
        factory: Arc<dyn ObserverFactory>,
        judge: Arc<dyn JudgeService>,
        store: Arc<dyn SessionStore>,
        options: OrchestratorOptions,
    ) -> anyhow::Result<Self> {
        Ok(Self {
            slot: Mutex::new(SessionSlot::Idle),
            finalized: Notify::new(),
            factory,
            judge,
            store,
            extractor: ResponseExtractor::new()?,
            options,
        })
    }

    /// Begin a session. Observer failures are logged and tolerated.
    pub async fn start(&self, context: SessionContext) -> Result<StartAck, SessionError> {
        context.validate()?;

        let mut slot = self.slot.lock().await;
        if !matches!(*slot, SessionSlot::Idle) {
            return Err(SessionError::InvalidState {
                operation: "start",
                phase: slot.phase(),
            });
        }

        let session_id = Uuid::new_v4();
        let started_at = Utc::now();
        info!(
            "Starting session {} (subject: {})",
            session_id, context.subject
        );

        let mut supervisor = ObserverSupervisor::from_observers(
            self.factory.transcript().map_err(|e| format!("{:#}", e)),
            self.factory.emotion().map_err(|e| format!("{:#}", e)),
            self.options.observer_timeout,
        );
        supervisor.start_all().await;

        let (transcript_observer, emotion_observer) = supervisor.states();
        info!(
            "Session {} active (transcript: {}, emotion: {})",
            session_id,
            transcript_observer.as_str(),
            emotion_observer.as_str()
        );

        *slot = SessionSlot::Active(Box::new(ActiveSession {
            session_id,
            context,
            started_at,
            supervisor,
        }));

        Ok(StartAck {
            session_id,
            started_at,
            transcript_observer,
            emotion_observer,
        })
    }

    /// End the current session and produce its record.
    ///
    /// Once a session was active this always yields a record, whatever the
    /// observers, the judge or the store do. Stopping while idle yields an
    /// empty record that is not persisted.
    pub async fn stop(&self, overrides: &SessionOverrides) -> Result<SessionSummary, SessionError> {
        let session = {
            let mut slot = self.slot.lock().await;
            match std::mem::replace(&mut *slot, SessionSlot::Finalizing) {
                SessionSlot::Active(session) => session,
                SessionSlot::Idle => {
                    *slot = SessionSlot::Idle;
                    debug!("Stop requested with no active session");
                    return Ok(idle_summary(overrides));
                }
                SessionSlot::Finalizing => {
                    return Err(SessionError::InvalidState {
                        operation: "stop",
                        phase: SessionPhase::Finalizing,
                    });
                }
            }
        };

        let summary = self.finalize(*session, overrides).await;

        *self.slot.lock().await = SessionSlot::Idle;
        self.finalized.notify_waiters();
        Ok(summary)
    }

    /// Wait out any in-flight `stop`, then report the phase (`Idle` or `Active`).
    pub async fn settle(&self) -> SessionPhase {
        loop {
            let notified = self.finalized.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            let phase = self.slot.lock().await.phase();
            if phase != SessionPhase::Finalizing {
                return phase;
            }
            debug!("Waiting for session finalization to complete");
            notified.await;
        }
    }

    pub async fn current_metrics(&self) -> Result<SessionMetrics, SessionError> {
        match &*self.slot.lock().await {
            SessionSlot::Active(session) => Ok(session.supervisor.current_metrics()),
            _ => Err(SessionError::NotActive),
        }
    }

    /// Transcript so far; empty when no session is active.
    pub async fn current_transcript(&self) -> String {
        match &*self.slot.lock().await {
            SessionSlot::Active(session) => session.supervisor.current_transcript(),
            _ => String::new(),
        }
    }

    pub async fn status(&self) -> SessionStatus {
        let slot = self.slot.lock().await;
        match &*slot {
            SessionSlot::Active(session) => {
                let (transcript, emotion) = session.supervisor.states();
                SessionStatus {
                    phase: SessionPhase::Active,
                    session_id: Some(session.session_id),
                    subject: Some(session.context.subject.clone()),
                    started_at: Some(session.started_at),
                    transcript_observer: Some(transcript),
                    emotion_observer: Some(emotion),
                }
            }
            other => SessionStatus::without_session(other.phase()),
        }
    }

    async fn finalize(&self, session: ActiveSession, overrides: &SessionOverrides) -> SessionSummary {
        let ActiveSession {
            session_id,
            context,
            started_at,
            mut supervisor,
        } = session;

        let ended_at = Utc::now();
        info!("Stopping session {}", session_id);

        let output = supervisor.stop_all().await;
        drop(supervisor);

        let context = context.merge(overrides);
        let evaluation = self.evaluate(session_id, &output.transcript, &context).await;

        let record = SessionRecord::new(
            session_id,
            context,
            started_at,
            ended_at,
            output.metrics,
            output.transcript,
            evaluation,
        );

        let store = Arc::clone(&self.store);
        let to_save = record.clone();
        let record_id = match tokio::spawn(async move { store.save(&to_save).await }).await {
            Ok(Ok(id)) => {
                info!("Session {} saved as record {}", session_id, id);
                Some(id)
            }
            Ok(Err(e)) => {
                error!("Failed to save session {}: {}", session_id, e);
                None
            }
            Err(_join_error) => {
                error!("Session store panicked while saving session {}", session_id);
                None
            }
        };

        info!(
            "Session {} finished after {}s (score: {})",
            session_id, record.duration_seconds, record.evaluation.score
        );

        SessionSummary { record_id, record }
    }

    async fn evaluate(
        &self,
        session_id: Uuid,
        transcript: &str,
        context: &SessionContext,
    ) -> EvaluationResult {
        if transcript.trim().is_empty() {
            info!("Session {} produced no transcript; skipping evaluation", session_id);
            return EvaluationResult::no_transcript();
        }

        if !self.judge.has_credential() {
            warn!("No judge API key configured; session {} not evaluated", session_id);
            return EvaluationResult::no_credential();
        }

        let timeout = self.options.judge_timeout;
        let judge = Arc::clone(&self.judge);
        let transcript = transcript.to_string();
        let education = context.education.clone();
        let subject = context.subject.clone();

        // A panic inside the judge surfaces here as a JoinError
        let mut task = tokio::spawn(async move {
            judge
                .evaluate(&transcript, &education, &subject, timeout)
                .await
        });

        let outcome = match tokio::time::timeout(timeout, &mut task).await {
            Ok(Ok(result)) => result,
            Ok(Err(_join_error)) => Err(JudgeError::Panicked),
            Err(_) => {
                task.abort();
                Err(JudgeError::Timeout(timeout.as_secs()))
            }
        };

        match outcome {
            Ok(raw) => self.extractor.extract(&raw),
            Err(e) => {
                error!("Evaluation of session {} failed: {}", session_id, e);
                EvaluationResult::failed(e)
            }
        }
    }
}

fn idle_summary(overrides: &SessionOverrides) -> SessionSummary {
    let now = Utc::now();
    SessionSummary {
        record_id: None,
        record: SessionRecord::new(
            Uuid::nil(),
            SessionContext::default().merge(overrides),
            now,
            now,
            SessionMetrics::default(),
            String::new(),
            EvaluationResult::no_transcript(),
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_slot_phase() {
        assert_eq!(SessionSlot::Idle.phase(), SessionPhase::Idle);
        assert_eq!(SessionSlot::Finalizing.phase(), SessionPhase::Finalizing);
    }

    #[test]
    fn test_idle_summary_is_empty() {
        let summary = idle_summary(&SessionOverrides {
            subject: Some("Biology".to_string()),
            ..SessionOverrides::default()
        });

        assert!(summary.record_id.is_none());
        assert_eq!(summary.record.session_id, Uuid::nil());
        assert_eq!(summary.record.duration_seconds, 0);
        assert_eq!(summary.record.context.subject, "Biology");
        assert_eq!(summary.record.transcription, "");
        assert_eq!(summary.record.metrics, SessionMetrics::default());
        assert_eq!(summary.record.evaluation, EvaluationResult::no_transcript());
    }

    #[test]
    fn test_options_from_config() {
        let mut config = Config::default();
        config.judge.timeout_seconds = 5;
        config.observers.timeout_seconds = 2;

        let options = OrchestratorOptions::from_config(&config);
        assert_eq!(options.judge_timeout, Duration::from_secs(5));
        assert_eq!(options.observer_timeout, Duration::from_secs(2));
    }
}
