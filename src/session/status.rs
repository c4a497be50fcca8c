//! Session phase and the status snapshot exposed to API handlers.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use crate::observer::ObserverState;

/// Phase of the session lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionPhase {
    Idle,
    Active,
    Finalizing,
}

impl SessionPhase {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Active => "active",
            Self::Finalizing => "finalizing",
        }
    }
}

impl fmt::Display for SessionPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Point-in-time view of the orchestrator.
#[derive(Debug, Clone, Serialize)]
pub struct SessionStatus {
    pub phase: SessionPhase,
    pub session_id: Option<Uuid>,
    pub subject: Option<String>,
    pub started_at: Option<DateTime<Utc>>,
    pub transcript_observer: Option<ObserverState>,
    pub emotion_observer: Option<ObserverState>,
}

impl SessionStatus {
    pub fn idle() -> Self {
        Self::without_session(SessionPhase::Idle)
    }

    pub fn without_session(phase: SessionPhase) -> Self {
        Self {
            phase,
            session_id: None,
            subject: None,
            started_at: None,
            transcript_observer: None,
            emotion_observer: None,
        }
    }

    /// Seconds since the session started.
    pub fn elapsed_seconds(&self) -> Option<u64> {
        self.started_at.map(|started| {
            let elapsed = Utc::now() - started;
            elapsed.num_seconds().max(0) as u64
        })
    }
}
