//! Background observers that run for the lifetime of a session.
//!
//! Two roles exist: a transcript observer (speech to text) and an emotion
//! observer (face presence and emotion ratios). Both are external
//! collaborators behind the traits below; [`ObserverHandle`] wraps either one
//! with a uniform lifecycle, and [`ObserverSupervisor`] drives the pair.

pub mod command;
pub mod handle;
pub mod supervisor;

use anyhow::{bail, Result};
use async_trait::async_trait;
use serde::Serialize;
use std::fmt;
use std::sync::Arc;
use thiserror::Error;

use crate::session::SessionMetrics;

pub use command::{CommandEmotionObserver, CommandObserverFactory, CommandTranscriptObserver};
pub use handle::ObserverHandle;
pub use supervisor::{FinalOutput, ObserverSupervisor, StartReport};

/// Speech-to-text collaborator.
#[async_trait]
pub trait TranscriptObserver: Send + Sync {
    async fn start(&self) -> Result<()>;

    async fn stop(&self) -> Result<()>;

    /// Transcript accumulated so far. Must not block.
    fn current_text(&self) -> String;
}

/// Face/emotion analysis collaborator.
#[async_trait]
pub trait EmotionObserver: Send + Sync {
    /// Returns `false` when the underlying device declined to start.
    async fn start(&self) -> Result<bool>;

    async fn stop(&self) -> Result<()>;

    /// Latest metrics snapshot. Must not block.
    fn current_metrics(&self) -> SessionMetrics;
}

/// Builds a fresh pair of observers for each session.
pub trait ObserverFactory: Send + Sync {
    fn transcript(&self) -> Result<Arc<dyn TranscriptObserver>>;

    fn emotion(&self) -> Result<Arc<dyn EmotionObserver>>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ObserverKind {
    Transcript,
    Emotion,
}

impl ObserverKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Transcript => "transcript",
            Self::Emotion => "emotion",
        }
    }
}

impl fmt::Display for ObserverKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", content = "reason", rename_all = "snake_case")]
pub enum ObserverState {
    NotStarted,
    Running,
    Stopped,
    Failed(String),
}

impl ObserverState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::NotStarted => "not_started",
            Self::Running => "running",
            Self::Stopped => "stopped",
            Self::Failed(_) => "failed",
        }
    }

    pub fn is_running(&self) -> bool {
        matches!(self, Self::Running)
    }
}

/// Failure of a single observer. Never fatal to the session.
#[derive(Debug, Clone, Error)]
pub enum ObserverError {
    #[error("{kind} observer is not available: {reason}")]
    Unavailable { kind: ObserverKind, reason: String },
    #[error("{kind} observer failed to start: {reason}")]
    Start { kind: ObserverKind, reason: String },
    #[error("{kind} observer failed to stop: {reason}")]
    Stop { kind: ObserverKind, reason: String },
    #[error("{kind} observer panicked during {operation}")]
    Panicked {
        kind: ObserverKind,
        operation: &'static str,
    },
    #[error("{kind} observer {operation} timed out after {seconds}s")]
    Timeout {
        kind: ObserverKind,
        operation: &'static str,
        seconds: u64,
    },
}

/// Uniform lifecycle the handle drives, implemented by the two role adapters.
#[async_trait]
pub trait Observer: Clone + Send + Sync + 'static {
    type Output: Default + Send;

    const KIND: ObserverKind;

    async fn start(&self) -> Result<()>;

    async fn stop(&self) -> Result<()>;

    fn snapshot(&self) -> Self::Output;
}

#[derive(Clone)]
pub struct TranscriptRole(pub Arc<dyn TranscriptObserver>);

#[derive(Clone)]
pub struct EmotionRole(pub Arc<dyn EmotionObserver>);

#[async_trait]
impl Observer for TranscriptRole {
    type Output = String;

    const KIND: ObserverKind = ObserverKind::Transcript;

    async fn start(&self) -> Result<()> {
        self.0.start().await
    }

    async fn stop(&self) -> Result<()> {
        self.0.stop().await
    }

    fn snapshot(&self) -> String {
        self.0.current_text()
    }
}

#[async_trait]
impl Observer for EmotionRole {
    type Output = SessionMetrics;

    const KIND: ObserverKind = ObserverKind::Emotion;

    async fn start(&self) -> Result<()> {
        if !self.0.start().await? {
            bail!("emotion detector declined to start");
        }
        Ok(())
    }

    async fn stop(&self) -> Result<()> {
        self.0.stop().await
    }

    fn snapshot(&self) -> SessionMetrics {
        self.0.current_metrics().clamped()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_observer_state_as_str() {
        assert_eq!(ObserverState::NotStarted.as_str(), "not_started");
        assert_eq!(ObserverState::Running.as_str(), "running");
        assert_eq!(ObserverState::Stopped.as_str(), "stopped");
        assert_eq!(ObserverState::Failed("x".into()).as_str(), "failed");
    }

    #[test]
    fn test_observer_state_serialization() {
        let json = serde_json::to_value(ObserverState::Failed("no camera".into())).unwrap();
        assert_eq!(json["state"], "failed");
        assert_eq!(json["reason"], "no camera");

        let json = serde_json::to_value(ObserverState::Running).unwrap();
        assert_eq!(json["state"], "running");
    }

    #[test]
    fn test_observer_error_messages() {
        let err = ObserverError::Timeout {
            kind: ObserverKind::Emotion,
            operation: "start",
            seconds: 15,
        };
        assert_eq!(err.to_string(), "emotion observer start timed out after 15s");

        let err = ObserverError::Start {
            kind: ObserverKind::Transcript,
            reason: "no microphone".into(),
        };
        assert_eq!(
            err.to_string(),
            "transcript observer failed to start: no microphone"
        );
    }
}
