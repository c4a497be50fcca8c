//! Concurrent start/stop of the transcript and emotion observers.

use std::sync::Arc;
use std::time::Duration;
use tracing::warn;

use super::{
    EmotionObserver, EmotionRole, ObserverError, ObserverHandle, ObserverState,
    TranscriptObserver, TranscriptRole,
};
use crate::session::SessionMetrics;

/// Per-observer start outcome.
#[derive(Debug)]
pub struct StartReport {
    pub transcript: Result<(), ObserverError>,
    pub emotion: Result<(), ObserverError>,
}

/// Output captured from both observers at stop, plus how each stop went.
#[derive(Debug)]
pub struct FinalOutput {
    pub transcript: String,
    pub metrics: SessionMetrics,
    pub transcript_stop: Result<(), ObserverError>,
    pub emotion_stop: Result<(), ObserverError>,
    pub transcript_state: ObserverState,
    pub emotion_state: ObserverState,
}

pub struct ObserverSupervisor {
    transcript: ObserverHandle<TranscriptRole>,
    emotion: ObserverHandle<EmotionRole>,
}

impl ObserverSupervisor {
    pub fn new(
        transcript: ObserverHandle<TranscriptRole>,
        emotion: ObserverHandle<EmotionRole>,
    ) -> Self {
        Self {
            transcript,
            emotion,
        }
    }

    /// Wrap whatever observers could be built; a missing one becomes an
    /// unavailable handle carrying the reason.
    pub fn from_observers(
        transcript: Result<Arc<dyn TranscriptObserver>, String>,
        emotion: Result<Arc<dyn EmotionObserver>, String>,
        timeout: Duration,
    ) -> Self {
        let transcript = match transcript {
            Ok(observer) => ObserverHandle::new(TranscriptRole(observer), timeout),
            Err(reason) => ObserverHandle::unavailable(reason, timeout),
        };
        let emotion = match emotion {
            Ok(observer) => ObserverHandle::new(EmotionRole(observer), timeout),
            Err(reason) => ObserverHandle::unavailable(reason, timeout),
        };
        Self::new(transcript, emotion)
    }

    /// Start both observers concurrently and wait for both outcomes.
    pub async fn start_all(&mut self) -> StartReport {
        let (transcript, emotion) = tokio::join!(self.transcript.start(), self.emotion.start());

        if let Err(e) = &transcript {
            warn!("{}. Continuing without transcript.", e);
        }
        if let Err(e) = &emotion {
            warn!("{}. Continuing without emotion metrics.", e);
        }

        StartReport {
            transcript,
            emotion,
        }
    }

    pub fn current_transcript(&self) -> String {
        self.transcript.snapshot()
    }

    pub fn current_metrics(&self) -> SessionMetrics {
        self.emotion.snapshot()
    }

    pub fn states(&self) -> (ObserverState, ObserverState) {
        (self.transcript.state().clone(), self.emotion.state().clone())
    }

    /// Snapshot both observers, then stop both concurrently.
    ///
    /// Snapshots come first because stopping may discard live state. Both
    /// handles are released afterwards.
    pub async fn stop_all(&mut self) -> FinalOutput {
        let metrics = self.emotion.snapshot();
        let transcript = self.transcript.snapshot();

        let (transcript_stop, emotion_stop) =
            tokio::join!(self.transcript.stop(), self.emotion.stop());

        if let Err(e) = &transcript_stop {
            warn!("{}", e);
        }
        if let Err(e) = &emotion_stop {
            warn!("{}", e);
        }

        self.transcript.release();
        self.emotion.release();

        FinalOutput {
            transcript,
            metrics,
            transcript_stop,
            emotion_stop,
            transcript_state: self.transcript.state().clone(),
            emotion_state: self.emotion.state().clone(),
        }
    }
}
