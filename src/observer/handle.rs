//! Lifecycle wrapper around a single observer.
//!
//! Start and stop run on their own task so that an error, a panic or a hang
//! inside the observer ends up as an [`ObserverError`] here instead of
//! unwinding into the supervisor.

use std::future::Future;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::time::Duration;
use tracing::{debug, info, warn};

use super::{Observer, ObserverError, ObserverKind, ObserverState};

pub struct ObserverHandle<O: Observer> {
    observer: Option<O>,
    unavailable_reason: Option<String>,
    state: ObserverState,
    timeout: Duration,
}

impl<O: Observer> ObserverHandle<O> {
    pub fn new(observer: O, timeout: Duration) -> Self {
        Self {
            observer: Some(observer),
            unavailable_reason: None,
            state: ObserverState::NotStarted,
            timeout,
        }
    }

    /// A handle with nothing behind it; `start` reports the reason.
    pub fn unavailable(reason: impl Into<String>, timeout: Duration) -> Self {
        Self {
            observer: None,
            unavailable_reason: Some(reason.into()),
            state: ObserverState::NotStarted,
            timeout,
        }
    }

    pub fn kind(&self) -> ObserverKind {
        O::KIND
    }

    pub fn state(&self) -> &ObserverState {
        &self.state
    }

    pub async fn start(&mut self) -> Result<(), ObserverError> {
        if self.state.is_running() {
            return Ok(());
        }

        let Some(observer) = self.observer.clone() else {
            let err = ObserverError::Unavailable {
                kind: O::KIND,
                reason: self
                    .unavailable_reason
                    .clone()
                    .unwrap_or_else(|| "released".to_string()),
            };
            self.state = ObserverState::Failed(err.to_string());
            return Err(err);
        };

        debug!("Starting {} observer", O::KIND);
        let outcome = self
            .run_bounded("start", async move { observer.start().await })
            .await;

        match outcome {
            Ok(()) => {
                info!("{} observer running", O::KIND);
                self.state = ObserverState::Running;
                Ok(())
            }
            Err(err) => {
                self.state = ObserverState::Failed(err.to_string());
                if matches!(err, ObserverError::Timeout { .. }) {
                    // The start may have half-completed; release whatever it acquired.
                    if let Some(observer) = self.observer.clone() {
                        tokio::spawn(async move {
                            if let Err(e) = observer.stop().await {
                                debug!("Cleanup after timed-out start failed: {:#}", e);
                            }
                        });
                    }
                }
                Err(err)
            }
        }
    }

    /// Stop the observer. Succeeds without doing anything when it is not running.
    pub async fn stop(&mut self) -> Result<(), ObserverError> {
        if !self.state.is_running() {
            if self.state == ObserverState::NotStarted {
                self.state = ObserverState::Stopped;
            }
            return Ok(());
        }

        let Some(observer) = self.observer.clone() else {
            self.state = ObserverState::Stopped;
            return Ok(());
        };

        debug!("Stopping {} observer", O::KIND);
        match self
            .run_bounded("stop", async move { observer.stop().await })
            .await
        {
            Ok(()) => {
                info!("{} observer stopped", O::KIND);
                self.state = ObserverState::Stopped;
                Ok(())
            }
            Err(err) => {
                self.state = ObserverState::Failed(err.to_string());
                Err(err)
            }
        }
    }

    /// Best output available right now; the default unless running.
    pub fn snapshot(&self) -> O::Output {
        match (&self.state, &self.observer) {
            (ObserverState::Running, Some(observer)) => {
                catch_unwind(AssertUnwindSafe(|| observer.snapshot())).unwrap_or_else(|_| {
                    warn!("{} observer panicked while taking a snapshot", O::KIND);
                    O::Output::default()
                })
            }
            _ => O::Output::default(),
        }
    }

    /// Drop the observer. The handle keeps its final state for reporting.
    pub fn release(&mut self) {
        if self.state.is_running() {
            self.state = ObserverState::Failed("released while running".to_string());
        }
        self.observer = None;
    }

    async fn run_bounded<F>(&self, operation: &'static str, work: F) -> Result<(), ObserverError>
    where
        F: Future<Output = anyhow::Result<()>> + Send + 'static,
    {
        let mut task = tokio::spawn(work);

        match tokio::time::timeout(self.timeout, &mut task).await {
            Ok(Ok(Ok(()))) => Ok(()),
            Ok(Ok(Err(e))) => {
                let reason = format!("{:#}", e);
                Err(match operation {
                    "start" => ObserverError::Start {
                        kind: O::KIND,
                        reason,
                    },
                    _ => ObserverError::Stop {
                        kind: O::KIND,
                        reason,
                    },
                })
            }
            Ok(Err(_join_error)) => Err(ObserverError::Panicked {
                kind: O::KIND,
                operation,
            }),
            Err(_) => {
                task.abort();
                Err(ObserverError::Timeout {
                    kind: O::KIND,
                    operation,
                    seconds: self.timeout.as_secs(),
                })
            }
        }
    }
}
