use thiserror::Error;

use super::status::SessionPhase;

/// Errors surfaced to callers of the orchestrator.
#[derive(Debug, Error)]
pub enum SessionError {
    #[error("invalid session context: {0}")]
    InvalidContext(String),
    #[error("cannot {operation} while session is {phase}")]
    InvalidState {
        operation: &'static str,
        phase: SessionPhase,
    },
    #[error("no active session")]
    NotActive,
}
