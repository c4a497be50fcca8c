//! Teaching session lifecycle.

pub mod context;
pub mod error;
pub mod orchestrator;
pub mod record;
pub mod status;

pub use context::{SessionContext, SessionOverrides};
pub use error::SessionError;
pub use orchestrator::{OrchestratorOptions, SessionOrchestrator, StartAck};
pub use record::{
    duration_seconds, EvaluationResult, SessionMetrics, SessionRecord, SessionSummary,
    SCORE_UNAVAILABLE,
};
pub use status::{SessionPhase, SessionStatus};
