//! Session output types: metrics, evaluation and the final record.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt::Display;
use uuid::Uuid;

use super::context::SessionContext;

/// Aggregated emotion metrics, each a percentage. Zero means unavailable.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionMetrics {
    pub teaching_effectiveness: f64,
    pub face_presence: f64,
    pub positive_emotions: f64,
    pub neutral_emotions: f64,
    pub negative_emotions: f64,
}

impl SessionMetrics {
    /// Clamp every field into [0, 100]; NaN becomes 0.
    pub fn clamped(self) -> Self {
        Self {
            teaching_effectiveness: clamp_percent(self.teaching_effectiveness),
            face_presence: clamp_percent(self.face_presence),
            positive_emotions: clamp_percent(self.positive_emotions),
            neutral_emotions: clamp_percent(self.neutral_emotions),
            negative_emotions: clamp_percent(self.negative_emotions),
        }
    }
}

fn clamp_percent(value: f64) -> f64 {
    if value.is_nan() {
        0.0
    } else {
        value.clamp(0.0, 100.0)
    }
}

pub const SCORE_UNAVAILABLE: &str = "N/A";

/// Judge verdict on a transcript.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EvaluationResult {
    pub score: String,
    pub strengths: String,
    pub improvements: String,
    pub detailed_feedback: String,
}

impl Default for EvaluationResult {
    fn default() -> Self {
        Self {
            score: SCORE_UNAVAILABLE.to_string(),
            strengths: String::new(),
            improvements: String::new(),
            detailed_feedback: String::new(),
        }
    }
}

impl EvaluationResult {
    /// Stand-in used when the session produced no speech.
    pub fn no_transcript() -> Self {
        Self {
            score: SCORE_UNAVAILABLE.to_string(),
            strengths: "No transcription available".to_string(),
            improvements: "Ensure microphone is working and speak during the session".to_string(),
            detailed_feedback: "No speech was detected during this session.".to_string(),
        }
    }

    /// Stand-in used when no judge credential is configured.
    pub fn no_credential() -> Self {
        Self {
            score: SCORE_UNAVAILABLE.to_string(),
            strengths: "API key not configured".to_string(),
            improvements: "Set ANTHROPIC_API_KEY or judge.api_key in the config file".to_string(),
            detailed_feedback: "Unable to evaluate without API key.".to_string(),
        }
    }

    /// Stand-in used when the judge call errored or timed out.
    pub fn failed(reason: impl Display) -> Self {
        Self {
            score: SCORE_UNAVAILABLE.to_string(),
            strengths: "Evaluation failed".to_string(),
            improvements: reason.to_string(),
            detailed_feedback: format!("Error during evaluation: {}", reason),
        }
    }
}

/// The immutable artifact produced by one completed session.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SessionRecord {
    pub session_id: Uuid,
    #[serde(flatten)]
    pub context: SessionContext,
    pub started_at: DateTime<Utc>,
    pub ended_at: DateTime<Utc>,
    pub duration_seconds: u64,
    pub metrics: SessionMetrics,
    pub transcription: String,
    pub evaluation: EvaluationResult,
}

impl SessionRecord {
    pub fn new(
        session_id: Uuid,
        context: SessionContext,
        started_at: DateTime<Utc>,
        ended_at: DateTime<Utc>,
        metrics: SessionMetrics,
        transcription: String,
        evaluation: EvaluationResult,
    ) -> Self {
        Self {
            session_id,
            context,
            started_at,
            ended_at,
            duration_seconds: duration_seconds(started_at, ended_at),
            metrics,
            transcription,
            evaluation,
        }
    }
}

/// Whole seconds between two instants, floored and never negative.
pub fn duration_seconds(started_at: DateTime<Utc>, ended_at: DateTime<Utc>) -> u64 {
    (ended_at - started_at).num_seconds().max(0) as u64
}

/// What `stop` hands back: the record plus its store id when persisted.
#[derive(Debug, Clone)]
pub struct SessionSummary {
    pub record_id: Option<i64>,
    pub record: SessionRecord,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn test_metrics_clamped() {
        let metrics = SessionMetrics {
            teaching_effectiveness: 120.0,
            face_presence: -5.0,
            positive_emotions: f64::NAN,
            neutral_emotions: 42.5,
            negative_emotions: 0.0,
        }
        .clamped();

        assert_eq!(metrics.teaching_effectiveness, 100.0);
        assert_eq!(metrics.face_presence, 0.0);
        assert_eq!(metrics.positive_emotions, 0.0);
        assert_eq!(metrics.neutral_emotions, 42.5);
    }

    #[test]
    fn test_metrics_deserialize_with_missing_fields() {
        let metrics: SessionMetrics =
            serde_json::from_str(r#"{"face_presence": 87.5}"#).unwrap();
        assert_eq!(metrics.face_presence, 87.5);
        assert_eq!(metrics.teaching_effectiveness, 0.0);
    }

    #[test]
    fn test_bypass_evaluations() {
        let none = EvaluationResult::no_transcript();
        assert_eq!(none.score, "N/A");
        assert_eq!(none.strengths, "No transcription available");

        let no_key = EvaluationResult::no_credential();
        assert_eq!(no_key.score, "N/A");
        assert_eq!(no_key.strengths, "API key not configured");
    }

    #[test]
    fn test_failed_evaluation_carries_reason() {
        let failed = EvaluationResult::failed("judge request timed out after 60s");
        assert_eq!(failed.score, "N/A");
        assert_eq!(failed.strengths, "Evaluation failed");
        assert_eq!(failed.improvements, "judge request timed out after 60s");
        assert!(failed.detailed_feedback.contains("timed out"));
    }

    #[test]
    fn test_duration_floors_and_never_negative() {
        let start = Utc::now();
        assert_eq!(duration_seconds(start, start + Duration::milliseconds(2999)), 2);
        assert_eq!(duration_seconds(start, start - Duration::seconds(10)), 0);
    }

    #[test]
    fn test_record_serializes_flat_context() {
        let start = Utc::now();
        let record = SessionRecord::new(
            Uuid::new_v4(),
            SessionContext::new("Biology").with_name("Ada"),
            start,
            start + Duration::seconds(90),
            SessionMetrics::default(),
            "hello class".to_string(),
            EvaluationResult::default(),
        );

        assert_eq!(record.duration_seconds, 90);
        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["subject"], "Biology");
        assert_eq!(json["name"], "Ada");
        assert_eq!(json["evaluation"]["score"], "N/A");
    }
}
