use anyhow::Result;
use regex::Regex;
use tracing::debug;

use crate::session::{EvaluationResult, SCORE_UNAVAILABLE};

/// Pulls the four graded sections out of a judge reply.
///
/// Headers are matched case-insensitively. Each section runs from its header
/// to the nearest header that comes later in the template order
/// (score, strengths, improvements, feedback) or to the end of the text.
pub struct ResponseExtractor {
    score: Regex,
    strengths: Regex,
    improvements: Regex,
    feedback: Regex,
}

impl ResponseExtractor {
    pub fn new() -> Result<Self> {
        Ok(Self {
            score: Regex::new(r"(?i)SCORE:\s*(\d+%?)")?,
            strengths: Regex::new(r"(?i)STRENGTHS?:")?,
            improvements: Regex::new(r"(?i)IMPROVEMENTS?:")?,
            feedback: Regex::new(r"(?i)FEEDBACK:")?,
        })
    }

    pub fn extract(&self, raw: &str) -> EvaluationResult {
        let strengths = self.section(raw, &self.strengths, &[&self.improvements, &self.feedback]);
        let improvements = self.section(raw, &self.improvements, &[&self.feedback]);

        // Nothing usable: hand back the whole reply untouched
        if strengths.is_empty() && improvements.is_empty() {
            debug!("Judge reply did not follow the template; keeping it verbatim");
            return EvaluationResult {
                detailed_feedback: raw.to_string(),
                ..EvaluationResult::default()
            };
        }

        let score = self
            .score
            .captures(raw)
            .and_then(|caps| caps.get(1))
            .map(|m| m.as_str().to_string())
            .unwrap_or_else(|| SCORE_UNAVAILABLE.to_string());

        EvaluationResult {
            score,
            strengths,
            improvements,
            detailed_feedback: self.section(raw, &self.feedback, &[]),
        }
    }

    fn section(&self, raw: &str, header: &Regex, later: &[&Regex]) -> String {
        let Some(found) = header.find(raw) else {
            return String::new();
        };

        let start = found.end();
        let end = later
            .iter()
            .filter_map(|next| next.find_at(raw, start))
            .map(|m| m.start())
            .min()
            .unwrap_or(raw.len());

        raw[start..end].trim().to_string()
    }
}
