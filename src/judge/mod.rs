//! LLM judge that grades a session transcript.

pub mod anthropic;
pub mod extractor;

use async_trait::async_trait;
use std::time::Duration;
use thiserror::Error;

pub use anthropic::AnthropicJudge;
pub use extractor::ResponseExtractor;

#[derive(Debug, Error)]
pub enum JudgeError {
    #[error("no judge API key configured")]
    MissingCredential,
    #[error("judge request timed out after {0}s")]
    Timeout(u64),
    #[error("judge request failed: {0}")]
    Request(String),
    #[error("judge API error: {message} (type: {kind})")]
    Api { kind: String, message: String },
    #[error("unexpected judge response: {0}")]
    Response(String),
    #[error("judge task panicked")]
    Panicked,
}

/// Grades a transcript and returns the judge's raw text.
#[async_trait]
pub trait JudgeService: Send + Sync {
    fn has_credential(&self) -> bool;

    async fn evaluate(
        &self,
        transcript: &str,
        education: &str,
        subject: &str,
        timeout: Duration,
    ) -> Result<String, JudgeError>;
}

/// Prompt asking the judge to role-play a student of the given level and
/// answer in the four-header template the extractor understands.
pub fn build_prompt(transcript: &str, education: &str, subject: &str) -> String {
    let role = match education.trim() {
        "" => "a student".to_string(),
        level => format!("a {} student", level),
    };
    let subject = match subject.trim() {
        "" => "lesson",
        subject => subject,
    };

    format!(
        "You are {role}. You are judging the transcript below based on the following criteria: \
         1. How much you can understand the speaker based on the language (diction) they use and your role. \
         2. How much they pause and or stutter. \
         3. How much the content is relevant to the {subject} topic. \
         Please provide your response in EXACTLY this format:\n\
         SCORE: [number]%\n\
         STRENGTHS: [bullet points of strengths]\n\
         IMPROVEMENTS: [bullet points of improvements]\n\
         FEEDBACK: [detailed paragraph of feedback]\n\n\
         The transcription is: {transcript}"
    )
}
