use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, error, info};

use super::{build_prompt, JudgeError, JudgeService};
use crate::config::JudgeConfig;

const ANTHROPIC_VERSION: &str = "2023-06-01";

#[derive(Debug, Serialize)]
struct MessagesRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    messages: Vec<Message>,
}

#[derive(Debug, Serialize)]
struct Message {
    role: &'static str,
    content: String,
}

#[derive(Debug, Deserialize)]
struct MessagesResponse {
    #[serde(default)]
    content: Vec<ContentBlock>,
}

#[derive(Debug, Deserialize)]
struct ContentBlock {
    r#type: String,
    #[serde(default)]
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ErrorResponse {
    error: ErrorDetail,
}

#[derive(Debug, Deserialize)]
struct ErrorDetail {
    r#type: String,
    message: String,
}

/// Judge backed by the Anthropic Messages API.
pub struct AnthropicJudge {
    client: reqwest::Client,
    endpoint: String,
    model: String,
    max_tokens: u32,
    api_key: Option<String>,
}

impl AnthropicJudge {
    pub fn new(config: &JudgeConfig) -> Result<Self> {
        Self::with_api_key(config, config.resolve_api_key())
    }

    /// Build with an already-resolved key; `None` leaves sessions ungraded.
    pub fn with_api_key(config: &JudgeConfig, api_key: Option<String>) -> Result<Self> {
        let client = reqwest::Client::builder()
            .build()
            .context("Failed to build HTTP client for judge")?;

        if api_key.is_none() {
            info!("No judge API key configured; sessions will not be graded");
        }

        info!(
            "Initialized judge with model {} at {}",
            config.model, config.endpoint
        );

        Ok(Self {
            client,
            endpoint: config.endpoint.clone(),
            model: config.model.clone(),
            max_tokens: config.max_tokens,
            api_key,
        })
    }

    async fn send(&self, api_key: &str, prompt: String) -> Result<String, JudgeError> {
        let body = MessagesRequest {
            model: &self.model,
            max_tokens: self.max_tokens,
            messages: vec![Message {
                role: "user",
                content: prompt,
            }],
        };

        let response = self
            .client
            .post(&self.endpoint)
            .header("x-api-key", api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .json(&body)
            .send()
            .await
            .map_err(|e| JudgeError::Request(e.to_string()))?;

        let status = response.status();
        let response_text = response
            .text()
            .await
            .map_err(|e| JudgeError::Request(format!("failed to read response body: {}", e)))?;

        if !status.is_success() {
            error!(
                "Judge request failed with status {}: {}",
                status, response_text
            );
            return Err(decode_error(status, &response_text));
        }

        first_text_block(&response_text)
    }
}

fn decode_error(status: reqwest::StatusCode, body: &str) -> JudgeError {
    match serde_json::from_str::<ErrorResponse>(body) {
        Ok(error_response) => JudgeError::Api {
            kind: error_response.error.r#type,
            message: error_response.error.message,
        },
        Err(_) => JudgeError::Api {
            kind: format!("http_{}", status.as_u16()),
            message: body.trim().to_string(),
        },
    }
}

fn first_text_block(body: &str) -> Result<String, JudgeError> {
    let parsed: MessagesResponse = serde_json::from_str(body)
        .map_err(|e| JudgeError::Response(format!("invalid JSON: {}", e)))?;

    parsed
        .content
        .into_iter()
        .find(|block| block.r#type == "text")
        .and_then(|block| block.text)
        .ok_or_else(|| JudgeError::Response("no text content in reply".to_string()))
}

#[async_trait]
impl JudgeService for AnthropicJudge {
    fn has_credential(&self) -> bool {
        self.api_key.is_some()
    }

    async fn evaluate(
        &self,
        transcript: &str,
        education: &str,
        subject: &str,
        timeout: Duration,
    ) -> Result<String, JudgeError> {
        let api_key = self.api_key.as_deref().ok_or(JudgeError::MissingCredential)?;

        info!(
            "Requesting evaluation of {} chars of transcript",
            transcript.len()
        );
        let prompt = build_prompt(transcript, education, subject);

        let text = tokio::time::timeout(timeout, self.send(api_key, prompt))
            .await
            .map_err(|_| JudgeError::Timeout(timeout.as_secs()))??;

        debug!("Judge reply: {}", text);
        Ok(text)
    }
}
