use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::Context;
use reqwest::blocking::Client as HttpClient;
use reqwest::header::CONTENT_TYPE;
use serde_json::{json, Value};

use crate::config::ChatCompletionConfig;

#[derive(Debug, thiserror::Error)]
pub enum GenerationError {
    #[error("generation request timed out after {0:?}")]
    Timeout(Duration),
    #[error("generation request failed: {0}")]
    Transport(String),
    #[error("generation provider returned {status}: {body}")]
    Status { status: u16, body: String },
    #[error("generation provider returned an unreadable payload: {0}")]
    InvalidResponse(String),
}

/// Turns a prompt into raw model text.
pub trait TextGenerator: Send + Sync {
    fn generate(&self, prompt: &str) -> Result<String, GenerationError>;
}

impl<T: TextGenerator + ?Sized> TextGenerator for Arc<T> {
    fn generate(&self, prompt: &str) -> Result<String, GenerationError> {
        (**self).generate(prompt)
    }
}

/// OpenAI-compatible chat-completion client. One `generate` call is exactly
/// one POST; nothing is cached or retried.
pub struct ChatCompletionClient {
    config: ChatCompletionConfig,
    http: HttpClient,
}

impl ChatCompletionClient {
    pub fn new(config: ChatCompletionConfig) -> anyhow::Result<Self> {
        let http = HttpClient::builder()
            .timeout(config.timeout)
            .build()
            .context("failed to build generation http client")?;
        Ok(Self { config, http })
    }

    fn payload(&self, prompt: &str) -> Value {
        json!({
            "model": self.config.model,
            "messages": [{"role": "user", "content": prompt}],
            "temperature": self.config.temperature,
        })
    }

    fn classify(&self, err: reqwest::Error) -> GenerationError {
        if err.is_timeout() {
            GenerationError::Timeout(self.config.timeout)
        } else {
            GenerationError::Transport(error_chain_text(&err, 512))
        }
    }
}

impl TextGenerator for ChatCompletionClient {
    fn generate(&self, prompt: &str) -> Result<String, GenerationError> {
        let started = Instant::now();
        let response = self
            .http
            .post(self.config.endpoint())
            .bearer_auth(&self.config.api_key)
            .header(CONTENT_TYPE, "application/json")
            .json(&self.payload(prompt))
            .send()
            .map_err(|err| self.classify(err))?;
        let status = response.status();
        let body = response.text().map_err(|err| self.classify(err))?;
        if !status.is_success() {
            return Err(GenerationError::Status {
                status: status.as_u16(),
                body: truncate_text(&body, 512),
            });
        }
        let parsed: Value = serde_json::from_str(&body)
            .map_err(|err| GenerationError::InvalidResponse(err.to_string()))?;
        let content = first_choice_content(&parsed);
        tracing::info!(
            model = %self.config.model,
            elapsed_ms = elapsed_ms(started),
            chars = content.len(),
            "generation response received"
        );
        Ok(content)
    }
}

/// `choices[0].message.content`, or an empty string when the payload has a
/// different shape.
pub fn first_choice_content(response: &Value) -> String {
    response
        .pointer("/choices/0/message/content")
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string()
}

fn error_chain_text(err: &(dyn std::error::Error + 'static), max_chars: usize) -> String {
    let mut parts: Vec<String> = Vec::new();
    let mut current = Some(err);
    while let Some(cause) = current {
        let text = cause.to_string();
        let trimmed = text.trim();
        if !trimmed.is_empty() && parts.last().map(|last| last != trimmed).unwrap_or(true) {
            parts.push(trimmed.to_string());
        }
        current = cause.source();
    }
    truncate_text(&parts.join(" | caused by: "), max_chars)
}

pub(crate) fn elapsed_ms(started: Instant) -> u64 {
    u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX)
}

pub(crate) fn truncate_text(value: &str, max_chars: usize) -> String {
    if value.chars().count() <= max_chars {
        return value.to_string();
    }
    value.chars().take(max_chars).collect::<String>() + "…"
}
