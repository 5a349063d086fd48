//! Completion capability.
//!
//! [`Completer`] is the seam between the pipelines and the LLM service:
//! `complete(prompt, options) → text`. The concrete [`ChatCompletionsClient`]
//! speaks the OpenAI-compatible `POST {base_url}/chat/completions` protocol,
//! which covers Groq, OpenAI, vLLM, and Ollama's `/v1` endpoint.
//!
//! # Retry Strategy
//!
//! Same policy as the embedding providers:
//! - HTTP 429 (rate limited) and 5xx (server error) → retry
//! - HTTP 4xx (client error, not 429) → fail immediately
//! - Network errors → retry
//! - Backoff: 1s, 2s, 4s, … (capped at 2^5)
//!
//! Callers never retry on top of this; an `Err` here is final for the
//! operation that issued it.

use async_trait::async_trait;
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;

use crate::config::LlmConfig;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CompletionOptions {
    pub temperature: f32,
    pub max_output_tokens: u32,
}

#[derive(Debug, thiserror::Error)]
pub enum CompletionError {
    #[error("LLM client not configured (missing {0})")]
    NotConfigured(String),

    #[error("LLM request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("LLM API error {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Invalid LLM response: {0}")]
    InvalidResponse(String),
}

#[async_trait]
pub trait Completer: Send + Sync {
    /// Returns the model identifier (e.g. `"llama-3.1-70b-versatile"`).
    fn model_name(&self) -> &str;

    async fn complete(
        &self,
        prompt: &str,
        options: &CompletionOptions,
    ) -> Result<String, CompletionError>;
}

/// Client for OpenAI-compatible chat completion APIs.
pub struct ChatCompletionsClient {
    client: reqwest::Client,
    base_url: String,
    model: String,
    api_key: String,
    max_retries: u32,
}

impl ChatCompletionsClient {
    pub fn new(config: &LlmConfig, api_key: String) -> Result<Self, CompletionError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;
        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            model: config.model.clone(),
            api_key,
            max_retries: config.max_retries,
        })
    }
}

#[async_trait]
impl Completer for ChatCompletionsClient {
    fn model_name(&self) -> &str {
        &self.model
    }

    async fn complete(
        &self,
        prompt: &str,
        options: &CompletionOptions,
    ) -> Result<String, CompletionError> {
        let body = serde_json::json!({
            "model": self.model,
            "messages": [{ "role": "user", "content": prompt }],
            "temperature": options.temperature,
            "max_tokens": options.max_output_tokens,
        });
        let url = format!("{}/chat/completions", self.base_url);

        let mut last_err = None;

        for attempt in 0..=self.max_retries {
            if attempt > 0 {
                let delay = Duration::from_secs(1 << (attempt - 1).min(5));
                tracing::debug!(attempt, delay_secs = delay.as_secs(), "Retrying completion");
                tokio::time::sleep(delay).await;
            }

            let resp = self
                .client
                .post(&url)
                .bearer_auth(&self.api_key)
                .json(&body)
                .send()
                .await;

            match resp {
                Ok(response) => {
                    let status = response.status();

                    if status.is_success() {
                        let json: serde_json::Value = response.json().await?;
                        return parse_chat_response(json);
                    }

                    let body_text = response.text().await.unwrap_or_default();
                    let err = CompletionError::Status {
                        status: status.as_u16(),
                        body: body_text,
                    };

                    if status.as_u16() == 429 || status.is_server_error() {
                        tracing::warn!(status = status.as_u16(), "Completion request rejected, will retry");
                        last_err = Some(err);
                        continue;
                    }

                    return Err(err);
                }
                Err(e) => {
                    tracing::warn!(error = %e, "Completion request failed");
                    last_err = Some(e.into());
                    continue;
                }
            }
        }

        Err(last_err.unwrap_or_else(|| {
            CompletionError::InvalidResponse("completion failed after retries".to_string())
        }))
    }
}

#[derive(Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: ChoiceMessage,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Deserialize)]
struct ChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

/// Pull `choices[0].message.content` out of a chat completion response.
///
/// A `null` content is returned as an empty string.
fn parse_chat_response(json: serde_json::Value) -> Result<String, CompletionError> {
    let response: ChatResponse = serde_json::from_value(json)
        .map_err(|e| CompletionError::InvalidResponse(e.to_string()))?;
    let choice = response
        .choices
        .into_iter()
        .next()
        .ok_or_else(|| CompletionError::InvalidResponse("missing choices".to_string()))?;

    if choice.finish_reason.as_deref() == Some("length") {
        tracing::warn!("Completion stopped at the max token limit; output is truncated");
    }

    Ok(choice.message.content.unwrap_or_default())
}

/// Build the configured completion client, reading the API key from the
/// environment variable named by `llm.api_key_env`.
pub fn create_completer(config: &LlmConfig) -> Result<Arc<dyn Completer>, CompletionError> {
    let api_key = std::env::var(&config.api_key_env)
        .map_err(|_| CompletionError::NotConfigured(config.api_key_env.clone()))?;
    Ok(Arc::new(ChatCompletionsClient::new(config, api_key)?))
}
