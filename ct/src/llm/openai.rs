//! OpenAI-compatible API client implementation
//!
//! Implements the LlmClient trait for the Chat Completions API. The default
//! configuration points at DashScope's compatible mode, but any endpoint that
//! speaks the same protocol works.

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, warn};

use super::{CompletionRequest, CompletionResponse, ContentBlock, LlmClient, LlmError, Message, MessageContent};
use super::{StopReason, TokenUsage};
use crate::config::LlmConfig;

/// Initial backoff delay for transport retries
const INITIAL_BACKOFF_MS: u64 = 1000;

/// OpenAI-compatible API client
pub struct OpenAIClient {
    model: String,
    api_key: String,
    base_url: String,
    http: Client,
    max_tokens: u32,
    transport_retries: u32,
}

impl OpenAIClient {
    /// Create a new client from configuration, reading the key from the environment
    pub fn from_config(config: &LlmConfig) -> Result<Self, LlmError> {
        debug!(provider = %config.provider, model = %config.model, "from_config: called");
        let api_key =
            std::env::var(&config.api_key_env).map_err(|_| LlmError::MissingApiKey(config.api_key_env.clone()))?;
        Self::with_key(config, api_key)
    }

    /// Create a new client with an explicit API key
    pub fn with_key(config: &LlmConfig, api_key: impl Into<String>) -> Result<Self, LlmError> {
        let timeout = Duration::from_millis(config.timeout_ms);
        let http = Client::builder().timeout(timeout).build().map_err(LlmError::Network)?;

        Ok(Self {
            model: config.model.clone(),
            api_key: api_key.into(),
            base_url: config.base_url.trim_end_matches('/').to_string(),
            http,
            max_tokens: config.max_tokens,
            transport_retries: config.transport_retries,
        })
    }

    /// Build the request body for the chat completions endpoint
    fn build_request_body(&self, request: &CompletionRequest) -> serde_json::Value {
        let model = request.model.as_deref().unwrap_or(&self.model);
        debug!(%model, %request.max_tokens, json_mode = request.json_mode, "build_request_body: called");

        let mut messages = vec![serde_json::json!({
            "role": "system",
            "content": request.system_prompt,
        })];
        messages.extend(request.messages.iter().map(convert_message));

        let mut body = serde_json::json!({
            "model": model,
            "messages": messages,
            "max_tokens": request.max_tokens.min(self.max_tokens),
        });

        if request.json_mode {
            debug!("build_request_body: requesting json_object response format");
            body["response_format"] = serde_json::json!({ "type": "json_object" });
        }

        body
    }

    /// Parse the API response
    fn parse_response(&self, api_response: OpenAIResponse) -> Result<CompletionResponse, LlmError> {
        debug!(choice_count = api_response.choices.len(), "parse_response: called");
        let choice = api_response
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| LlmError::InvalidResponse("response contained no choices".to_string()))?;

        let usage = api_response
            .usage
            .map(|u| TokenUsage {
                input_tokens: u.prompt_tokens,
                output_tokens: u.completion_tokens,
            })
            .unwrap_or_default();

        Ok(CompletionResponse {
            content: choice.message.content,
            stop_reason: StopReason::from_openai(choice.finish_reason.as_deref()),
            usage,
        })
    }
}

/// Convert an internal message to the chat completions wire format
fn convert_message(msg: &Message) -> serde_json::Value {
    let role = msg.role.as_str();

    match &msg.content {
        MessageContent::Text(text) => serde_json::json!({
            "role": role,
            "content": text,
        }),
        MessageContent::Blocks(blocks) => {
            debug!(block_count = %blocks.len(), "convert_message: blocks content");
            let parts: Vec<serde_json::Value> = blocks
                .iter()
                .map(|block| match block {
                    ContentBlock::Text { text } => serde_json::json!({ "type": "text", "text": text }),
                    ContentBlock::Image { url } => serde_json::json!({ "type": "image_url", "image_url": { "url": url } }),
                })
                .collect();
            serde_json::json!({
                "role": role,
                "content": parts,
            })
        }
    }
}

#[async_trait]
impl LlmClient for OpenAIClient {
    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse, LlmError> {
        debug!(%self.model, %request.max_tokens, "complete: called");
        let url = format!("{}/v1/chat/completions", self.base_url);
        let body = self.build_request_body(&request);

        let mut last_error = None;
        for attempt in 0..=self.transport_retries {
            if attempt > 0 {
                let backoff = INITIAL_BACKOFF_MS * 2u64.pow(attempt - 1);
                warn!(attempt, backoff_ms = backoff, "complete: retrying after transient error");
                tokio::time::sleep(Duration::from_millis(backoff)).await;
            }

            let response = match self
                .http
                .post(url.clone())
                .header("Authorization", format!("Bearer {}", self.api_key))
                .header("content-type", "application/json")
                .json(&body)
                .send()
                .await
            {
                Ok(r) => r,
                Err(e) => {
                    debug!(attempt, error = %e, "complete: network error");
                    last_error = Some(LlmError::Network(e));
                    continue;
                }
            };

            let status = response.status().as_u16();

            if status == 429 {
                debug!("complete: rate limited (429)");
                let retry_after = response
                    .headers()
                    .get("retry-after")
                    .and_then(|v| v.to_str().ok())
                    .and_then(|s| s.parse::<u64>().ok())
                    .unwrap_or(60);

                return Err(LlmError::RateLimited {
                    retry_after: Duration::from_secs(retry_after),
                });
            }

            if !response.status().is_success() {
                let text = response.text().await.unwrap_or_default();
                let err = LlmError::ApiError { status, message: text };
                if err.is_retryable() && attempt < self.transport_retries {
                    debug!(attempt, status, "complete: retryable error");
                    last_error = Some(err);
                    continue;
                }
                debug!(%status, "complete: API error");
                return Err(err);
            }

            debug!("complete: success");
            let api_response: OpenAIResponse = response.json().await?;
            return self.parse_response(api_response);
        }

        Err(last_error.unwrap_or_else(|| LlmError::InvalidResponse("Max retries exceeded".to_string())))
    }
}

// Chat completions response types

#[derive(Debug, Deserialize)]
struct OpenAIResponse {
    choices: Vec<OpenAIChoice>,
    #[serde(default)]
    usage: Option<OpenAIUsage>,
}

#[derive(Debug, Deserialize)]
struct OpenAIChoice {
    message: OpenAIMessage,
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct OpenAIMessage {
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct OpenAIUsage {
    prompt_tokens: u64,
    completion_tokens: u64,
}
