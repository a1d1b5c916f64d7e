//! Anthropic (Claude) streaming reply source for Riposte
//!
//! Talks to the Messages API over Server-Sent Events and relays text deltas
//! into the harness token stream as they arrive. Usage comes from the
//! `message_delta` event when the API reports it, with a local word-count
//! estimate as the backstop.

#![warn(missing_docs)]
#![warn(clippy::all)]

use async_trait::async_trait;
use reqwest::Client;
use riposte_core::streaming::{CancelToken, StreamHandler};
use riposte_core::types::{
    estimate_tokens, HistoryRole, ReplyRequest, ReplySource, ReplyUsage,
};
use riposte_core::{get_env_or, get_required_env, load_env, Result, RiposteError};
use serde::{Deserialize, Serialize};
use std::sync::OnceLock;
use tracing::{debug, warn};

/// Default Claude model for persona replies
pub const DEFAULT_MODEL: &str = "claude-3-5-sonnet-20241022";

/// Reply length cap in output tokens
pub const DEFAULT_MAX_TOKENS: usize = 1024;

/// Shared HTTP client for connection pooling
static HTTP_CLIENT: OnceLock<Client> = OnceLock::new();

/// Get or initialize the shared HTTP client
fn get_http_client() -> Client {
    HTTP_CLIENT
        .get_or_init(|| {
            Client::builder()
                .pool_max_idle_per_host(50)
                .pool_idle_timeout(std::time::Duration::from_secs(300))
                .tcp_keepalive(std::time::Duration::from_secs(60))
                .timeout(std::time::Duration::from_secs(120))
                .build()
                .expect("Failed to create HTTP client")
        })
        .clone()
}

/// Live reply source backed by the Anthropic Messages API
pub struct AnthropicReplySource {
    client: Client,
    api_key: String,
    base_url: String,
    model: String,
    max_tokens: usize,
}

impl AnthropicReplySource {
    /// Create a source with an explicit API key
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            client: get_http_client(),
            api_key: api_key.into(),
            base_url: "https://api.anthropic.com/v1".to_string(),
            model: DEFAULT_MODEL.to_string(),
            max_tokens: DEFAULT_MAX_TOKENS,
        }
    }

    /// Create a source from the environment
    ///
    /// Loads a `.env` file when one is present. Requires `ANTHROPIC_API_KEY`;
    /// `RIPOSTE_ANTHROPIC_MODEL` overrides the default model when set.
    pub fn from_env() -> Result<Self> {
        load_env()?;
        let api_key = get_required_env("ANTHROPIC_API_KEY")?;
        let model = get_env_or("RIPOSTE_ANTHROPIC_MODEL", DEFAULT_MODEL);
        Ok(Self::new(api_key).with_model(model))
    }

    /// Override the model identifier
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    /// Override the API base URL (tests, proxies)
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// One-shot, non-streaming completion
    ///
    /// Returns the full reply text with its token usage. The streaming path
    /// is preferred; this exists for callers that want the whole blob.
    pub async fn complete(&self, request: &ReplyRequest) -> Result<(String, ReplyUsage)> {
        let mut body = self.build_request(request);
        body.stream = false;

        let resp = self
            .client
            .post(format!("{}/messages", self.base_url))
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", "2023-06-01")
            .header("content-type", "application/json")
            .json(&body)
            .send()
            .await
            .map_err(|e| RiposteError::provider(e.to_string()))?;

        if !resp.status().is_success() {
            let status = resp.status();
            let error_text = resp.text().await.unwrap_or_default();
            return Err(RiposteError::provider(format!(
                "Anthropic API error ({}): {}",
                status, error_text
            )));
        }

        let parsed: MessagesResponse = resp
            .json()
            .await
            .map_err(|e| RiposteError::provider(e.to_string()))?;
        let text: String = parsed
            .content
            .iter()
            .map(|block| block.text.as_str())
            .collect();
        if text.is_empty() {
            return Err(RiposteError::provider("Empty completion from API"));
        }
        let tokens_used = parsed
            .usage
            .map(|u| u.output_tokens)
            .unwrap_or_else(|| estimate_tokens(&text));
        Ok((text, ReplyUsage { tokens_used }))
    }

    fn build_request(&self, request: &ReplyRequest) -> MessagesRequest {
        let mut messages: Vec<ApiMessage> = request
            .history
            .iter()
            .map(|turn| ApiMessage {
                role: match turn.role {
                    HistoryRole::User => "user",
                    HistoryRole::Assistant => "assistant",
                },
                content: turn.content.clone(),
            })
            .collect();
        messages.push(ApiMessage {
            role: "user",
            content: request.user_turn.clone(),
        });
        MessagesRequest {
            model: self.model.clone(),
            max_tokens: self.max_tokens,
            system: request.system_prompt.clone(),
            messages,
            stream: true,
        }
    }
}

#[derive(Debug, Serialize)]
struct MessagesRequest {
    model: String,
    max_tokens: usize,
    system: String,
    messages: Vec<ApiMessage>,
    stream: bool,
}

#[derive(Debug, Serialize)]
struct ApiMessage {
    role: &'static str,
    content: String,
}

#[derive(Debug, Deserialize)]
struct MessagesResponse {
    content: Vec<ContentBlock>,
    usage: Option<ApiUsage>,
}

#[derive(Debug, Deserialize)]
struct ContentBlock {
    #[serde(default)]
    text: String,
}

#[derive(Debug, Deserialize)]
struct ApiUsage {
    output_tokens: usize,
}

#[async_trait]
impl ReplySource for AnthropicReplySource {
    fn name(&self) -> &str {
        "anthropic"
    }

    async fn stream_reply(
        &self,
        request: &ReplyRequest,
        handler: &StreamHandler,
        cancel: &CancelToken,
    ) -> Result<ReplyUsage> {
        if cancel.is_cancelled() {
            return Err(RiposteError::Cancelled);
        }

        let body = self.build_request(request);
        let mut resp = self
            .client
            .post(format!("{}/messages", self.base_url))
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", "2023-06-01")
            .header("accept", "text/event-stream")
            .header("content-type", "application/json")
            .json(&body)
            .send()
            .await
            .map_err(|e| RiposteError::provider(e.to_string()))?;

        if !resp.status().is_success() {
            let status = resp.status();
            let error_text = resp.text().await.unwrap_or_default();
            return Err(RiposteError::provider(format!(
                "Anthropic API error ({}): {}",
                status, error_text
            )));
        }

        let mut assembled = String::new();
        let mut reported_tokens: Option<usize> = None;
        let mut buffer = String::new();
        loop {
            let chunk = match resp.chunk().await {
                Ok(Some(chunk)) => chunk,
                Ok(None) => break,
                Err(e) => return Err(RiposteError::provider(e.to_string())),
            };
            buffer.push_str(&String::from_utf8_lossy(&chunk));

            let mut parts: Vec<&str> = buffer.split('\n').collect();
            let tail = parts.pop().unwrap_or("");
            for line in &parts {
                let line = line.trim();
                if !line.starts_with("data:") {
                    continue;
                }
                let payload = line.trim_start_matches("data:").trim();
                if payload.is_empty() {
                    continue;
                }
                let json: serde_json::Value = match serde_json::from_str(payload) {
                    Ok(json) => json,
                    Err(e) => {
                        warn!("Skipping malformed SSE payload: {}", e);
                        continue;
                    }
                };
                match json.get("type").and_then(|v| v.as_str()) {
                    Some("content_block_delta") => {
                        if let Some(text) = json
                            .get("delta")
                            .and_then(|d| d.get("text"))
                            .and_then(|t| t.as_str())
                        {
                            if cancel.is_cancelled() {
                                return Err(RiposteError::Cancelled);
                            }
                            assembled.push_str(text);
                            handler.send_token(text).await?;
                        }
                    }
                    Some("message_delta") => {
                        if let Some(output_tokens) = json
                            .get("usage")
                            .and_then(|u| u.get("output_tokens"))
                            .and_then(|t| t.as_u64())
                        {
                            reported_tokens = Some(output_tokens as usize);
                        }
                    }
                    Some("message_stop") | Some("content_block_stop") => {}
                    _ => {}
                }
            }
            buffer = tail.to_string();
        }

        if assembled.is_empty() {
            return Err(RiposteError::provider("Stream ended without content"));
        }
        debug!(
            model = %self.model,
            tokens = ?reported_tokens,
            "✓ Claude stream complete"
        );
        Ok(ReplyUsage {
            tokens_used: reported_tokens.unwrap_or_else(|| estimate_tokens(&assembled)),
        })
    }
}
