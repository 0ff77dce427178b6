//! OpenAI-compatible completion client
//!
//! Speaks the chat completions protocol in both one-shot and streamed
//! form. Streamed responses are decoded with [`SseStreamParser`] into a
//! flat stream of content deltas.

use super::sse::{SseEvent, SseStreamParser};
use super::types::{CompletionRequest, CompletionResponse};
use super::{CompletionClient, DeltaStream, LlmError};
use async_trait::async_trait;
use futures::future::ready;
use futures::StreamExt;
use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;

const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1/chat/completions";

pub struct OpenAiClient {
    client: Client,
    api_key: String,
    base_url: String,
}

impl OpenAiClient {
    /// Build a client. `proxy` routes all provider traffic when set.
    pub fn new(api_key: impl Into<String>, proxy: Option<&str>) -> Result<Self, LlmError> {
        let mut builder = Client::builder().timeout(Duration::from_secs(300));

        if let Some(proxy_url) = proxy.filter(|p| !p.is_empty()) {
            let proxy = reqwest::Proxy::all(proxy_url)
                .map_err(|e| LlmError::invalid_request(format!("Invalid proxy URL: {e}")))?;
            builder = builder.proxy(proxy);
        }

        let client = builder
            .build()
            .map_err(|e| LlmError::unknown(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self {
            client,
            api_key: api_key.into(),
            base_url: DEFAULT_BASE_URL.to_string(),
        })
    }

    async fn send(&self, request: &CompletionRequest) -> Result<reqwest::Response, LlmError> {
        let response = self
            .client
            .post(&self.base_url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
            .json(request)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    LlmError::network(format!("Request timeout: {e}"))
                } else if e.is_connect() {
                    LlmError::network(format!("Connection failed: {e}"))
                } else {
                    LlmError::unknown(format!("Request failed: {e}"))
                }
            })?;

        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = response
            .text()
            .await
            .map_err(|e| LlmError::network(format!("Failed to read response: {e}")))?;

        if let Ok(error_resp) = serde_json::from_str::<ApiErrorResponse>(&body) {
            let message = error_resp.error.message;
            return Err(match status.as_u16() {
                401 | 403 => LlmError::auth(format!("Authentication failed: {message}")),
                429 => LlmError::rate_limit(format!("Rate limit exceeded: {message}")),
                400 => LlmError::invalid_request(format!("Invalid request: {message}")),
                500..=599 => LlmError::server_error(format!("Server error: {message}")),
                _ => LlmError::unknown(format!("HTTP {status}: {message}")),
            });
        }
        Err(LlmError::unknown(format!("HTTP {status} error: {body}")))
    }
}

#[async_trait]
impl CompletionClient for OpenAiClient {
    async fn complete(&self, request: &CompletionRequest) -> Result<String, LlmError> {
        debug_assert!(!request.stream);
        let response = self.send(request).await?;

        let body = response
            .text()
            .await
            .map_err(|e| LlmError::network(format!("Failed to read response: {e}")))?;

        let parsed: CompletionResponse = serde_json::from_str(&body).map_err(|e| {
            LlmError::unknown(format!("Failed to parse response: {e} - body: {body}"))
        })?;

        let choice = parsed
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| LlmError::unknown("No choices in response"))?;

        Ok(choice.message.content.unwrap_or_default())
    }

    async fn complete_stream(&self, request: &CompletionRequest) -> Result<DeltaStream, LlmError> {
        debug_assert!(request.stream);
        let response = self.send(request).await?;

        let deltas = response
            .bytes_stream()
            .map(|chunk| chunk.map_err(|e| LlmError::network(format!("Stream read failed: {e}"))))
            .scan(SseStreamParser::default(), |parser, chunk| {
                let events: Vec<Result<SseEvent, LlmError>> = match chunk {
                    Ok(bytes) => parser.feed(&bytes).into_iter().map(Ok).collect(),
                    Err(e) => vec![Err(e)],
                };
                ready(Some(futures::stream::iter(events)))
            })
            .flatten()
            .take_while(|event| ready(!matches!(event, Ok(SseEvent::Done))))
            .filter_map(|event| {
                ready(match event {
                    Ok(SseEvent::Delta(delta)) => Some(Ok(delta)),
                    Ok(SseEvent::Done) => None,
                    Err(e) => Some(Err(e)),
                })
            })
            .boxed();

        Ok(deltas)
    }
}

#[derive(Debug, Deserialize)]
struct ApiErrorResponse {
    error: ApiError,
}

#[derive(Debug, Deserialize)]
struct ApiError {
    message: String,
}
