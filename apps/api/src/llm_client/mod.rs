/// LLM Client: the single point of entry for all model calls in the floor-plan API.
///
/// ARCHITECTURAL RULE: No other module may call OpenRouter directly.
/// All model interactions MUST go through this module, usually via the
/// `PlanModel` trait so tests can substitute a scripted model.
///
/// Model: anthropic/claude-3.7-sonnet via OpenRouter (hardcoded to prevent drift)
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, warn};

pub mod stream;

use stream::{CompletionStream, FragmentSource};

/// The model used for all floor-plan generation calls.
pub const MODEL: &str = "anthropic/claude-3.7-sonnet";
const TEMPERATURE: f32 = 0.2;
/// Large enough for the reasoning text plus a complete partition tree.
const MAX_TOKENS: u32 = 4000;
const MAX_RETRIES: u32 = 3;
const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);
const REFERER: &str = "https://floorplan-generator.com";
const APP_TITLE: &str = "LLM Floor Plan Generator";

#[derive(Debug, Error)]
pub enum LlmError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("API error (status {status}): {message}")]
    Api { status: u16, message: String },

    #[error("JSON parse error: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Rate limited after {retries} retries")]
    RateLimited { retries: u32 },

    #[error("LLM returned empty content")]
    EmptyContent,

    #[error("No response from the model within {secs}s")]
    Timeout { secs: u64 },

    #[error("Stream error: {0}")]
    Stream(String),
}

impl LlmError {
    /// Upstream HTTP status, when the failure carried one.
    pub fn status(&self) -> Option<u16> {
        match self {
            LlmError::Api { status, .. } => Some(*status),
            LlmError::Http(e) => e.status().map(|s| s.as_u16()),
            _ => None,
        }
    }
}

/// Anything that can turn a prompt into model text, whole or streamed.
#[async_trait]
pub trait PlanModel: Send + Sync {
    async fn complete(&self, system: &str, prompt: &str) -> Result<String, LlmError>;

    async fn open_stream(
        &self,
        system: &str,
        prompt: &str,
    ) -> Result<Box<dyn FragmentSource>, LlmError>;
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    temperature: f32,
    max_tokens: u32,
    stream: bool,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
pub struct ChatResponse {
    pub choices: Vec<Choice>,
    pub usage: Option<Usage>,
}

#[derive(Debug, Deserialize)]
pub struct Choice {
    pub message: ChoiceMessage,
}

#[derive(Debug, Deserialize)]
pub struct ChoiceMessage {
    pub content: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct Usage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
}

impl ChatResponse {
    /// Text of the first choice, if any.
    pub fn text(&self) -> Option<&str> {
        self.choices
            .first()
            .and_then(|c| c.message.content.as_deref())
    }
}

#[derive(Debug, Deserialize)]
struct ApiErrorEnvelope {
    error: ApiErrorBody,
}

#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    message: String,
}

/// OpenRouter chat-completions client with retry logic and a streaming mode.
#[derive(Clone)]
pub struct LlmClient {
    client: Client,
    api_key: String,
    base_url: String,
    timeout: Duration,
}

impl LlmClient {
    /// `timeout` bounds a whole non-streaming call, and each idle gap between
    /// chunks of a streaming call.
    pub fn new(api_key: String, base_url: String, timeout: Duration) -> Result<Self, LlmError> {
        Ok(Self {
            client: Client::builder().connect_timeout(CONNECT_TIMEOUT).build()?,
            api_key,
            base_url: base_url.trim_end_matches('/').to_string(),
            timeout,
        })
    }

    fn completions_url(&self) -> String {
        format!("{}/chat/completions", self.base_url)
    }

    fn request(&self, body: &ChatRequest<'_>) -> reqwest::RequestBuilder {
        self.client
            .post(self.completions_url())
            .bearer_auth(self.api_key.trim())
            .header("HTTP-Referer", REFERER)
            .header("X-Title", APP_TITLE)
            .json(body)
    }

    /// Makes a non-streaming call and returns the first choice's text.
    /// Retries on 429 (rate limit) and 5xx errors with exponential backoff.
    pub async fn call(&self, system: &str, prompt: &str) -> Result<String, LlmError> {
        let request_body = chat_request(system, prompt, false);
        let mut last_error: Option<LlmError> = None;

        for attempt in 0..MAX_RETRIES {
            if attempt > 0 {
                // Exponential backoff: 1s, 2s
                let delay = Duration::from_millis(1000 * (1 << (attempt - 1)));
                warn!(
                    "LLM call attempt {} failed, retrying after {}ms...",
                    attempt,
                    delay.as_millis()
                );
                tokio::time::sleep(delay).await;
            }

            let response = self.request(&request_body).timeout(self.timeout).send().await;

            let response = match response {
                Ok(r) => r,
                Err(e) if e.is_timeout() => {
                    last_error = Some(LlmError::Timeout {
                        secs: self.timeout.as_secs(),
                    });
                    continue;
                }
                Err(e) => {
                    last_error = Some(LlmError::Http(e));
                    continue;
                }
            };

            let status = response.status();

            if status.as_u16() == 429 || status.is_server_error() {
                let body = response.text().await.unwrap_or_default();
                warn!("LLM API returned {}: {}", status, body);
                last_error = Some(LlmError::Api {
                    status: status.as_u16(),
                    message: body,
                });
                continue;
            }

            if !status.is_success() {
                return Err(api_error(response).await);
            }

            let chat: ChatResponse = response.json().await?;

            if let Some(usage) = &chat.usage {
                debug!(
                    "LLM call succeeded: prompt_tokens={}, completion_tokens={}",
                    usage.prompt_tokens, usage.completion_tokens
                );
            }

            return chat
                .text()
                .filter(|t| !t.trim().is_empty())
                .map(str::to_string)
                .ok_or(LlmError::EmptyContent);
        }

        Err(last_error.unwrap_or(LlmError::RateLimited {
            retries: MAX_RETRIES,
        }))
    }

    /// Opens a streaming call. Not retried: fragments may already have reached
    /// the caller by the time a failure is seen.
    pub async fn stream(&self, system: &str, prompt: &str) -> Result<CompletionStream, LlmError> {
        let request_body = chat_request(system, prompt, true);

        let response = tokio::time::timeout(self.timeout, self.request(&request_body).send())
            .await
            .map_err(|_| LlmError::Timeout {
                secs: self.timeout.as_secs(),
            })??;

        if !response.status().is_success() {
            return Err(api_error(response).await);
        }

        debug!("Streaming LLM response opened");
        Ok(CompletionStream::new(response, self.timeout))
    }
}

#[async_trait]
impl PlanModel for LlmClient {
    async fn complete(&self, system: &str, prompt: &str) -> Result<String, LlmError> {
        self.call(system, prompt).await
    }

    async fn open_stream(
        &self,
        system: &str,
        prompt: &str,
    ) -> Result<Box<dyn FragmentSource>, LlmError> {
        Ok(Box::new(self.stream(system, prompt).await?))
    }
}

fn chat_request<'a>(system: &'a str, prompt: &'a str, stream: bool) -> ChatRequest<'a> {
    ChatRequest {
        model: MODEL,
        messages: vec![
            ChatMessage {
                role: "system",
                content: system,
            },
            ChatMessage {
                role: "user",
                content: prompt,
            },
        ],
        temperature: TEMPERATURE,
        max_tokens: MAX_TOKENS,
        stream,
    }
}

/// Converts a non-success response into `LlmError::Api`, preferring the
/// provider's own error message when the body carries one.
async fn api_error(response: reqwest::Response) -> LlmError {
    let status = response.status().as_u16();
    let body = response.text().await.unwrap_or_default();
    let message = serde_json::from_str::<ApiErrorEnvelope>(&body)
        .map(|e| e.error.message)
        .unwrap_or(body);
    LlmError::Api { status, message }
}
