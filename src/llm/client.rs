use std::time::Duration;

use reqwest::{Client, StatusCode};
use tracing::{debug, warn};

use super::types::{ApiError, ChatMessage, ChatRequest, ChatResponse, Sampling};
use crate::config::{ApiKey, LlmConfig};

#[derive(Debug, thiserror::Error)]
pub enum LlmError {
    #[error("LLM rate limit exceeded")]
    RateLimited,

    #[error("LLM authentication failed: {0}")]
    Unauthorized(String),

    #[error("LLM API error ({code}): {message}")]
    Api { code: u16, message: String },

    #[error("LLM request failed: {0}")]
    Network(#[from] reqwest::Error),

    #[error("LLM returned no completion text")]
    Empty,
}

/// A chat-completion endpoint. `OpenAiClient` in production; scripted mocks in tests.
pub trait CompletionClient {
    async fn complete(
        &self,
        messages: &[ChatMessage],
        sampling: Sampling,
    ) -> Result<String, LlmError>;
}

/// Client for any OpenAI-compatible `/chat/completions` endpoint.
#[derive(Clone)]
pub struct OpenAiClient {
    http: Client,
    api_key: ApiKey,
    model: String,
    base_url: String,
    backoff: Duration,
}

/// Total attempts per completion, the first included.
const MAX_ATTEMPTS: u32 = 2;
const INITIAL_BACKOFF: Duration = Duration::from_millis(800);

impl OpenAiClient {
    pub fn new(http: Client, config: &LlmConfig) -> Self {
        Self {
            http,
            api_key: config.api_key.clone(),
            model: config.model.clone(),
            base_url: config.base_url.clone(),
            backoff: INITIAL_BACKOFF,
        }
    }

    #[cfg(test)]
    pub(crate) fn with_base_url(http: Client, base_url: &str) -> Self {
        Self {
            http,
            api_key: ApiKey::new("test-key"),
            model: "test-model".to_string(),
            base_url: base_url.to_string(),
            backoff: Duration::ZERO,
        }
    }

    async fn chat(&self, messages: &[ChatMessage], sampling: Sampling) -> Result<String, LlmError> {
        let url = format!("{}/chat/completions", self.base_url);
        let request = ChatRequest {
            model: &self.model,
            messages,
            max_tokens: sampling.max_tokens,
            temperature: sampling.temperature,
            top_p: sampling.top_p,
        };

        let response = self
            .http
            .post(&url)
            .bearer_auth(self.api_key.expose())
            .header("User-Agent", crate::USER_AGENT)
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        if status == StatusCode::TOO_MANY_REQUESTS {
            warn!("LLM endpoint rate limited");
            return Err(LlmError::RateLimited);
        }
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            let message = serde_json::from_str::<ChatResponse>(&text)
                .ok()
                .and_then(|body| body.error)
                .map(|err| describe_api_error(&err))
                .unwrap_or_else(|| {
                    let end = text.floor_char_boundary(200);
                    format!("HTTP {status}: {}", &text[..end])
                });
            warn!(status = %status, "LLM API error");
            return Err(classify_status(status, message));
        }

        let body: ChatResponse = response.json().await?;
        if let Some(err) = &body.error {
            let message = describe_api_error(err);
            warn!(%message, "LLM API error in 200 response");
            return Err(LlmError::Api { code: 200, message });
        }

        debug!(model = %self.model, "completion received");
        body.first_text().map(str::to_string).ok_or(LlmError::Empty)
    }
}

impl CompletionClient for OpenAiClient {
    async fn complete(
        &self,
        messages: &[ChatMessage],
        sampling: Sampling,
    ) -> Result<String, LlmError> {
        let mut attempt = 0;
        loop {
            match self.chat(messages, sampling).await {
                Err(e) if is_retriable(&e) && attempt + 1 < MAX_ATTEMPTS => {
                    let delay = jittered_backoff(self.backoff, attempt);
                    debug!(
                        attempt = attempt + 1,
                        delay_ms = delay.as_millis() as u64,
                        error = %e,
                        "retrying completion after transient error"
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                other => return other,
            }
        }
    }
}

fn classify_status(status: StatusCode, message: String) -> LlmError {
    match status.as_u16() {
        429 => LlmError::RateLimited,
        401 | 403 => LlmError::Unauthorized(message),
        code => LlmError::Api { code, message },
    }
}

fn describe_api_error(err: &ApiError) -> String {
    let message = err.message.as_deref().unwrap_or("Unknown error");
    let code = err.code.as_ref().map(|code| match code {
        serde_json::Value::String(s) => s.clone(),
        other => other.to_string(),
    });
    match (&err.kind, code) {
        (Some(kind), Some(code)) => format!("{kind} ({code}): {message}"),
        (Some(kind), None) => format!("{kind}: {message}"),
        (None, Some(code)) => format!("{code}: {message}"),
        (None, None) => message.to_string(),
    }
}

fn is_retriable(e: &LlmError) -> bool {
    match e {
        LlmError::RateLimited | LlmError::Api { code: 500..=599, .. } => true,
        LlmError::Network(err) => err.is_timeout() || err.is_connect(),
        _ => false,
    }
}

/// Equal jitter backoff: base/2 + rand(0, base/2).
fn jittered_backoff(initial: Duration, attempt: u32) -> Duration {
    let base = initial.as_millis() as u64 * 2u64.pow(attempt);
    let half = base / 2;
    Duration::from_millis(half + fastrand::u64(..half.max(1)))
}
