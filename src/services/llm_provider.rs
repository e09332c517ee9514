use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::time::sleep;
use tracing::{info, warn};

use crate::config::Config;

const DEFAULT_MODEL: &str = "gpt-4o-mini";
const DEFAULT_API_ENDPOINT: &str = "https://api.openai.com/v1";
const DEFAULT_TIMEOUT_MS: u64 = 60_000;
const DEFAULT_MAX_TOKENS: u32 = 64;
const MAX_RETRIES: usize = 3;
const BASE_BACKOFF_MS: u64 = 200;

#[derive(Debug, Clone)]
pub struct LLMConfig {
    pub api_key: Option<String>,
    pub model: String,
    pub api_endpoint: String,
    pub timeout: Duration,
    pub max_tokens: u32,
}

impl LLMConfig {
    pub fn from_env() -> Self {
        Self {
            api_key: env_string("LLM_API_KEY"),
            model: env_string("LLM_MODEL").unwrap_or_else(|| DEFAULT_MODEL.to_string()),
            api_endpoint: normalize_endpoint(
                env_string("LLM_API_ENDPOINT")
                    .or_else(|| env_string("LLM_BASE_URL"))
                    .unwrap_or_else(|| DEFAULT_API_ENDPOINT.to_string()),
            ),
            timeout: Duration::from_millis(env_u64("LLM_TIMEOUT").unwrap_or(DEFAULT_TIMEOUT_MS)),
            max_tokens: env_u64("LLM_MAX_TOKENS")
                .map(|v| v as u32)
                .unwrap_or(DEFAULT_MAX_TOKENS),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ChatResponse {
    pub model: Option<String>,
    pub choices: Vec<ChatChoice>,
}

impl ChatResponse {
    pub fn first_content(&self) -> Option<&str> {
        self.choices.first().map(|c| c.message.content.as_str())
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ChatChoice {
    pub message: ChatMessage,
}

#[derive(Debug, Error)]
pub enum LLMError {
    #[error("LLM not configured: {0}")]
    NotConfigured(&'static str),
    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("HTTP {status}: {body}")]
    HttpStatus { status: reqwest::StatusCode, body: String },
    #[error("JSON decode failed: {0}")]
    Json(#[from] serde_json::Error),
    #[error("empty response")]
    EmptyChoices,
}

/// Text completion seam used by the generative adapter.
#[async_trait]
pub trait TextGenerator: Send + Sync {
    /// Bounded, non-sampled completion of a single prompt.
    async fn complete(&self, prompt: &str, max_tokens: u32) -> Result<String, LLMError>;

    /// Cheap request proving the backend answers at all.
    async fn warm_up(&self) -> Result<(), LLMError> {
        self.complete("{}", 1).await.map(|_| ())
    }
}

#[derive(Clone)]
pub struct LLMProvider {
    config: LLMConfig,
    client: reqwest::Client,
}

impl LLMProvider {
    pub fn new(config: LLMConfig) -> Self {
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());
        Self { config, client }
    }

    pub fn from_env() -> Self {
        Self::new(LLMConfig::from_env())
    }

    pub fn max_tokens(&self) -> u32 {
        self.config.max_tokens
    }

    pub fn is_available(&self) -> bool {
        self.config.api_key.as_deref().is_some_and(|v| !v.trim().is_empty())
            && !self.config.model.trim().is_empty()
            && !self.config.api_endpoint.trim().is_empty()
    }

    pub async fn chat(
        &self,
        messages: &[ChatMessage],
        max_tokens: u32,
    ) -> Result<ChatResponse, LLMError> {
        let api_key = self
            .config
            .api_key
            .as_deref()
            .filter(|v| !v.trim().is_empty())
            .ok_or(LLMError::NotConfigured("LLM_API_KEY"))?;

        let endpoint = self.config.api_endpoint.trim_end_matches('/');
        let url = format!("{endpoint}/chat/completions");
        let payload = serde_json::json!({
            "model": self.config.model,
            "messages": messages,
            "stream": false,
            "temperature": 0,
            "max_tokens": max_tokens,
        });

        self.post_with_retry(&url, api_key, &payload).await
    }

    async fn post_with_retry(
        &self,
        url: &str,
        api_key: &str,
        payload: &serde_json::Value,
    ) -> Result<ChatResponse, LLMError> {
        let mut last_error: Option<LLMError> = None;

        for retry in 0..=MAX_RETRIES {
            match self.client.post(url).bearer_auth(api_key).json(payload).send().await {
                Ok(resp) => {
                    let status = resp.status();
                    if status.is_success() {
                        let bytes = resp.bytes().await?;
                        return serde_json::from_slice(&bytes).map_err(|e| {
                            tracing::error!(error = %e, "failed to parse LLM response JSON");
                            LLMError::Json(e)
                        });
                    }
                    let body = resp.text().await.unwrap_or_default();
                    let err = LLMError::HttpStatus { status, body };
                    if retry < MAX_RETRIES && is_retryable(status) {
                        let backoff = Duration::from_millis(BASE_BACKOFF_MS * (1 << retry));
                        warn!(retry, ?status, "LLM request failed, retrying");
                        sleep(backoff).await;
                        last_error = Some(err);
                        continue;
                    }
                    return Err(err);
                }
                Err(e) => {
                    let err = LLMError::Request(e);
                    if retry < MAX_RETRIES {
                        let backoff = Duration::from_millis(BASE_BACKOFF_MS * (1 << retry));
                        warn!(retry, "LLM request error, retrying");
                        sleep(backoff).await;
                        last_error = Some(err);
                        continue;
                    }
                    return Err(err);
                }
            }
        }
        Err(last_error.unwrap_or(LLMError::NotConfigured("unknown")))
    }
}

#[async_trait]
impl TextGenerator for LLMProvider {
    async fn complete(&self, prompt: &str, max_tokens: u32) -> Result<String, LLMError> {
        let messages = [ChatMessage {
            role: "user".into(),
            content: prompt.into(),
        }];
        let response = self.chat(&messages, max_tokens).await?;
        response
            .first_content()
            .map(|s| s.to_string())
            .ok_or(LLMError::EmptyChoices)
    }

    async fn warm_up(&self) -> Result<(), LLMError> {
        if !self.is_available() {
            return Err(LLMError::NotConfigured("LLM_API_KEY"));
        }
        self.complete("{}", 1).await.map(|_| ())
    }
}

/// Optional generative backend. Starts not-ready; `initialize` flips `ready`
/// once a warm-up completion succeeds.
pub struct GenerativeBackend {
    enabled: bool,
    ready: AtomicBool,
    max_tokens: u32,
    generator: Option<Arc<dyn TextGenerator>>,
}

impl GenerativeBackend {
    pub fn disabled() -> Self {
        Self {
            enabled: false,
            ready: AtomicBool::new(false),
            max_tokens: DEFAULT_MAX_TOKENS,
            generator: None,
        }
    }

    pub fn new(generator: Arc<dyn TextGenerator>, max_tokens: u32) -> Self {
        Self {
            enabled: true,
            ready: AtomicBool::new(false),
            max_tokens,
            generator: Some(generator),
        }
    }

    pub fn from_config(config: &Config) -> Self {
        if !config.use_llm {
            return Self::disabled();
        }
        let provider = LLMProvider::from_env();
        if !provider.is_available() {
            warn!("USE_LLM=true but LLM_API_KEY, LLM_MODEL or LLM_API_ENDPOINT is empty");
        }
        let max_tokens = provider.max_tokens();
        Self::new(Arc::new(provider), max_tokens)
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn is_ready(&self) -> bool {
        self.enabled && self.ready.load(Ordering::Acquire)
    }

    pub fn max_tokens(&self) -> u32 {
        self.max_tokens
    }

    /// Generator handle, present only once the backend is enabled and warmed up.
    pub fn generator(&self) -> Option<Arc<dyn TextGenerator>> {
        if !self.is_ready() {
            return None;
        }
        self.generator.clone()
    }

    pub async fn initialize(&self) {
        let Some(generator) = self.generator.as_ref().filter(|_| self.enabled) else {
            info!("USE_LLM=false, generative backend skipped (fast mode)");
            return;
        };

        info!("USE_LLM=true, warming up generative backend in background");
        match generator.warm_up().await {
            Ok(()) => {
                self.ready.store(true, Ordering::Release);
                info!("generative backend ready");
            }
            Err(err) => {
                warn!(error = %err, "generative backend unavailable, staying in fast mode");
            }
        }
    }
}

fn env_string(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

fn env_u64(key: &str) -> Option<u64> {
    env_string(key)?.parse().ok()
}

fn normalize_endpoint(endpoint: String) -> String {
    let trimmed = endpoint.trim().trim_end_matches('/');
    if trimmed.ends_with("/v1") || trimmed.contains("/v1/") {
        trimmed.to_string()
    } else {
        format!("{trimmed}/v1")
    }
}

fn is_retryable(status: reqwest::StatusCode) -> bool {
    status == reqwest::StatusCode::TOO_MANY_REQUESTS
        || status == reqwest::StatusCode::REQUEST_TIMEOUT
        || status.is_server_error()
}
