//! HTTP client for inference endpoints with retry logic

use async_trait::async_trait;
use prism_cache::Produced;
use prism_config::InferenceSettings;
use prism_core::error::PrismError;
use reqwest::{Client, ClientBuilder, StatusCode};
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::decode::{decode_response, Decoded};
use crate::operation::Operation;
use crate::InferenceResult;

/// Something that can turn an operation into image bytes
#[async_trait]
pub trait Transform: Send + Sync {
    async fn transform(&self, operation: &Operation) -> InferenceResult<Produced>;
}

/// Configuration for exponential backoff retry logic
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Maximum number of retry attempts
    pub max_retries: u32,
    /// Initial delay before first retry
    pub initial_delay: Duration,
    /// Maximum delay between retries
    pub max_delay: Duration,
    /// Multiplier for exponential backoff
    pub multiplier: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            initial_delay: Duration::from_millis(100),
            max_delay: Duration::from_secs(10),
            multiplier: 2.0,
        }
    }
}

/// A response that was not a gateway failure
#[derive(Debug)]
struct Reply {
    status: StatusCode,
    content_type: Option<String>,
    body: Vec<u8>,
}

/// Client for Hugging Face style inference endpoints
#[derive(Debug, Clone)]
pub struct HfClient {
    /// Underlying HTTP client with connection pooling
    client: Client,
    settings: InferenceSettings,
    retry_config: RetryConfig,
}

impl HfClient {
    /// Create a client bounded by the configured inference timeout
    pub fn new(settings: &InferenceSettings) -> InferenceResult<Self> {
        let client = ClientBuilder::new()
            .pool_max_idle_per_host(8)
            .pool_idle_timeout(Duration::from_secs(90))
            .timeout(Duration::from_secs(settings.timeout_seconds))
            .gzip(true)
            .user_agent(concat!("prism/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| PrismError::Upstream {
                status: None,
                message: format!("Failed to create HTTP client: {}", e),
            })?;

        Ok(Self {
            client,
            settings: settings.clone(),
            retry_config: RetryConfig::default(),
        })
    }

    pub fn with_retry_config(mut self, retry_config: RetryConfig) -> Self {
        self.retry_config = retry_config;
        self
    }

    /// Longest a single [`HfClient::call`] can take: every attempt of both
    /// payloads running into the request timeout, plus the backoff sleeps
    pub fn call_budget(&self) -> Duration {
        let request = Duration::from_secs(self.settings.timeout_seconds);
        let attempts = self.retry_config.max_retries + 1;

        let mut backoff = Duration::ZERO;
        let mut delay = self.retry_config.initial_delay;
        for _ in 0..self.retry_config.max_retries {
            backoff += delay;
            delay = std::cmp::min(
                Duration::from_millis((delay.as_millis() as f64 * self.retry_config.multiplier) as u64),
                self.retry_config.max_delay,
            );
        }

        (request * attempts + backoff) * 2
    }

    /// Validate, call the backend and normalize its answer.
    ///
    /// A 400 or 415 answer to the primary payload is followed by exactly one
    /// attempt with the alternate payload.
    pub async fn call(&self, operation: &Operation) -> InferenceResult<Decoded> {
        operation.validate()?;
        let (url, token) = self.settings.endpoint_for(operation.name())?;

        let primary = operation.payload();
        let mut reply = self
            .with_retry(|| self.post(operation.name(), &url, &token, &primary))
            .await?;

        if matches!(reply.status, StatusCode::BAD_REQUEST | StatusCode::UNSUPPORTED_MEDIA_TYPE) {
            debug!(
                operation = operation.name(),
                status = reply.status.as_u16(),
                "Primary payload rejected, retrying with alternate schema"
            );
            let alternate = operation.alternate_payload();
            reply = self
                .with_retry(|| self.post(operation.name(), &url, &token, &alternate))
                .await?;
        }

        if !reply.status.is_success() {
            return Err(PrismError::Upstream {
                status: Some(reply.status.as_u16()),
                message: format!(
                    "{} backend returned {}: {}",
                    operation.name(),
                    reply.status,
                    snippet(&reply.body)
                ),
            });
        }

        let decoded = decode_response(reply.content_type.as_deref(), &reply.body)?;
        info!(
            operation = operation.name(),
            size = decoded.bytes.len(),
            "Inference completed"
        );
        Ok(decoded)
    }

    async fn post(&self, operation: &str, url: &str, token: &str, body: &Value) -> InferenceResult<Reply> {
        let response = self
            .client
            .post(url)
            .bearer_auth(token)
            .header(reqwest::header::ACCEPT, "*/*")
            .json(body)
            .send()
            .await
            .map_err(|e| self.request_error(operation, e))?;

        let status = response.status();
        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .map(str::to_string);
        let body = response
            .bytes()
            .await
            .map_err(|e| self.request_error(operation, e))?
            .to_vec();

        if matches!(
            status,
            StatusCode::BAD_GATEWAY | StatusCode::SERVICE_UNAVAILABLE | StatusCode::GATEWAY_TIMEOUT
        ) {
            return Err(PrismError::Upstream {
                status: Some(status.as_u16()),
                message: format!("{} backend unavailable: {}", operation, snippet(&body)),
            });
        }

        Ok(Reply {
            status,
            content_type,
            body,
        })
    }

    fn request_error(&self, operation: &str, error: reqwest::Error) -> PrismError {
        if error.is_timeout() {
            PrismError::Timeout {
                operation: format!("{} inference", operation),
                seconds: self.settings.timeout_seconds,
            }
        } else {
            PrismError::Upstream {
                status: None,
                message: format!("{} request failed: {}", operation, error),
            }
        }
    }

    /// Execute a request with exponential backoff retry logic
    async fn with_retry<F, Fut, T>(&self, operation: F) -> InferenceResult<T>
    where
        F: Fn() -> Fut,
        Fut: std::future::Future<Output = InferenceResult<T>>,
    {
        let mut delay = self.retry_config.initial_delay;
        let mut attempt = 0;

        loop {
            match operation().await {
                Ok(result) => return Ok(result),
                Err(error) => {
                    if attempt >= self.retry_config.max_retries || !is_retryable(&error) {
                        return Err(error);
                    }
                    attempt += 1;
                    warn!(attempt, error = %error, "Inference call failed, retrying");

                    tokio::time::sleep(delay).await;

                    delay = std::cmp::min(
                        Duration::from_millis(
                            (delay.as_millis() as f64 * self.retry_config.multiplier) as u64,
                        ),
                        self.retry_config.max_delay,
                    );
                }
            }
        }
    }
}

/// Connection failures and gateway errors; never client errors
fn is_retryable(error: &PrismError) -> bool {
    matches!(
        error,
        PrismError::Upstream { status: None, .. }
            | PrismError::Upstream { status: Some(502 | 503 | 504), .. }
    )
}

fn snippet(body: &[u8]) -> String {
    String::from_utf8_lossy(body).chars().take(300).collect()
}

#[async_trait]
impl Transform for HfClient {
    async fn transform(&self, operation: &Operation) -> InferenceResult<Produced> {
        let decoded = self.call(operation).await?;

        // Background removal keeps an alpha channel
        let content_type = match operation {
            Operation::RemoveBackground(_) => "image/png".to_string(),
            _ => decoded.content_type,
        };

        let mut produced = Produced::new(decoded.bytes, content_type);
        for (name, value) in decoded.meta {
            let value = match value {
                Value::String(text) => text,
                other => other.to_string(),
            };
            produced.metadata.insert(name, value);
        }
        produced
            .metadata
            .entry("model".to_string())
            .or_insert_with(|| operation.model().to_string());
        Ok(produced)
    }
}
