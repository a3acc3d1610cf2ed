//! LLM transport capability ("LLM adapter contract").
//!
//! Rate-limit/retry plumbing lives here: a `reqwest::Client` wrapping a
//! single completion endpoint, with bounded exponential backoff applied by
//! the caller rather than inside the trait itself, so guards and extenders
//! can distinguish "exhausted retries" from "fatal".

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::config::LlmConfig;
use crate::error::{BuilderError, BuilderResult};

/// A single completion request. Mirrors the shape of `AgentQuery` in the
/// teacher's `llm_client.rs`, narrowed to what prompt templates need.
#[derive(Debug, Clone, Serialize)]
pub struct CompletionRequest<'a> {
    pub system: &'a str,
    pub user: &'a str,
    pub temperature: f32,
    pub max_tokens: u32,
}

/// Outcome of a completion call: the text plus whether the failure (if any)
/// was transient, so callers can decide whether to retry.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CompletionResponse {
    pub text: String,
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
    pub is_transient_failure: bool,
}

/// LLM transport contract. Implementations are assumed thread-safe and
/// are injected at construction, never accessed through a process-wide
/// singleton.
#[async_trait]
pub trait CompletionClient: Send + Sync {
    async fn complete(&self, request: CompletionRequest<'_>) -> BuilderResult<CompletionResponse>;
}

/// HTTP-backed `CompletionClient` with bounded exponential backoff (cap
/// 10 attempts, 2^n seconds up to `backoff_cap_s`).
#[derive(Debug)]
pub struct HttpCompletionClient {
    client: reqwest::Client,
    base_url: String,
    model: String,
    max_retries: u32,
    backoff_cap_s: u64,
}

impl HttpCompletionClient {
    pub fn new(base_url: impl Into<String>, config: &LlmConfig) -> BuilderResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.completion_call_timeout_s))
            .build()
            .map_err(|e| BuilderError::NetworkError(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            base_url: base_url.into(),
            model: config.default_model.clone(),
            max_retries: config.max_retries,
            backoff_cap_s: config.backoff_cap_s,
        })
    }

    async fn send_once(&self, request: &CompletionRequest<'_>) -> BuilderResult<CompletionResponse> {
        let url = format!("{}/v1/complete", self.base_url);
        let body = serde_json::json!({
            "model": self.model,
            "system": request.system,
            "user": request.user,
            "temperature": request.temperature,
            "max_tokens": request.max_tokens,
        });

        let response = self.client.post(&url).json(&body).send().await?;

        if !response.status().is_success() {
            let status = response.status();
            let message = response.text().await.unwrap_or_default();
            return Err(BuilderError::HttpError {
                status: status.as_u16(),
                message,
            });
        }

        let parsed: CompletionResponse = response.json().await?;
        Ok(parsed)
    }
}

#[async_trait]
impl CompletionClient for HttpCompletionClient {
    async fn complete(&self, request: CompletionRequest<'_>) -> BuilderResult<CompletionResponse> {
        let mut attempt = 0u32;
        loop {
            match self.send_once(&request).await {
                Ok(response) => return Ok(response),
                Err(err) if attempt < self.max_retries && is_transient(&err) => {
                    let backoff = 2u64.saturating_pow(attempt).min(self.backoff_cap_s);
                    tracing::warn!(
                        attempt,
                        backoff_s = backoff,
                        "transient completion failure, retrying: {err}"
                    );
                    tokio::time::sleep(Duration::from_secs(backoff)).await;
                    attempt += 1;
                }
                Err(err) => {
                    return Err(BuilderError::ExternalUnavailable {
                        attempts: attempt + 1,
                        reason: err.to_string(),
                    });
                }
            }
        }
    }
}

fn is_transient(err: &BuilderError) -> bool {
    matches!(
        err,
        BuilderError::NetworkError(_)
            | BuilderError::HttpError { status: 429, .. }
            | BuilderError::HttpError { status: 500..=599, .. }
    )
}
