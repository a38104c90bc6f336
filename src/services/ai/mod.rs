pub mod groq;
pub mod ollama;

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::config::AppConfig;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub role: String,
    pub content: String,
}

impl Message {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".to_string(),
            content: content.into(),
        }
    }
}

#[async_trait]
pub trait LlmProvider: Send + Sync {
    async fn chat(&self, system_prompt: &str, messages: &[Message]) -> anyhow::Result<String>;
}

/// A failure worth retrying: timeouts, refused connections, 429 and 5xx.
#[derive(Debug, thiserror::Error)]
#[error("transient LLM failure: {0}")]
pub struct TransientError(pub String);

pub fn is_transient(err: &anyhow::Error) -> bool {
    err.chain().any(|cause| {
        cause.is::<TransientError>()
            || cause
                .downcast_ref::<reqwest::Error>()
                .is_some_and(|e| e.is_timeout() || e.is_connect())
    })
}

/// Maps a non-success HTTP status to an error, marking the ones a retry
/// may fix.
pub(crate) fn check_status(
    provider: &str,
    status: reqwest::StatusCode,
    body: &serde_json::Value,
) -> anyhow::Result<()> {
    if status.is_success() {
        return Ok(());
    }
    if status.is_server_error() || status == reqwest::StatusCode::TOO_MANY_REQUESTS {
        return Err(TransientError(format!("{provider} returned {status}: {body}")).into());
    }
    anyhow::bail!("{provider} API error ({status}): {body}")
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub initial_backoff: Duration,
}

impl RetryPolicy {
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            max_retries: config.llm_max_retries,
            initial_backoff: Duration::from_millis(config.llm_retry_backoff_ms),
        }
    }

    /// Calls the provider, retrying transient failures with a doubling
    /// backoff. Other errors are returned at once.
    pub async fn chat(
        &self,
        llm: &dyn LlmProvider,
        system_prompt: &str,
        messages: &[Message],
    ) -> anyhow::Result<String> {
        let mut backoff = self.initial_backoff;
        let mut attempt = 0;

        loop {
            match llm.chat(system_prompt, messages).await {
                Ok(text) => return Ok(text),
                Err(e) if attempt < self.max_retries && is_transient(&e) => {
                    attempt += 1;
                    tracing::warn!(
                        error = %e,
                        attempt,
                        max_retries = self.max_retries,
                        "LLM request failed, retrying in {:?}",
                        backoff
                    );
                    tokio::time::sleep(backoff).await;
                    backoff *= 2;
                }
                Err(e) => return Err(e),
            }
        }
    }
}
