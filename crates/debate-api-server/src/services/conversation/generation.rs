use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

use crate::config::{GenerationProfile, LlmConfig};
use crate::models::chat::ChatMessage;
use crate::utils::error::GenerationError;
use crate::utils::limiters::Limiters;

/// Upstream text-generation backend: ordered role/content messages in,
/// generated text out.
#[cfg_attr(test, mockall::automock)]
#[async_trait::async_trait]
pub trait LlmProvider: Send + Sync {
    async fn generate(
        &self,
        messages: &[ChatMessage],
        profile: &GenerationProfile,
    ) -> Result<String, GenerationError>;
}

/// Text produced by a successful call, plus bookkeeping for activity logs.
#[derive(Debug, Clone)]
pub struct Generated {
    pub text: String,
    pub attempts: u32,
    pub elapsed: Duration,
}

/// Wraps an [`LlmProvider`] with a concurrency cap, a per-call timeout and
/// linear-backoff retries. Every failure mode comes back as a
/// [`GenerationError`].
pub struct GenerationGate {
    provider: Arc<dyn LlmProvider>,
    limiters: Limiters,
    call_timeout: Duration,
    retry_backoff: Duration,
}

impl GenerationGate {
    pub fn new(
        provider: Arc<dyn LlmProvider>,
        limiters: Limiters,
        call_timeout: Duration,
        retry_backoff: Duration,
    ) -> Self {
        Self {
            provider,
            limiters,
            call_timeout,
            retry_backoff,
        }
    }

    pub fn from_config(provider: Arc<dyn LlmProvider>, cfg: &LlmConfig) -> Self {
        Self::new(
            provider,
            Limiters::new(cfg),
            Duration::from_secs(cfg.timeout_seconds),
            Duration::from_millis(cfg.retry_backoff_ms),
        )
    }

    pub async fn generate(
        &self,
        messages: &[ChatMessage],
        profile: &GenerationProfile,
        max_attempts: u32,
    ) -> Result<Generated, GenerationError> {
        let max_attempts = max_attempts.max(1);
        let start = Instant::now();
        let mut last_error = GenerationError::Empty;

        for attempt in 1..=max_attempts {
            match self.attempt(messages, profile).await {
                Ok(text) => {
                    return Ok(Generated {
                        text,
                        attempts: attempt,
                        elapsed: start.elapsed(),
                    });
                }
                Err(e) => {
                    warn!(attempt, max_attempts, error = %e, "LLM call failed");
                    last_error = e;
                    if attempt < max_attempts {
                        tokio::time::sleep(self.retry_backoff * attempt).await;
                    }
                }
            }
        }

        Err(last_error)
    }

    async fn attempt(
        &self,
        messages: &[ChatMessage],
        profile: &GenerationProfile,
    ) -> Result<String, GenerationError> {
        let (_permit, waited) = Limiters::acquire_timed(
            self.limiters.llm_generate.clone(),
            self.limiters.acquire_timeout,
            "llm_generate",
        )
        .await?;

        debug!(
            "Calling LLM with {} messages (waited {:?} for a slot)",
            messages.len(),
            waited
        );

        let text = tokio::time::timeout(self.call_timeout, self.provider.generate(messages, profile))
            .await
            .map_err(|_| GenerationError::Timeout(self.call_timeout))??;

        if text.trim().is_empty() {
            return Err(GenerationError::Empty);
        }
        Ok(text)
    }
}
