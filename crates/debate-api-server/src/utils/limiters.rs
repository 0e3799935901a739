use std::{
    sync::Arc,
    time::{Duration, Instant},
};
use tokio::sync::{OwnedSemaphorePermit, Semaphore};

use crate::config::LlmConfig;
use crate::utils::error::GenerationError;

#[derive(Clone)]
pub struct Limiters {
    pub llm_generate: Arc<Semaphore>,
    pub acquire_timeout: Duration,
}

impl Limiters {
    pub fn new(cfg: &LlmConfig) -> Self {
        Self::with_capacity(
            cfg.max_concurrent_requests,
            Duration::from_millis(cfg.acquire_timeout_ms),
        )
    }

    pub fn with_capacity(llm_generate: usize, acquire_timeout: Duration) -> Self {
        Self {
            llm_generate: Arc::new(Semaphore::new(llm_generate.max(1))),
            acquire_timeout: acquire_timeout.max(Duration::from_millis(1)),
        }
    }

    pub async fn acquire_timed(
        sem: Arc<Semaphore>,
        acquire_timeout: Duration,
        op: &'static str,
    ) -> Result<(OwnedSemaphorePermit, Duration), GenerationError> {
        let start = Instant::now();

        let permit = tokio::time::timeout(acquire_timeout, sem.acquire_owned())
            .await
            .map_err(|_| {
                tracing::warn!("Limiter acquire timeout for op={}", op);
                GenerationError::Overloaded
            })?
            // the semaphore is never closed
            .map_err(|_| GenerationError::Overloaded)?;

        Ok((permit, start.elapsed()))
    }
}
