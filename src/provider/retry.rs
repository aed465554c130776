// src/provider/retry.rs — Retry with exponential backoff
//
// `BackoffPolicy` maps an attempt count to a delay, keeping the schedule
// testable without real time. The same policy drives both the provider
// retry decorator here and the notification queue's retry spacing.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use super::{ChatRequest, ChatResponse, CompletionProvider};
use crate::infra::errors::RegistaError;

const MAX_RETRIES: u32 = 4;
const INITIAL_DELAY_MS: u64 = 1_000;
const BACKOFF_FACTOR: f64 = 2.0;
const MAX_DELAY_MS: u64 = 20_000;
const JITTER_FRACTION: f64 = 0.2;

/// Attempt count → delay. Pure; no clock access.
#[derive(Debug, Clone)]
pub struct BackoffPolicy {
    pub initial_delay: Duration,
    pub factor: f64,
    pub max_delay: Duration,
    pub jitter_fraction: f64,
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self {
            initial_delay: Duration::from_millis(INITIAL_DELAY_MS),
            factor: BACKOFF_FACTOR,
            max_delay: Duration::from_millis(MAX_DELAY_MS),
            jitter_fraction: JITTER_FRACTION,
        }
    }
}

impl BackoffPolicy {
    pub fn new(initial_delay: Duration, factor: f64, max_delay: Duration) -> Self {
        Self {
            initial_delay,
            factor,
            max_delay,
            jitter_fraction: 0.0,
        }
    }

    /// Delay before retry number `attempt` (0-indexed).
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let base_ms =
            self.initial_delay.as_millis() as f64 * self.factor.powi(attempt.min(16) as i32);
        let capped_ms = base_ms.min(self.max_delay.as_millis() as f64);
        let final_ms = (capped_ms * deterministic_jitter(attempt, self.jitter_fraction)).max(50.0);
        Duration::from_millis(final_ms as u64)
    }
}

/// Deterministic jitter so retry schedules are reproducible in tests.
/// Returns a multiplier in [1 - fraction, 1 + fraction].
fn deterministic_jitter(attempt: u32, fraction: f64) -> f64 {
    let hash = (attempt.wrapping_mul(2654435761)) as f64 / u32::MAX as f64;
    1.0 + fraction * (2.0 * hash - 1.0)
}

/// A provider wrapper that retries `chat()` on transient errors.
pub struct RetryProvider {
    inner: Arc<dyn CompletionProvider>,
    policy: BackoffPolicy,
    max_retries: u32,
}

impl RetryProvider {
    pub fn new(inner: Arc<dyn CompletionProvider>) -> Self {
        Self {
            inner,
            policy: BackoffPolicy::default(),
            max_retries: MAX_RETRIES,
        }
    }

    pub fn with_policy(inner: Arc<dyn CompletionProvider>, policy: BackoffPolicy) -> Self {
        Self {
            inner,
            policy,
            max_retries: MAX_RETRIES,
        }
    }

    fn delay_for(&self, attempt: u32, error: &RegistaError) -> Duration {
        if let RegistaError::RateLimited { retry_after_ms, .. } = error {
            if *retry_after_ms > 0 {
                return Duration::from_millis(retry_after_ms + 100);
            }
        }
        self.policy.delay_for_attempt(attempt)
    }
}

#[async_trait]
impl CompletionProvider for RetryProvider {
    fn id(&self) -> &str {
        self.inner.id()
    }

    async fn chat(&self, request: ChatRequest) -> Result<ChatResponse, RegistaError> {
        let mut attempt: u32 = 0;
        loop {
            match self.inner.chat(request.clone()).await {
                Ok(response) => return Ok(response),
                Err(e) if e.is_retriable() && attempt < self.max_retries => {
                    let delay = self.delay_for(attempt, &e);
                    tracing::warn!(
                        attempt = attempt + 1,
                        delay_ms = delay.as_millis() as u64,
                        "Transient provider error, retrying: {e}"
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }
}
