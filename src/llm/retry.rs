//! Bounded retry with exponential backoff for provider calls
//!
//! Only transient failures (`ProviderUnavailable`, `Timeout`) are retried;
//! schema mismatches and rejected requests fail immediately.

use std::time::Duration;
use tokio::time::sleep;
use tracing::warn;

use crate::errors::ServiceError;

/// Default attempts including the first call
pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;

const BASE_DELAY_MS: u64 = 500;
const MAX_DELAY_MS: u64 = 8000;

/// Retry policy with exponential backoff and jitter
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    max_attempts: u32,
    base_delay_ms: u64,
    max_delay_ms: u64,
    enable_jitter: bool,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_ATTEMPTS, BASE_DELAY_MS)
    }
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, base_delay_ms: u64) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            base_delay_ms,
            max_delay_ms: MAX_DELAY_MS,
            enable_jitter: true,
        }
    }

    /// Single attempt, no waiting
    pub fn none() -> Self {
        Self::new(1, 0)
    }

    pub fn without_jitter(mut self) -> Self {
        self.enable_jitter = false;
        self
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Run `operation` until it succeeds, fails permanently, or attempts run out
    pub async fn run<F, Fut, T>(&self, label: &str, mut operation: F) -> Result<T, ServiceError>
    where
        F: FnMut() -> Fut,
        Fut: std::future::Future<Output = Result<T, ServiceError>>,
    {
        let mut attempt = 0;

        loop {
            attempt += 1;
            match operation().await {
                Ok(value) => return Ok(value),
                Err(e) if e.is_transient() && attempt < self.max_attempts => {
                    let delay = self.delay_for(attempt);
                    warn!(
                        call = label,
                        attempt,
                        kind = e.kind(),
                        delay_ms = delay.as_millis() as u64,
                        "Transient provider failure, retrying"
                    );
                    sleep(delay).await;
                }
                Err(e) => return Err(e),
            }
        }
    }

    fn delay_for(&self, attempt: u32) -> Duration {
        let exponential = self
            .base_delay_ms
            .saturating_mul(2u64.saturating_pow(attempt.saturating_sub(1)));
        let delay_ms = exponential.min(self.max_delay_ms);

        let final_ms = if self.enable_jitter && delay_ms > 0 {
            // ±25%
            let jitter = (delay_ms / 4) as f64;
            let offset = (rand::random::<f64>() * 2.0 - 1.0) * jitter;
            (delay_ms as f64 + offset).max(0.0) as u64
        } else {
            delay_ms
        };

        Duration::from_millis(final_ms)
    }

    /// Upper bound on total waiting across all retries (jitter excluded)
    pub fn max_total_wait(&self) -> Duration {
        let total: u64 = (1..self.max_attempts)
            .map(|attempt| {
                self.base_delay_ms
                    .saturating_mul(2u64.saturating_pow(attempt - 1))
                    .min(self.max_delay_ms)
            })
            .sum();
        Duration::from_millis(total)
    }
}
