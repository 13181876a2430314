//! Retry policy for rate-limited provider calls
//!
//! Only capacity-class failures are retried. Every other error is returned
//! to the caller on first occurrence so the provider chain can decide what
//! to do with it.

use crate::providers::classifier::ResponseClassifier;
use crate::providers::error::ProviderError;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::time::Duration;
use tracing::{debug, warn};

/// Configuration for retry behavior
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetryPolicy {
    /// Maximum number of retry attempts (not including the initial attempt)
    pub max_retries: u32,

    /// Delay before the first retry (milliseconds)
    pub initial_delay_ms: u64,

    /// Upper bound for the doubling delay (milliseconds)
    pub max_delay_ms: u64,

    /// Random jitter added to every sleep, drawn from `[0, jitter_ms)`
    pub jitter_ms: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            initial_delay_ms: 2_000,
            max_delay_ms: 10_000,
            jitter_ms: 1_000,
        }
    }
}

impl RetryPolicy {
    /// Create a new retry policy with custom retry count
    pub fn new(max_retries: u32) -> Self {
        Self {
            max_retries,
            ..Default::default()
        }
    }

    /// Create a policy with no retries
    pub fn no_retry() -> Self {
        Self {
            max_retries: 0,
            ..Default::default()
        }
    }

    /// Builder-style setter for the delay bounds
    pub fn with_delays(mut self, initial_delay_ms: u64, max_delay_ms: u64) -> Self {
        self.initial_delay_ms = initial_delay_ms;
        self.max_delay_ms = max_delay_ms;
        self
    }

    /// Builder-style setter for the jitter window
    pub fn with_jitter(mut self, jitter_ms: u64) -> Self {
        self.jitter_ms = jitter_ms;
        self
    }

    /// Base delay (without jitter) before retry number `retry` (1-based)
    pub fn base_delay(&self, retry: u32) -> Duration {
        let mut delay = self.initial_delay_ms;
        for _ in 1..retry {
            delay = delay.saturating_mul(2).min(self.max_delay_ms);
        }
        Duration::from_millis(delay.min(self.max_delay_ms))
    }

    fn jitter(&self) -> Duration {
        if self.jitter_ms == 0 {
            return Duration::ZERO;
        }
        let millis = rand::thread_rng().gen_range(0..self.jitter_ms);
        Duration::from_millis(millis)
    }
}

/// Mutable state of one retried invocation
#[derive(Debug, Clone)]
pub struct RetryState {
    /// Rate-limited failures seen so far
    pub attempt: u32,

    /// Delay that will be used before the next retry
    pub current_delay: Duration,

    pub max_retries: u32,

    pub max_delay: Duration,
}

impl RetryState {
    fn new(policy: &RetryPolicy) -> Self {
        Self {
            attempt: 0,
            current_delay: Duration::from_millis(policy.initial_delay_ms.min(policy.max_delay_ms)),
            max_retries: policy.max_retries,
            max_delay: Duration::from_millis(policy.max_delay_ms),
        }
    }

    fn advance_delay(&mut self) {
        self.current_delay = (self.current_delay * 2).min(self.max_delay);
    }
}

/// Result of a retried operation, with the sleeps that were taken
#[derive(Debug)]
pub struct RetryResult<T> {
    pub result: Result<T, ProviderError>,

    /// Total calls made, including the first
    pub calls: u32,

    /// Every sleep taken between calls, jitter included
    pub delays: Vec<Duration>,
}

/// Executor for rate-limit retries
#[derive(Debug, Clone, Default)]
pub struct RetryExecutor {
    policy: RetryPolicy,
}

impl RetryExecutor {
    /// Create a new retry executor with the given policy
    pub fn new(policy: RetryPolicy) -> Self {
        Self { policy }
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// Execute an operation, retrying only rate-limited failures
    pub async fn execute<F, T, Fut>(&self, operation: F) -> Result<T, ProviderError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, ProviderError>>,
    {
        self.execute_traced(operation).await.result
    }

    /// Like `execute`, also reporting the calls made and the sleeps taken
    pub async fn execute_traced<F, T, Fut>(&self, mut operation: F) -> RetryResult<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, ProviderError>>,
    {
        let mut state = RetryState::new(&self.policy);
        let mut delays = Vec::new();
        let mut calls = 0;

        loop {
            calls += 1;
            let error = match operation().await {
                Ok(value) => {
                    if state.attempt > 0 {
                        debug!(attempt = state.attempt, "Provider call recovered after retries");
                    }
                    return RetryResult {
                        result: Ok(value),
                        calls,
                        delays,
                    };
                }
                Err(error) => error,
            };

            if !ResponseClassifier::classify(&error).retriable {
                return RetryResult {
                    result: Err(error),
                    calls,
                    delays,
                };
            }

            state.attempt += 1;
            if state.attempt > state.max_retries {
                warn!(
                    attempts = calls,
                    max_retries = state.max_retries,
                    "Rate limit retries exhausted"
                );
                return RetryResult {
                    result: Err(ProviderError::RetriesExhausted {
                        attempts: calls,
                        source: Box::new(error),
                    }),
                    calls,
                    delays,
                };
            }

            let delay = state.current_delay + self.policy.jitter();
            warn!(
                attempt = state.attempt,
                max_retries = state.max_retries,
                delay_ms = delay.as_millis() as u64,
                error = %error,
                "Rate limited, backing off before retry"
            );
            tokio::time::sleep(delay).await;
            delays.push(delay);
            state.advance_delay();
        }
    }
}
