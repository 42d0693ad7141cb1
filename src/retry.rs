//! Retry with exponential backoff.
//!
//! The policy describes delays; the attempt budget comes from the caller
//! (request override or config). Backoff defaults to a deterministic
//! `1s * 2^attempt` so behavior under test and in production logs is easy to
//! reason about; jitter can be enabled where thundering herds matter.

use std::time::Duration;

use rand::Rng;
use tokio::time::sleep;

use crate::error::{AiError, Result};

#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Delay before the second attempt.
    pub initial_delay: Duration,
    /// Upper bound for any single delay.
    pub max_delay: Duration,
    /// Multiplier applied per attempt.
    pub backoff_multiplier: f64,
    /// Whether to randomize delays.
    pub use_jitter: bool,
    /// Maximum jitter fraction (0.0 to 1.0).
    pub jitter_factor: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            initial_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(60),
            backoff_multiplier: 2.0,
            use_jitter: false,
            jitter_factor: 0.1,
        }
    }
}

impl RetryPolicy {
    pub fn new() -> Self {
        Self::default()
    }

    pub const fn with_initial_delay(mut self, delay: Duration) -> Self {
        self.initial_delay = delay;
        self
    }

    pub const fn with_max_delay(mut self, delay: Duration) -> Self {
        self.max_delay = delay;
        self
    }

    pub const fn with_backoff_multiplier(mut self, multiplier: f64) -> Self {
        self.backoff_multiplier = multiplier;
        self
    }

    pub const fn with_jitter(mut self, use_jitter: bool) -> Self {
        self.use_jitter = use_jitter;
        self
    }

    /// Delay after the given zero-indexed attempt.
    pub fn calculate_delay(&self, attempt: u32) -> Duration {
        let base = self.initial_delay.as_millis() as f64
            * self.backoff_multiplier.powi(attempt as i32);
        let delay = Duration::from_millis(base as u64).min(self.max_delay);

        if self.use_jitter {
            self.add_jitter(delay)
        } else {
            delay
        }
    }

    fn add_jitter(&self, delay: Duration) -> Duration {
        let mut rng = rand::thread_rng();
        let range = delay.as_millis() as f64 * self.jitter_factor;
        let jitter = if range > 0.0 {
            rng.gen_range(-range..=range)
        } else {
            0.0
        };
        Duration::from_millis((delay.as_millis() as f64 + jitter).max(0.0) as u64)
    }

    /// Run `operation` up to `attempts` times (at least once). Each failure
    /// is logged; retryable failures sleep the computed backoff before the
    /// next attempt. Exhaustion wraps the last error in
    /// [`AiError::GenerationFailed`]; a non-retryable error surfaces
    /// immediately, unwrapped.
    pub async fn run<F, Fut, T>(&self, attempts: u32, mut operation: F) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let attempts = attempts.max(1);
        let mut last_error = None;

        for attempt in 0..attempts {
            match operation().await {
                Ok(value) => return Ok(value),
                Err(error) => {
                    if !error.is_retryable() {
                        return Err(error);
                    }
                    tracing::warn!(
                        attempt = attempt + 1,
                        total = attempts,
                        error = %error,
                        "generation attempt failed"
                    );
                    last_error = Some(error);

                    if attempt + 1 < attempts {
                        sleep(self.calculate_delay(attempt)).await;
                    }
                }
            }
        }

        Err(AiError::GenerationFailed {
            attempts,
            source: Box::new(last_error.unwrap_or(AiError::EmptyResponse)),
        })
    }
}
