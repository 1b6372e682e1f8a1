//! Retry with backoff around provider calls.
//!
//! One policy wraps every outbound TMDB request, instead of ad hoc loops at
//! each call site. A policy is parameterized by attempt count, base delay
//! and a predicate deciding which errors are worth another attempt.
//!
//! - [`RetryPolicy::exponential`]: API calls. Retries rate limiting and
//!   transient failures, doubling the delay with random jitter and honoring
//!   a server `Retry-After` hint when it is longer.
//! - [`RetryPolicy::linear`]: image downloads. Retries connection-level
//!   failures only, never 4xx.

use std::future::Future;
use std::time::Duration;

use rand::Rng;

use super::domain::EnrichmentError;

/// How the delay grows between attempts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Backoff {
    /// `base * 2^attempt`, plus jitter
    Exponential,
    /// `base * (attempt + 1)`
    Linear,
}

/// Bounded retry policy.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
    pub backoff: Backoff,
    retry_on: fn(&EnrichmentError) -> bool,
}

impl RetryPolicy {
    pub fn exponential(max_attempts: u32, base_delay: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            base_delay,
            max_delay: Duration::from_secs(30),
            backoff: Backoff::Exponential,
            retry_on: EnrichmentError::is_retryable,
        }
    }

    pub fn linear(max_attempts: u32, base_delay: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            base_delay,
            max_delay: Duration::from_secs(30),
            backoff: Backoff::Linear,
            retry_on: EnrichmentError::is_transient,
        }
    }

    /// Delay before the attempt following `attempt` (0-based).
    pub fn delay_for(&self, attempt: u32, hint: Option<Duration>) -> Duration {
        let computed = match self.backoff {
            Backoff::Exponential => {
                let factor = 2u32.saturating_pow(attempt);
                let base = self.base_delay.saturating_mul(factor);
                let jitter_ms = self.base_delay.as_millis() as u64;
                let jitter = if jitter_ms > 0 {
                    Duration::from_millis(rand::rng().random_range(0..=jitter_ms))
                } else {
                    Duration::ZERO
                };
                base + jitter
            }
            Backoff::Linear => self.base_delay.saturating_mul(attempt + 1),
        };
        let delay = match hint {
            Some(hint) if hint > computed => hint,
            _ => computed,
        };
        delay.min(self.max_delay)
    }

    /// Run `op` until it succeeds, fails with a non-retryable error, or the
    /// attempts are used up. Exhaustion yields [`EnrichmentError::Unavailable`].
    pub async fn run<T, F, Fut>(&self, label: &str, mut op: F) -> Result<T, EnrichmentError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, EnrichmentError>>,
    {
        let mut attempt = 0;
        loop {
            match op().await {
                Ok(value) => return Ok(value),
                Err(e) if (self.retry_on)(&e) => {
                    attempt += 1;
                    if attempt >= self.max_attempts {
                        tracing::warn!(
                            target: "tmdb",
                            "{} failed after {} attempts: {}",
                            label,
                            attempt,
                            e
                        );
                        return Err(EnrichmentError::Unavailable(format!("{label}: {e}")));
                    }
                    let hint = match &e {
                        EnrichmentError::RateLimited { retry_after } => *retry_after,
                        _ => None,
                    };
                    let delay = self.delay_for(attempt - 1, hint);
                    tracing::debug!(
                        target: "tmdb",
                        "{} attempt {} failed ({}), retrying in {:?}",
                        label,
                        attempt,
                        e,
                        delay
                    );
                    tokio::time::sleep(delay).await;
                }
                Err(e) => return Err(e),
            }
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::exponential(3, Duration::from_millis(500))
    }
}
