//! Retry policy: attempt budget, retryable-status predicate, and
//! capped exponential backoff with jitter.

use std::time::Duration;

use async_trait::async_trait;
use rand::Rng;
use serde::{Deserialize, Serialize};

/// Statuses retried regardless of the `>= 500` rule.
pub const RETRYABLE_STATUSES: [u16; 6] = [408, 425, 429, 502, 503, 504];

/// Jitter is drawn uniformly from `[0, JITTER_FRACTION * delay)`.
pub const JITTER_FRACTION: f64 = 0.25;

/// How a single logical request is retried.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RetryPolicy {
    /// Total attempts, including the first one.
    pub attempts: u32,
    pub backoff_base_secs: f64,
    pub backoff_cap_secs: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            attempts: 3,
            backoff_base_secs: 1.0,
            backoff_cap_secs: 20.0,
        }
    }
}

impl RetryPolicy {
    pub fn new(attempts: u32, backoff_base_secs: f64, backoff_cap_secs: f64) -> Self {
        Self {
            attempts,
            backoff_base_secs,
            backoff_cap_secs,
        }
    }

    pub fn is_retryable_status(&self, status: u16) -> bool {
        status >= 500 || RETRYABLE_STATUSES.contains(&status)
    }

    /// Backoff before the retry that follows failed attempt `attempt` (1-based),
    /// without jitter: `min(cap, base * 2^(attempt-1))`.
    pub fn base_delay_secs(&self, attempt: u32) -> f64 {
        let exp = attempt.saturating_sub(1).min(62) as i32;
        (self.backoff_base_secs * 2f64.powi(exp)).min(self.backoff_cap_secs)
    }

    /// Jittered backoff, using the supplied random source.
    pub fn delay_with<R: Rng>(&self, attempt: u32, rng: &mut R) -> Duration {
        let exp = self.base_delay_secs(attempt).max(0.0);
        let jitter_span = exp * JITTER_FRACTION;
        let jitter = if jitter_span > 0.0 {
            rng.gen_range(0.0..jitter_span)
        } else {
            0.0
        };
        Duration::from_secs_f64(exp + jitter)
    }

    /// Jittered backoff using the thread-local RNG.
    pub fn delay(&self, attempt: u32) -> Duration {
        self.delay_with(attempt, &mut rand::thread_rng())
    }

    /// Upper bound of any single delay: `cap * (1 + JITTER_FRACTION)`.
    pub fn max_delay(&self) -> Duration {
        Duration::from_secs_f64(self.backoff_cap_secs.max(0.0) * (1.0 + JITTER_FRACTION))
    }
}

/// Suspends between attempts. Swappable so backoff can be observed in tests.
#[async_trait]
pub trait Sleeper: Send + Sync {
    async fn sleep(&self, duration: Duration);
}

/// Real sleeper backed by the tokio timer.
#[derive(Debug, Clone, Copy, Default)]
pub struct TokioSleeper;

#[async_trait]
impl Sleeper for TokioSleeper {
    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}
