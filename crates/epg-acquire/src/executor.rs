//! Request executor: one logical schedule request, retried under a
//! `RetryPolicy`, decoded into a `SchedulePayload`.

use std::sync::atomic::{AtomicU64, Ordering};

use tracing::{debug, warn};

use crate::cancel::Cancellation;
use crate::error::{body_snippet, RequestError};
use crate::retry::{RetryPolicy, Sleeper, TokioSleeper};
use crate::transport::{ScheduleQuery, Transport};
use crate::types::SchedulePayload;

/// Issues schedule requests against a fixed endpoint.
///
/// Counters are atomics so the executor can be shared by reference between
/// concurrently resolving work items.
pub struct RequestExecutor<T, S = TokioSleeper> {
    transport: T,
    sleeper: S,
    policy: RetryPolicy,
    url: String,
    cancel: Cancellation,
    requests: AtomicU64,
    retries: AtomicU64,
}

impl<T: Transport> RequestExecutor<T, TokioSleeper> {
    pub fn new(transport: T, url: impl Into<String>, policy: RetryPolicy) -> Self {
        Self::with_sleeper(transport, TokioSleeper, url, policy)
    }
}

impl<T: Transport, S: Sleeper> RequestExecutor<T, S> {
    pub fn with_sleeper(transport: T, sleeper: S, url: impl Into<String>, policy: RetryPolicy) -> Self {
        Self {
            transport,
            sleeper,
            policy,
            url: url.into(),
            cancel: Cancellation::new(),
            requests: AtomicU64::new(0),
            retries: AtomicU64::new(0),
        }
    }

    /// Observe `cancel`: no new attempt starts and backoff sleeps end early.
    pub fn with_cancellation(mut self, cancel: Cancellation) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn cancellation(&self) -> &Cancellation {
        &self.cancel
    }

    /// HTTP attempts issued so far, retries included.
    pub fn requests_issued(&self) -> u64 {
        self.requests.load(Ordering::Relaxed)
    }

    /// Attempts that were followed by a backoff and another attempt.
    pub fn retries(&self) -> u64 {
        self.retries.load(Ordering::Relaxed)
    }

    /// Fetch and decode one schedule payload.
    ///
    /// Transport failures and retryable statuses are retried up to
    /// `policy.attempts` total attempts; anything else fails immediately.
    pub async fn fetch(&self, query: &ScheduleQuery) -> Result<SchedulePayload, RequestError> {
        let attempts = self.policy.attempts.max(1);
        let mut attempt = 1;

        loop {
            if self.cancel.is_cancelled() {
                return Err(RequestError::Cancelled);
            }
            self.requests.fetch_add(1, Ordering::Relaxed);
            debug!(
                start_ms = query.start_ms,
                end_ms = query.end_ms,
                channels = query.channel_ids.len(),
                "GET schedule attempt {attempt}/{attempts}"
            );

            let err = match self.transport.get(&self.url, query).await {
                Ok(resp) if (200..300).contains(&resp.status) => {
                    debug!(
                        status = resp.status,
                        elapsed_ms = resp.elapsed.as_millis() as u64,
                        bytes = resp.body.len(),
                        "schedule response"
                    );
                    return SchedulePayload::from_json_str(&resp.body).map_err(|reason| {
                        let snippet = body_snippet(&resp.body);
                        warn!(status = resp.status, "undecodable schedule body: {reason}; body: {snippet}");
                        RequestError::Decode {
                            status: resp.status,
                            reason,
                            snippet,
                        }
                    });
                }
                Ok(resp) => RequestError::Status {
                    status: resp.status,
                    snippet: body_snippet(&resp.body),
                },
                Err(e) => RequestError::Transport(e),
            };

            if !err.is_retryable(&self.policy) {
                return Err(err);
            }
            if attempt >= attempts {
                return Err(if attempts > 1 {
                    RequestError::Exhausted {
                        attempts,
                        last: Box::new(err),
                    }
                } else {
                    err
                });
            }

            let delay = self.policy.delay(attempt);
            warn!(
                "schedule request failed ({err}); retrying in {:.1}s (attempt {attempt}/{attempts})",
                delay.as_secs_f64()
            );
            self.retries.fetch_add(1, Ordering::Relaxed);
            tokio::select! {
                _ = self.sleeper.sleep(delay) => {}
                _ = self.cancel.cancelled() => return Err(RequestError::Cancelled),
            }
            attempt += 1;
        }
    }
}
