//! Acquisition parameters and their validation.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::retry::RetryPolicy;

/// Longest span accepted, in days.
pub const MAX_SPAN_DAYS: i64 = 3_650;

/// Largest window accepted, in hours.
pub const MAX_WINDOW_HOURS: i64 = MAX_SPAN_DAYS * 24;

/// Everything the engine needs besides the context and the channel list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AcquisitionConfig {
    /// Total span to acquire, in days.
    pub days: i64,
    /// Size of each time window, in hours.
    pub window_hours: i64,
    /// Maximum channel identifiers per multi-channel request.
    pub max_channels: usize,
    /// Per-request HTTP timeout, in seconds.
    pub timeout_secs: u64,
    pub retry: RetryPolicy,
    /// Minimum fraction of requested channels a batch response must cover.
    pub min_ratio: f64,
    #[serde(rename = "include4K")]
    pub include_4k: bool,
    #[serde(rename = "is4KCompatible")]
    pub is_4k_compatible: bool,
    /// Upper bound on in-flight work items. 1 keeps the run strictly sequential.
    pub concurrency: usize,
}

impl Default for AcquisitionConfig {
    fn default() -> Self {
        Self {
            days: 3,
            window_hours: 6,
            max_channels: 40,
            timeout_secs: 20,
            retry: RetryPolicy::default(),
            min_ratio: 0.75,
            include_4k: false,
            is_4k_compatible: false,
            concurrency: 1,
        }
    }
}

impl AcquisitionConfig {
    /// Check every parameter before any request is made.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.days <= 0 {
            return Err(ConfigError::NonPositiveSpan(self.days));
        }
        if self.days > MAX_SPAN_DAYS {
            return Err(ConfigError::SpanTooLarge {
                days: self.days,
                max: MAX_SPAN_DAYS,
            });
        }
        if self.window_hours <= 0 {
            return Err(ConfigError::NonPositiveWindow(self.window_hours));
        }
        if self.window_hours > MAX_WINDOW_HOURS {
            return Err(ConfigError::WindowTooLarge {
                hours: self.window_hours,
                max: MAX_WINDOW_HOURS,
            });
        }
        if self.max_channels == 0 {
            return Err(ConfigError::ZeroBatchSize);
        }
        if self.retry.attempts == 0 {
            return Err(ConfigError::ZeroAttempts);
        }
        if self.concurrency == 0 {
            return Err(ConfigError::ZeroConcurrency);
        }
        if !(self.min_ratio > 0.0 && self.min_ratio <= 1.0) {
            return Err(ConfigError::InvalidCoverageRatio(self.min_ratio));
        }
        let (base, cap) = (self.retry.backoff_base_secs, self.retry.backoff_cap_secs);
        if !(base.is_finite() && cap.is_finite() && base >= 0.0 && base <= cap) {
            return Err(ConfigError::InvalidBackoff { base, cap });
        }
        Ok(())
    }

    /// Saturates at `TimeDelta::MAX` for unvalidated values beyond chrono's range.
    pub fn span(&self) -> chrono::Duration {
        chrono::Duration::try_days(self.days).unwrap_or(chrono::Duration::MAX)
    }

    pub fn window(&self) -> chrono::Duration {
        chrono::Duration::try_hours(self.window_hours).unwrap_or(chrono::Duration::MAX)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}
