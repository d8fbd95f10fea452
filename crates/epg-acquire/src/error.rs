//! Error types for configuration, single requests, and whole acquisition runs.

use crate::retry::RetryPolicy;

/// Maximum number of body characters kept in an error or log line.
pub const BODY_SNIPPET_LEN: usize = 300;

/// Invalid acquisition parameters, detected before any network activity.
#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum ConfigError {
    #[error("span must be positive, got {0} days")]
    NonPositiveSpan(i64),

    #[error("window size must be positive, got {0} hours")]
    NonPositiveWindow(i64),

    #[error("span of {days} days exceeds the maximum of {max} days")]
    SpanTooLarge { days: i64, max: i64 },

    #[error("window size of {hours} hours exceeds the maximum of {max} hours")]
    WindowTooLarge { hours: i64, max: i64 },

    #[error("planned span does not fit in the supported date range")]
    SpanOutOfRange,

    #[error("max channels per batch must be positive")]
    ZeroBatchSize,

    #[error("channel list is empty")]
    EmptyChannelSet,

    #[error("retry attempts must be at least 1")]
    ZeroAttempts,

    #[error("concurrency cap must be at least 1")]
    ZeroConcurrency,

    #[error("minimum coverage ratio must be in (0, 1], got {0}")]
    InvalidCoverageRatio(f64),

    #[error("backoff base/cap must be non-negative and base <= cap (base={base}s, cap={cap}s)")]
    InvalidBackoff { base: f64, cap: f64 },

    #[error("invalid request header {name}: {reason}")]
    InvalidHeader { name: String, reason: String },

    #[error("HTTP client could not be built: {0}")]
    HttpClient(String),
}

/// Transport-level failure: the request never produced an HTTP status.
#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum TransportError {
    #[error("timed out: {0}")]
    Timeout(String),

    #[error("connection failed: {0}")]
    Connect(String),

    /// The request could not be built or followed (bad URL, redirect loop).
    /// Repeating it cannot succeed.
    #[error("invalid request: {0}")]
    Request(String),

    #[error("request error: {0}")]
    Other(String),
}

impl TransportError {
    pub fn is_retryable(&self) -> bool {
        !matches!(self, TransportError::Request(_))
    }
}

/// Failure of one logical schedule request, after the retry policy ran.
#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum RequestError {
    #[error("transport error: {0}")]
    Transport(#[from] TransportError),

    #[error("HTTP {status}: {snippet}")]
    Status { status: u16, snippet: String },

    #[error("response decode failed (HTTP {status}): {reason}; body: {snippet}")]
    Decode {
        status: u16,
        reason: String,
        snippet: String,
    },

    #[error("gave up after {attempts} attempts: {last}")]
    Exhausted {
        attempts: u32,
        last: Box<RequestError>,
    },

    #[error("request cancelled")]
    Cancelled,
}

impl RequestError {
    /// HTTP status of the failure, if the remote answered at all.
    pub fn status(&self) -> Option<u16> {
        match self {
            RequestError::Status { status, .. } | RequestError::Decode { status, .. } => {
                Some(*status)
            }
            RequestError::Exhausted { last, .. } => last.status(),
            RequestError::Transport(_) | RequestError::Cancelled => None,
        }
    }

    /// Body snippet captured from the remote, if any.
    pub fn snippet(&self) -> Option<&str> {
        match self {
            RequestError::Status { snippet, .. } | RequestError::Decode { snippet, .. } => {
                Some(snippet)
            }
            RequestError::Exhausted { last, .. } => last.snippet(),
            RequestError::Transport(_) | RequestError::Cancelled => None,
        }
    }

    /// Whether another attempt may succeed under `policy`.
    pub fn is_retryable(&self, policy: &RetryPolicy) -> bool {
        match self {
            RequestError::Transport(e) => e.is_retryable(),
            RequestError::Status { status, .. } => policy.is_retryable_status(*status),
            RequestError::Decode { .. } | RequestError::Exhausted { .. } | RequestError::Cancelled => {
                false
            }
        }
    }
}

/// A per-channel request failed while decomposing a rejected batch.
#[derive(thiserror::Error, Debug, Clone, PartialEq)]
#[error("single-channel request for {channel_id} failed: {source}")]
pub struct FallbackError {
    pub channel_id: String,
    #[source]
    pub source: RequestError,
}

/// Where a failed work item sat in the run, and how far the run got.
#[derive(Debug, Clone, PartialEq)]
pub struct FailureContext {
    /// 1-based index of the failing work item.
    pub item: usize,
    pub total_items: usize,
    pub window_index: usize,
    pub batch_index: usize,
    pub window_start: String,
    pub window_end: String,
    pub batch_size: usize,
    /// Channel whose single-channel request failed, for fallback failures.
    pub channel_id: Option<String>,
    pub requests_issued: u64,
    pub fallbacks_triggered: u64,
}

impl std::fmt::Display for FailureContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "work item {}/{} (window {} [{} -> {}], batch {} ({} channels)",
            self.item,
            self.total_items,
            self.window_index + 1,
            self.window_start,
            self.window_end,
            self.batch_index + 1,
            self.batch_size,
        )?;
        if let Some(ref id) = self.channel_id {
            write!(f, ", channel {id}")?;
        }
        write!(
            f,
            "); requests issued: {}, fallbacks triggered: {}",
            self.requests_issued, self.fallbacks_triggered
        )
    }
}

/// Run-level failure. Every variant aborts the acquisition.
#[derive(thiserror::Error, Debug)]
pub enum AcquireError {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("{context} failed: {source}")]
    WorkItem {
        context: Box<FailureContext>,
        #[source]
        source: RequestError,
    },

    #[error("acquisition cancelled after {completed}/{total} work items")]
    Cancelled { completed: usize, total: usize },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Storage error: {0}")]
    Storage(String),
}

/// Convenience result type.
pub type AcquireResult<T> = Result<T, AcquireError>;

/// Shorten a response body for logs and errors, on a char boundary.
pub fn body_snippet(body: &str) -> String {
    let flat = body.replace(['\r', '\n'], " ");
    let trimmed = flat.trim();
    match trimmed.char_indices().nth(BODY_SNIPPET_LEN) {
        Some((idx, _)) => format!("{}…", &trimmed[..idx]),
        None => trimmed.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_snippet_truncates_on_char_boundary() {
        let body = "é".repeat(BODY_SNIPPET_LEN + 50);
        let s = body_snippet(&body);
        assert_eq!(s.chars().count(), BODY_SNIPPET_LEN + 1);
        assert!(s.ends_with('…'));
    }

    #[test]
    fn test_snippet_flattens_newlines() {
        assert_eq!(body_snippet("  line one\nline two\r\n"), "line one line two");
    }

    #[test]
    fn test_status_through_exhausted() {
        let err = RequestError::Exhausted {
            attempts: 3,
            last: Box::new(RequestError::Status {
                status: 503,
                snippet: "busy".into(),
            }),
        };
        assert_eq!(err.status(), Some(503));
        assert_eq!(err.snippet(), Some("busy"));
        assert!(err.to_string().contains("3 attempts"));
    }

    #[test]
    fn test_retryable_classification() {
        let policy = RetryPolicy::default();
        let transport = RequestError::Transport(TransportError::Timeout("20s".into()));
        assert!(transport.is_retryable(&policy));

        let unauthorized = RequestError::Status {
            status: 401,
            snippet: String::new(),
        };
        assert!(!unauthorized.is_retryable(&policy));

        let bad_url = RequestError::Transport(TransportError::Request("relative URL".into()));
        assert!(!bad_url.is_retryable(&policy));
        let reset = RequestError::Transport(TransportError::Other("connection reset".into()));
        assert!(reset.is_retryable(&policy));

        let decode = RequestError::Decode {
            status: 200,
            reason: "EOF".into(),
            snippet: "{".into(),
        };
        assert!(!decode.is_retryable(&policy));
    }

    #[test]
    fn test_failure_context_display() {
        let ctx = FailureContext {
            item: 3,
            total_items: 8,
            window_index: 1,
            batch_index: 0,
            window_start: "2026-01-01T06:00:00+00:00".into(),
            window_end: "2026-01-01T12:00:00+00:00".into(),
            batch_size: 40,
            channel_id: Some("ch-7".into()),
            requests_issued: 12,
            fallbacks_triggered: 1,
        };
        let text = ctx.to_string();
        assert!(text.contains("work item 3/8"));
        assert!(text.contains("window 2"));
        assert!(text.contains("batch 1 (40 channels)"));
        assert!(!text.contains(" of 40"));
        assert!(text.contains("channel ch-7"));
        assert!(text.contains("requests issued: 12"));
        assert!(text.contains("fallbacks triggered: 1"));
    }
}
