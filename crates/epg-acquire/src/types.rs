//! Core data types for schedule acquisition.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Path of the schedule endpoint, relative to the service base URL.
pub const SCHEDULE_PATH: &str = "/discovery/edge/schedule/v1/service/schedule";

/// Artwork descriptor the web guide sends when none was captured.
pub const DEFAULT_FIS_PROPERTIES: &str = "bg-fplayer=2048*1152|iconic=250*144";

/// Authenticated, read-only session values supplied by the caller.
///
/// The engine never refreshes or inspects these; a rejection by the remote
/// service surfaces as a non-retryable request failure.
#[derive(Clone, PartialEq, Eq)]
pub struct AcquisitionContext {
    pub base_url: String,
    pub bearer: String,
    pub client_context: String,
    /// Session cookies as `(name, value)` pairs.
    pub cookies: Vec<(String, String)>,
    /// Artwork-request descriptor (`fisProperties`).
    pub fis_properties: Option<String>,
}

impl AcquisitionContext {
    pub fn new(
        base_url: impl Into<String>,
        bearer: impl Into<String>,
        client_context: impl Into<String>,
    ) -> Self {
        Self {
            base_url: base_url.into(),
            bearer: bearer.into(),
            client_context: client_context.into(),
            cookies: Vec::new(),
            fis_properties: None,
        }
    }

    pub fn with_cookies(mut self, cookies: Vec<(String, String)>) -> Self {
        self.cookies = cookies;
        self
    }

    pub fn with_fis_properties(mut self, fis: Option<String>) -> Self {
        self.fis_properties = fis.filter(|s| !s.trim().is_empty());
        self
    }

    /// Full URL of the schedule endpoint.
    pub fn schedule_url(&self) -> String {
        format!("{}{}", self.base_url.trim_end_matches('/'), SCHEDULE_PATH)
    }
}

impl std::fmt::Debug for AcquisitionContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AcquisitionContext")
            .field("base_url", &self.base_url)
            .field("bearer", &"<redacted>")
            .field("client_context", &format!("<{} chars>", self.client_context.len()))
            .field("cookies", &self.cookies.len())
            .field("fis_properties", &self.fis_properties)
            .finish()
    }
}

/// Half-open interval `[start, end)` in UTC.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TimeWindow {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl TimeWindow {
    pub fn start_ms(&self) -> i64 {
        self.start.timestamp_millis()
    }

    pub fn end_ms(&self) -> i64 {
        self.end.timestamp_millis()
    }

    pub fn duration(&self) -> chrono::Duration {
        self.end - self.start
    }

    pub fn contains(&self, instant: DateTime<Utc>) -> bool {
        self.start <= instant && instant < self.end
    }
}

impl std::fmt::Display for TimeWindow {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} -> {}", self.start.to_rfc3339(), self.end.to_rfc3339())
    }
}

/// Ordered channel identifiers requested together.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ChannelBatch {
    ids: Vec<String>,
}

impl ChannelBatch {
    pub fn new(ids: Vec<String>) -> Self {
        Self { ids }
    }

    pub fn ids(&self) -> &[String] {
        &self.ids
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }
}

/// One (window, batch) pair: the unit of scheduling.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkItem {
    /// 0-based position in window-major, batch-minor order.
    pub index: usize,
    pub window_index: usize,
    pub batch_index: usize,
    pub window: TimeWindow,
    pub batch: ChannelBatch,
}

/// Decoded response body of the schedule endpoint.
///
/// Kept as a raw JSON object; only the `schedules` array and the channel
/// identifiers of its entries are interpreted.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SchedulePayload(Map<String, Value>);

impl SchedulePayload {
    pub fn new(object: Map<String, Value>) -> Self {
        Self(object)
    }

    /// Parse a response body. Anything other than a JSON object is rejected.
    pub fn from_json_str(body: &str) -> Result<Self, String> {
        match serde_json::from_str::<Value>(body) {
            Ok(Value::Object(map)) => Ok(Self(map)),
            Ok(other) => Err(format!("expected a JSON object, got {}", json_kind(&other))),
            Err(e) => Err(e.to_string()),
        }
    }

    /// Per-channel schedule records; empty when the key is missing or malformed.
    pub fn schedules(&self) -> &[Value] {
        match self.0.get("schedules") {
            Some(Value::Array(items)) => items,
            _ => &[],
        }
    }

    /// Channel identifiers named by the schedule records, in response order.
    pub fn channel_ids(&self) -> Vec<&str> {
        self.schedules()
            .iter()
            .filter_map(schedule_channel_id)
            .collect()
    }

    /// Total number of content entries across all schedule records.
    pub fn content_count(&self) -> usize {
        self.schedules()
            .iter()
            .filter_map(|s| s.get("contents").and_then(Value::as_array))
            .map(Vec::len)
            .sum()
    }

    pub fn as_object(&self) -> &Map<String, Value> {
        &self.0
    }

    pub fn insert(&mut self, key: impl Into<String>, value: Value) {
        self.0.insert(key.into(), value);
    }

    pub fn into_inner(self) -> Map<String, Value> {
        self.0
    }
}

/// Channel identifier of one schedule record.
///
/// The service uses `channelId`; synthesized records use `scheduleChannelId`.
pub fn schedule_channel_id(record: &Value) -> Option<&str> {
    let obj = record.as_object()?;
    ["channelId", "scheduleChannelId"]
        .iter()
        .find_map(|k| obj.get(*k).and_then(Value::as_str))
        .filter(|s| !s.is_empty())
}

fn json_kind(v: &Value) -> &'static str {
    match v {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

/// Window metadata attached to every resolved payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WindowTag {
    pub start_utc: DateTime<Utc>,
    pub end_utc: DateTime<Utc>,
    pub start_ms: i64,
    pub end_ms: i64,
    pub batch_size: usize,
}

impl WindowTag {
    pub fn new(window: &TimeWindow, batch_size: usize) -> Self {
        Self {
            start_utc: window.start,
            end_utc: window.end,
            start_ms: window.start_ms(),
            end_ms: window.end_ms(),
            batch_size,
        }
    }
}

/// A schedule payload annotated with its originating work item.
///
/// Serializes as the payload object itself plus `_window` and
/// `_fallback_single_channel` keys, which is what downstream guide writers read.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResolvedResult {
    #[serde(rename = "_window")]
    pub window: WindowTag,
    #[serde(rename = "_fallback_single_channel", default)]
    pub fallback: bool,
    #[serde(flatten)]
    pub payload: SchedulePayload,
}

/// Header of the combined output document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AcquisitionMeta {
    pub run_id: uuid::Uuid,
    pub base_url: String,
    pub schedule_path: String,
    pub generated_utc: DateTime<Utc>,
    pub start_utc: DateTime<Utc>,
    pub end_utc: DateTime<Utc>,
    pub days: i64,
    pub window_hours: i64,
    pub max_channels: usize,
    #[serde(rename = "include4K")]
    pub include_4k: bool,
    #[serde(rename = "is4KCompatible")]
    pub is_4k_compatible: bool,
    pub channel_ids_count: usize,
    pub window_count: usize,
    pub work_item_count: usize,
    pub requests: u64,
    pub fallbacks: u64,
}

/// The final artifact of one acquisition run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CombinedDocument {
    pub meta: AcquisitionMeta,
    pub payloads: Vec<ResolvedResult>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use serde_json::json;

    #[test]
    fn test_schedule_url_joins_without_double_slash() {
        let ctx = AcquisitionContext::new("https://api.example.com/", "tok", "cc");
        assert_eq!(
            ctx.schedule_url(),
            "https://api.example.com/discovery/edge/schedule/v1/service/schedule"
        );
    }

    #[test]
    fn test_debug_redacts_bearer() {
        let ctx = AcquisitionContext::new("https://x", "super-secret", "cc");
        let dbg = format!("{ctx:?}");
        assert!(!dbg.contains("super-secret"));
        assert!(dbg.contains("<redacted>"));
    }

    #[test]
    fn test_payload_rejects_non_object() {
        assert!(SchedulePayload::from_json_str("[1,2]").is_err());
        assert!(SchedulePayload::from_json_str("{\"schedules\": [").is_err());
        assert!(SchedulePayload::from_json_str("{}").is_ok());
    }

    #[test]
    fn test_payload_channel_ids_and_contents() {
        let body = json!({
            "schedules": [
                {"channelId": "a", "contents": [{}, {}]},
                {"scheduleChannelId": "b", "contents": []},
                {"contents": [{}]},
                "garbage"
            ]
        })
        .to_string();
        let payload = SchedulePayload::from_json_str(&body).unwrap();
        assert_eq!(payload.schedules().len(), 4);
        assert_eq!(payload.channel_ids(), vec!["a", "b"]);
        assert_eq!(payload.content_count(), 3);
    }

    #[test]
    fn test_resolved_result_shape() {
        let window = TimeWindow {
            start: Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap(),
            end: Utc.with_ymd_and_hms(2026, 1, 1, 6, 0, 0).unwrap(),
        };
        let payload =
            SchedulePayload::from_json_str(r#"{"schedules":[{"channelId":"a"}]}"#).unwrap();
        let result = ResolvedResult {
            window: WindowTag::new(&window, 1),
            fallback: false,
            payload,
        };

        let value = serde_json::to_value(&result).unwrap();
        assert_eq!(value["schedules"][0]["channelId"], "a");
        assert_eq!(value["_window"]["start_ms"], 1_767_225_600_000i64);
        assert_eq!(value["_window"]["batch_size"], 1);
        assert_eq!(value["_fallback_single_channel"], false);

        let back: ResolvedResult = serde_json::from_value(value).unwrap();
        assert_eq!(back, result);
    }
}
