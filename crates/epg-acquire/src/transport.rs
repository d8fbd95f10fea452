//! HTTP transport for the schedule endpoint.
//!
//! `Transport` performs exactly one GET and reports what happened; retry and
//! decoding live in the executor so they can be exercised with a scripted
//! fake transport.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};

use crate::config::AcquisitionConfig;
use crate::error::{ConfigError, TransportError};
use crate::types::{AcquisitionContext, TimeWindow};

const USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) \
                          AppleWebKit/537.36 (KHTML, like Gecko) \
                          Chrome/120.0.0.0 Safari/537.36";
const ORIGIN: &str = "https://stream.directv.com";
const REFERER: &str = "https://stream.directv.com/";

/// Query parameters for one schedule request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScheduleQuery {
    pub start_ms: i64,
    pub end_ms: i64,
    pub channel_ids: Vec<String>,
    pub include_4k: bool,
    pub is_4k_compatible: bool,
    pub client_context: String,
    pub fis_properties: Option<String>,
}

impl ScheduleQuery {
    pub fn for_window(
        context: &AcquisitionContext,
        config: &AcquisitionConfig,
        window: &TimeWindow,
        channel_ids: &[String],
    ) -> Self {
        Self {
            start_ms: window.start_ms(),
            end_ms: window.end_ms(),
            channel_ids: channel_ids.to_vec(),
            include_4k: config.include_4k,
            is_4k_compatible: config.is_4k_compatible,
            client_context: context.client_context.clone(),
            fis_properties: context.fis_properties.clone(),
        }
    }

    /// Same window and flags, narrowed to a single channel.
    pub fn single_channel(&self, channel_id: &str) -> Self {
        Self {
            channel_ids: vec![channel_id.to_string()],
            ..self.clone()
        }
    }

    /// Wire form; `channelIds` is repeated once per identifier.
    pub fn to_pairs(&self) -> Vec<(String, String)> {
        let mut pairs = vec![
            ("startTime".to_string(), self.start_ms.to_string()),
            ("endTime".to_string(), self.end_ms.to_string()),
            ("include4K".to_string(), self.include_4k.to_string()),
            ("is4KCompatible".to_string(), self.is_4k_compatible.to_string()),
            ("clientContext".to_string(), self.client_context.clone()),
        ];
        pairs.extend(
            self.channel_ids
                .iter()
                .map(|id| ("channelIds".to_string(), id.clone())),
        );
        if let Some(ref fis) = self.fis_properties {
            pairs.push(("fisProperties".to_string(), fis.clone()));
        }
        pairs
    }
}

/// Raw outcome of a GET that reached the server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawResponse {
    pub status: u16,
    pub body: String,
    pub elapsed: Duration,
}

/// One GET against the schedule endpoint.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn get(&self, url: &str, query: &ScheduleQuery) -> Result<RawResponse, TransportError>;
}

/// reqwest-backed transport carrying the session headers.
#[derive(Clone)]
pub struct HttpTransport {
    client: reqwest::Client,
}

impl HttpTransport {
    /// Build a client whose default headers carry the bearer token and cookies.
    pub fn new(context: &AcquisitionContext, timeout: Duration) -> Result<Self, ConfigError> {
        let headers = session_headers(context)?;
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .redirect(reqwest::redirect::Policy::limited(5))
            .user_agent(USER_AGENT)
            .default_headers(headers)
            .build()
            .map_err(|e| ConfigError::HttpClient(e.to_string()))?;
        Ok(Self { client })
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn get(&self, url: &str, query: &ScheduleQuery) -> Result<RawResponse, TransportError> {
        let started = Instant::now();
        let resp = self
            .client
            .get(url)
            .query(&query.to_pairs())
            .send()
            .await
            .map_err(classify)?;

        let status = resp.status().as_u16();
        let body = resp.text().await.map_err(classify)?;
        Ok(RawResponse {
            status,
            body,
            elapsed: started.elapsed(),
        })
    }
}

fn classify(e: reqwest::Error) -> TransportError {
    if e.is_timeout() {
        TransportError::Timeout(e.to_string())
    } else if e.is_connect() {
        TransportError::Connect(e.to_string())
    } else if e.is_builder() || e.is_redirect() {
        TransportError::Request(e.to_string())
    } else {
        TransportError::Other(e.to_string())
    }
}

fn session_headers(context: &AcquisitionContext) -> Result<HeaderMap, ConfigError> {
    let mut headers = HeaderMap::new();
    let mut put = |name: &'static str, value: String| -> Result<(), ConfigError> {
        let value = HeaderValue::from_str(&value).map_err(|e| ConfigError::InvalidHeader {
            name: name.to_string(),
            reason: e.to_string(),
        })?;
        headers.insert(HeaderName::from_static(name), value);
        Ok(())
    };

    put("authorization", format!("Bearer {}", context.bearer))?;
    put("accept", "application/json, text/plain, */*".to_string())?;
    put("origin", ORIGIN.to_string())?;
    put("referer", REFERER.to_string())?;
    if !context.cookies.is_empty() {
        let cookie = context
            .cookies
            .iter()
            .map(|(k, v)| format!("{k}={v}"))
            .collect::<Vec<_>>()
            .join("; ");
        put("cookie", cookie)?;
    }

    if let Some(auth) = headers.get_mut("authorization") {
        auth.set_sensitive(true);
    }
    Ok(headers)
}
