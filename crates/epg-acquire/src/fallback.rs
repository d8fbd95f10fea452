//! Decomposition of a rejected batch into single-channel requests.

use serde_json::{json, Value};
use tracing::debug;

use crate::error::FallbackError;
use crate::executor::RequestExecutor;
use crate::retry::Sleeper;
use crate::transport::{ScheduleQuery, Transport};
use crate::types::SchedulePayload;

/// Marker key set on payloads assembled from single-channel responses.
pub const COMBINED_KEY: &str = "_combined";

/// Merge per-channel payloads into the shape of one multi-channel response.
///
/// Each channel contributes its schedule records in order; a channel with no
/// records gets an empty placeholder so it is still accounted for downstream.
pub fn combine_channel_payloads<I>(channel_payloads: I) -> SchedulePayload
where
    I: IntoIterator<Item = (String, SchedulePayload)>,
{
    let mut schedules: Vec<Value> = Vec::new();
    for (channel_id, payload) in channel_payloads {
        let records = payload.schedules();
        if records.is_empty() {
            schedules.push(json!({ "scheduleChannelId": channel_id, "contents": [] }));
        } else {
            schedules.extend(records.iter().cloned());
        }
    }

    let mut combined = SchedulePayload::default();
    combined.insert("schedules", Value::Array(schedules));
    combined.insert(COMBINED_KEY, Value::Bool(true));
    combined
}

/// Re-issues a rejected batch one channel at a time through the executor.
pub struct FallbackDecomposer<'a, T, S> {
    executor: &'a RequestExecutor<T, S>,
}

impl<'a, T: Transport, S: Sleeper> FallbackDecomposer<'a, T, S> {
    pub fn new(executor: &'a RequestExecutor<T, S>) -> Self {
        Self { executor }
    }

    /// Fetch every channel of `batch_query` individually, in order.
    ///
    /// The first per-channel failure aborts the decomposition.
    pub async fn decompose(&self, batch_query: &ScheduleQuery) -> Result<SchedulePayload, FallbackError> {
        let mut parts = Vec::with_capacity(batch_query.channel_ids.len());
        for channel_id in &batch_query.channel_ids {
            let query = batch_query.single_channel(channel_id);
            let payload = self
                .executor
                .fetch(&query)
                .await
                .map_err(|source| FallbackError {
                    channel_id: channel_id.clone(),
                    source,
                })?;
            debug!(
                channel = %channel_id,
                records = payload.schedules().len(),
                "single-channel schedule fetched"
            );
            parts.push((channel_id.clone(), payload));
        }
        Ok(combine_channel_payloads(parts))
    }
}
