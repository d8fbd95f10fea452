//! Progress event types and broadcast channel for acquisition telemetry.
//!
//! The driver emits `ProgressEvent`s while it works through the queue. They
//! flow through a `tokio::sync::broadcast` channel to every subscriber (a
//! progress bar, a log tail); with no subscriber the events are dropped.

use serde::{Deserialize, Serialize};

/// A progress event emitted during an acquisition run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProgressEvent {
    /// Run this event belongs to.
    pub run_id: String,
    /// Monotonically increasing sequence number.
    pub seq: u64,
    pub event: ProgressEventKind,
}

/// The specific kind of progress event.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ProgressEventKind {
    /// Planning finished; the queue is about to be executed.
    RunStarted {
        windows: usize,
        batches: usize,
        channels: usize,
        work_items: usize,
    },
    /// A work item was resolved and durably appended.
    WorkItemResolved {
        /// 1-based position in the queue.
        item: usize,
        total: usize,
        window_index: usize,
        batch_index: usize,
        batch_size: usize,
        fallback: bool,
        coverage_ratio: f64,
        schedules: usize,
        requests: u64,
        fallbacks: u64,
    },
    /// The combined document was written.
    RunCompleted {
        payloads: usize,
        requests: u64,
        fallbacks: u64,
        elapsed_ms: u64,
    },
    /// The run stopped before completion.
    RunAborted { item: usize, message: String },
}

/// Sender handle for emitting progress events.
pub type ProgressSender = tokio::sync::broadcast::Sender<ProgressEvent>;

/// Receiver handle for consuming progress events.
pub type ProgressReceiver = tokio::sync::broadcast::Receiver<ProgressEvent>;

/// Create a new progress broadcast channel with a bounded buffer.
pub fn channel() -> (ProgressSender, ProgressReceiver) {
    tokio::sync::broadcast::channel(256)
}

/// Emit a progress event, ignoring send errors (no receivers listening).
pub fn emit(tx: &Option<ProgressSender>, run_id: &str, seq: &mut u64, event: ProgressEventKind) {
    if let Some(ref sender) = tx {
        *seq += 1;
        let _ = sender.send(ProgressEvent {
            run_id: run_id.to_string(),
            seq: *seq,
            event,
        });
    }
}
