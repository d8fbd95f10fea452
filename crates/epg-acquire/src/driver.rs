//! Acquisition driver: plans the work queue, resolves every work item through
//! the executor, coverage check, and fallback, and persists the results.
//!
//! Run lifecycle: `Planning -> Executing(i) -> Finalizing -> Done`, or
//! `Aborted` as soon as any work item fails. There is no skip-and-continue:
//! a guide silently missing a channel-window is worse than a failed run.

use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use futures::stream::{self, StreamExt};
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::cancel::Cancellation;
use crate::config::AcquisitionConfig;
use crate::coverage::{CoverageReport, CoverageValidator};
use crate::error::{AcquireError, AcquireResult, ConfigError, FailureContext, RequestError};
use crate::executor::RequestExecutor;
use crate::fallback::FallbackDecomposer;
use crate::planner::{batch_channels, plan_windows, work_items, PlanSummary};
use crate::progress::{self, ProgressEventKind, ProgressSender};
use crate::retry::{Sleeper, TokioSleeper};
use crate::storage::PersistenceWriter;
use crate::transport::{ScheduleQuery, Transport};
use crate::types::{
    AcquisitionContext, AcquisitionMeta, CombinedDocument, ResolvedResult, WindowTag, WorkItem,
    SCHEDULE_PATH,
};

/// Where a run currently is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    Idle,
    Planning,
    /// Resolving work item `item` (1-based) of `total`.
    Executing { item: usize, total: usize },
    Finalizing,
    Done,
    Aborted,
}

/// Result of a completed run.
#[derive(Debug, Clone)]
pub struct RunSummary {
    pub run_id: Uuid,
    pub work_items: usize,
    pub requests: u64,
    pub fallbacks: u64,
    pub elapsed: Duration,
    pub record_stream: PathBuf,
    pub combined: PathBuf,
    pub document: CombinedDocument,
}

/// A work item that resolved, with the coverage report of its batch response.
struct Resolved {
    result: ResolvedResult,
    report: CoverageReport,
}

/// A work item that failed, and the channel involved if it failed in fallback.
struct ItemFailure {
    source: RequestError,
    channel_id: Option<String>,
}

/// Drives one acquisition run at a time. Counters live on the instance, so a
/// driver can be reused for another run.
pub struct AcquisitionDriver<T, S = TokioSleeper> {
    context: AcquisitionContext,
    config: AcquisitionConfig,
    executor: RequestExecutor<T, S>,
    validator: CoverageValidator,
    fallbacks: AtomicU64,
    state: RunState,
    progress: Option<ProgressSender>,
    seq: u64,
}

impl<T: Transport> AcquisitionDriver<T, TokioSleeper> {
    /// Driver with a real sleeper, talking to `context`'s schedule endpoint.
    pub fn new(context: AcquisitionContext, config: AcquisitionConfig, transport: T) -> Self {
        let executor = RequestExecutor::new(transport, context.schedule_url(), config.retry);
        Self::with_executor(context, config, executor)
    }
}

impl<T: Transport, S: Sleeper> AcquisitionDriver<T, S> {
    pub fn with_executor(
        context: AcquisitionContext,
        config: AcquisitionConfig,
        executor: RequestExecutor<T, S>,
    ) -> Self {
        let validator = CoverageValidator::new(config.min_ratio);
        Self {
            context,
            config,
            executor,
            validator,
            fallbacks: AtomicU64::new(0),
            state: RunState::Idle,
            progress: None,
            seq: 0,
        }
    }

    /// Publish progress events on `tx`.
    pub fn with_progress(mut self, tx: ProgressSender) -> Self {
        self.progress = Some(tx);
        self
    }

    /// Handle that stops the run: no new requests, backoff sleeps cut short.
    pub fn cancellation(&self) -> Cancellation {
        self.executor.cancellation().clone()
    }

    pub fn state(&self) -> RunState {
        self.state
    }

    pub fn config(&self) -> &AcquisitionConfig {
        &self.config
    }

    pub fn requests_issued(&self) -> u64 {
        self.executor.requests_issued()
    }

    pub fn fallbacks_triggered(&self) -> u64 {
        self.fallbacks.load(Ordering::Relaxed)
    }

    /// Acquire `[start, start + days)` for `channel_ids`.
    ///
    /// `channel_ids` is expected deduplicated and ordered. Each resolved work
    /// item is appended to `writer`'s record stream immediately; the combined
    /// document is written only if every work item resolves.
    pub async fn run(
        &mut self,
        start: DateTime<Utc>,
        channel_ids: &[String],
        writer: &mut PersistenceWriter,
    ) -> AcquireResult<RunSummary> {
        let started = Instant::now();
        let run_id = Uuid::new_v4();
        let run_tag = run_id.to_string();
        self.state = RunState::Planning;

        let (items, summary) = match self.plan(start, channel_ids) {
            Ok(planned) => planned,
            Err(e) => {
                self.state = RunState::Aborted;
                return Err(e.into());
            }
        };
        let total = items.len();

        info!(
            run_id = %run_tag,
            url = %self.executor.url(),
            "channels: {} | windows: {} | batches/window: {} | work items: {total} | timeout: {}s",
            channel_ids.len(),
            summary.windows,
            summary.batches,
            self.config.timeout_secs,
        );
        progress::emit(
            &self.progress,
            &run_tag,
            &mut self.seq,
            ProgressEventKind::RunStarted {
                windows: summary.windows,
                batches: summary.batches,
                channels: channel_ids.len(),
                work_items: total,
            },
        );

        let executor = &self.executor;
        let validator = &self.validator;
        let context = &self.context;
        let config = &self.config;
        let fallbacks = &self.fallbacks;
        let cancel = executor.cancellation();
        let state = &mut self.state;
        let seq = &mut self.seq;
        let progress_tx = &self.progress;

        let outcome: AcquireResult<Vec<ResolvedResult>> = async {
            let mut pending = stream::iter(items.iter())
                .map(|item| resolve_work_item(executor, validator, context, config, fallbacks, item))
                .buffered(config.concurrency.max(1));

            let mut payloads = Vec::with_capacity(total);
            for item in &items {
                if cancel.is_cancelled() {
                    return Err(AcquireError::Cancelled {
                        completed: payloads.len(),
                        total,
                    });
                }
                *state = RunState::Executing {
                    item: item.index + 1,
                    total,
                };

                let resolved = match pending.next().await {
                    Some(Ok(resolved)) => resolved,
                    Some(Err(failure)) => {
                        return Err(item_error(item, total, failure, executor, fallbacks));
                    }
                    None => break,
                };

                writer.append(&resolved.result)?;
                let requests = executor.requests_issued();
                let fallback_count = fallbacks.load(Ordering::Relaxed);
                info!(
                    "progress: {}/{total} work items ({:.0}%) | requests: {requests} | fallbacks: {fallback_count} | {:.1}s",
                    item.index + 1,
                    (item.index + 1) as f64 * 100.0 / total as f64,
                    started.elapsed().as_secs_f64(),
                );
                progress::emit(
                    progress_tx,
                    &run_tag,
                    seq,
                    ProgressEventKind::WorkItemResolved {
                        item: item.index + 1,
                        total,
                        window_index: item.window_index,
                        batch_index: item.batch_index,
                        batch_size: item.batch.len(),
                        fallback: resolved.result.fallback,
                        coverage_ratio: resolved.report.ratio,
                        schedules: resolved.result.payload.schedules().len(),
                        requests,
                        fallbacks: fallback_count,
                    },
                );
                payloads.push(resolved.result);
            }
            Ok(payloads)
        }
        .await;

        let payloads = match outcome {
            Ok(payloads) => payloads,
            Err(e) => {
                self.state = RunState::Aborted;
                error!(run_id = %run_tag, "acquisition aborted: {e}");
                progress::emit(
                    &self.progress,
                    &run_tag,
                    &mut self.seq,
                    ProgressEventKind::RunAborted {
                        item: writer.records_written() + 1,
                        message: e.to_string(),
                    },
                );
                return Err(e);
            }
        };

        self.state = RunState::Finalizing;
        let document = CombinedDocument {
            meta: AcquisitionMeta {
                run_id,
                base_url: self.context.base_url.clone(),
                schedule_path: SCHEDULE_PATH.to_string(),
                generated_utc: Utc::now(),
                start_utc: start,
                end_utc: start + self.config.span(),
                days: self.config.days,
                window_hours: self.config.window_hours,
                max_channels: self.config.max_channels,
                include_4k: self.config.include_4k,
                is_4k_compatible: self.config.is_4k_compatible,
                channel_ids_count: channel_ids.len(),
                window_count: summary.windows,
                work_item_count: total,
                requests: self.requests_issued(),
                fallbacks: self.fallbacks_triggered(),
            },
            payloads,
        };

        let combined = match writer.finalize(&document) {
            Ok(path) => path,
            Err(e) => {
                self.state = RunState::Aborted;
                return Err(e);
            }
        };
        self.state = RunState::Done;

        let elapsed = started.elapsed();
        info!(
            run_id = %run_tag,
            "wrote {} and {} | requests: {} | fallbacks: {} | elapsed: {:.1}s",
            writer.stream_path().display(),
            combined.display(),
            document.meta.requests,
            document.meta.fallbacks,
            elapsed.as_secs_f64(),
        );
        progress::emit(
            &self.progress,
            &run_tag,
            &mut self.seq,
            ProgressEventKind::RunCompleted {
                payloads: document.payloads.len(),
                requests: document.meta.requests,
                fallbacks: document.meta.fallbacks,
                elapsed_ms: elapsed.as_millis() as u64,
            },
        );

        Ok(RunSummary {
            run_id,
            work_items: total,
            requests: document.meta.requests,
            fallbacks: document.meta.fallbacks,
            elapsed,
            record_stream: writer.stream_path().to_path_buf(),
            combined,
            document,
        })
    }

    /// Validate and build the work queue; nothing touches the network here.
    fn plan(
        &self,
        start: DateTime<Utc>,
        channel_ids: &[String],
    ) -> Result<(Vec<WorkItem>, PlanSummary), ConfigError> {
        self.config.validate()?;
        if channel_ids.is_empty() {
            return Err(ConfigError::EmptyChannelSet);
        }
        let windows = plan_windows(start, self.config.span(), self.config.window())?;
        let batches = batch_channels(channel_ids, self.config.max_channels)?;
        let summary = PlanSummary::new(&windows, &batches);
        Ok((work_items(&windows, &batches), summary))
    }
}

/// Resolve one work item: batch request, coverage check, fallback if needed.
async fn resolve_work_item<T: Transport, S: Sleeper>(
    executor: &RequestExecutor<T, S>,
    validator: &CoverageValidator,
    context: &AcquisitionContext,
    config: &AcquisitionConfig,
    fallbacks: &AtomicU64,
    item: &WorkItem,
) -> Result<Resolved, ItemFailure> {
    let query = ScheduleQuery::for_window(context, config, &item.window, item.batch.ids());
    let payload = executor.fetch(&query).await.map_err(|source| ItemFailure {
        source,
        channel_id: None,
    })?;

    let report = validator.evaluate(item.batch.ids(), &payload);
    let (payload, fallback) = if report.accepted() {
        (payload, false)
    } else {
        fallbacks.fetch_add(1, Ordering::Relaxed);
        warn!(
            window = %item.window,
            requested = report.requested,
            overlap = report.overlap,
            "partial multi-channel response (coverage {:.2} < {:.2}); falling back to per-channel requests",
            report.ratio,
            validator.min_ratio(),
        );
        let combined = FallbackDecomposer::new(executor)
            .decompose(&query)
            .await
            .map_err(|e| ItemFailure {
                source: e.source,
                channel_id: Some(e.channel_id),
            })?;
        (combined, true)
    };

    Ok(Resolved {
        result: ResolvedResult {
            window: WindowTag::new(&item.window, item.batch.len()),
            fallback,
            payload,
        },
        report,
    })
}

fn item_error<T: Transport, S: Sleeper>(
    item: &WorkItem,
    total: usize,
    failure: ItemFailure,
    executor: &RequestExecutor<T, S>,
    fallbacks: &AtomicU64,
) -> AcquireError {
    if failure.source == RequestError::Cancelled {
        return AcquireError::Cancelled {
            completed: item.index,
            total,
        };
    }
    AcquireError::WorkItem {
        context: Box::new(FailureContext {
            item: item.index + 1,
            total_items: total,
            window_index: item.window_index,
            batch_index: item.batch_index,
            window_start: item.window.start.to_rfc3339(),
            window_end: item.window.end.to_rfc3339(),
            batch_size: item.batch.len(),
            channel_id: failure.channel_id,
            requests_issued: executor.requests_issued(),
            fallbacks_triggered: fallbacks.load(Ordering::Relaxed),
        }),
        source: failure.source,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::executor::testing::{status, RecordingSleeper, ScriptedTransport};
    use crate::retry::RetryPolicy;
    use chrono::TimeZone;

    fn start() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap()
    }

    fn config() -> AcquisitionConfig {
        AcquisitionConfig {
            days: 1,
            window_hours: 24,
            max_channels: 2,
            ..Default::default()
        }
    }

    fn driver(
        script: Vec<Result<crate::transport::RawResponse, crate::error::TransportError>>,
    ) -> AcquisitionDriver<ScriptedTransport, RecordingSleeper> {
        let context = AcquisitionContext::new("https://api.example.com", "tok", "cc");
        let config = config();
        let executor = RequestExecutor::with_sleeper(
            ScriptedTransport::new(script),
            RecordingSleeper::default(),
            context.schedule_url(),
            RetryPolicy::default(),
        );
        AcquisitionDriver::with_executor(context, config, executor)
    }

    fn ids() -> Vec<String> {
        vec!["a".to_string(), "b".to_string()]
    }

    #[tokio::test]
    async fn test_retry_then_done() {
        let body = r#"{"schedules":[{"channelId":"a"},{"channelId":"b"}]}"#;
        let mut driver = driver(vec![status(502, "bad gateway"), status(200, body)]);
        let dir = tempfile::tempdir().unwrap();
        let mut writer = PersistenceWriter::create(dir.path()).unwrap();

        let summary = driver.run(start(), &ids(), &mut writer).await.unwrap();
        assert_eq!(driver.state(), RunState::Done);
        assert_eq!(summary.requests, 2);
        assert_eq!(summary.fallbacks, 0);
        assert_eq!(summary.document.meta.requests, 2);
        assert_eq!(summary.document.meta.work_item_count, 1);
        assert_eq!(writer.records_written(), 1);
    }

    #[tokio::test]
    async fn test_cancelled_before_first_item() {
        let mut driver = driver(Vec::new());
        driver.cancellation().cancel();
        let dir = tempfile::tempdir().unwrap();
        let mut writer = PersistenceWriter::create(dir.path()).unwrap();

        let err = driver.run(start(), &ids(), &mut writer).await.unwrap_err();
        assert!(matches!(
            err,
            AcquireError::Cancelled {
                completed: 0,
                total: 1
            }
        ));
        assert_eq!(driver.state(), RunState::Aborted);
        assert_eq!(driver.requests_issued(), 0);
    }

    #[tokio::test]
    async fn test_invalid_config_aborts_in_planning() {
        let mut driver = driver(Vec::new());
        driver.config.min_ratio = 0.0;
        let dir = tempfile::tempdir().unwrap();
        let mut writer = PersistenceWriter::create(dir.path()).unwrap();

        let err = driver.run(start(), &ids(), &mut writer).await.unwrap_err();
        assert!(matches!(
            err,
            AcquireError::Config(ConfigError::InvalidCoverageRatio(_))
        ));
        assert_eq!(driver.state(), RunState::Aborted);
    }
}
