//! Work planning: time windows, channel batches, and their cartesian product.

use chrono::{DateTime, Duration, Utc};

use crate::error::ConfigError;
use crate::types::{ChannelBatch, TimeWindow, WorkItem};

/// Split `[start, start + span)` into contiguous windows of `window` length.
///
/// The last window is clipped to the span end, so the count is
/// `ceil(span / window)`.
pub fn plan_windows(
    start: DateTime<Utc>,
    span: Duration,
    window: Duration,
) -> Result<Vec<TimeWindow>, ConfigError> {
    if span <= Duration::zero() {
        return Err(ConfigError::NonPositiveSpan(span.num_days()));
    }
    if window <= Duration::zero() {
        return Err(ConfigError::NonPositiveWindow(window.num_hours()));
    }

    let end = start
        .checked_add_signed(span)
        .ok_or(ConfigError::SpanOutOfRange)?;
    let mut windows = Vec::new();
    let mut cursor = start;
    while cursor < end {
        let next = cursor
            .checked_add_signed(window)
            .map_or(end, |next| next.min(end));
        windows.push(TimeWindow {
            start: cursor,
            end: next,
        });
        cursor = next;
    }
    Ok(windows)
}

/// Split channel identifiers into batches of at most `max_batch`.
///
/// Order is preserved, so the same input always yields the same batches.
pub fn batch_channels(ids: &[String], max_batch: usize) -> Result<Vec<ChannelBatch>, ConfigError> {
    if max_batch == 0 {
        return Err(ConfigError::ZeroBatchSize);
    }
    Ok(ids
        .chunks(max_batch)
        .map(|chunk| ChannelBatch::new(chunk.to_vec()))
        .collect())
}

/// Sort and deduplicate raw identifiers, dropping blanks.
pub fn normalize_channel_ids<I, S>(ids: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut out: Vec<String> = ids
        .into_iter()
        .map(|s| s.as_ref().trim().to_string())
        .filter(|s| !s.is_empty())
        .collect();
    out.sort();
    out.dedup();
    out
}

/// Window-major, batch-minor work queue.
pub fn work_items(windows: &[TimeWindow], batches: &[ChannelBatch]) -> Vec<WorkItem> {
    let mut items = Vec::with_capacity(windows.len() * batches.len());
    for (wi, window) in windows.iter().enumerate() {
        for (bi, batch) in batches.iter().enumerate() {
            items.push(WorkItem {
                index: items.len(),
                window_index: wi,
                batch_index: bi,
                window: *window,
                batch: batch.clone(),
            });
        }
    }
    items
}

/// Shape of a planned run, for logging and dry runs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlanSummary {
    pub windows: usize,
    pub batches: usize,
    pub channels: usize,
    /// Requests if no batch needs decomposition.
    pub min_requests: usize,
    /// Requests if every batch is decomposed into single-channel requests.
    pub max_requests: usize,
}

impl PlanSummary {
    pub fn new(windows: &[TimeWindow], batches: &[ChannelBatch]) -> Self {
        let channels: usize = batches.iter().map(ChannelBatch::len).sum();
        let work = windows.len() * batches.len();
        Self {
            windows: windows.len(),
            batches: batches.len(),
            channels,
            min_requests: work,
            max_requests: work + windows.len() * channels,
        }
    }

    pub fn work_items(&self) -> usize {
        self.windows * self.batches
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 1, 5, 30, 0).unwrap()
    }

    fn ids(n: usize) -> Vec<String> {
        (0..n).map(|i| format!("ch-{i:04}")).collect()
    }

    #[test]
    fn test_windows_cover_span_exactly() {
        for (days, hours) in [(1, 6), (3, 6), (1, 5), (2, 7), (1, 24), (1, 48), (7, 1)] {
            let span = Duration::days(days);
            let windows = plan_windows(t0(), span, Duration::hours(hours)).unwrap();

            let expected = (days * 24 + hours - 1) / hours;
            assert_eq!(windows.len() as i64, expected, "days={days} hours={hours}");
            assert_eq!(windows[0].start, t0());
            assert_eq!(windows.last().unwrap().end, t0() + span);
            for pair in windows.windows(2) {
                assert_eq!(pair[0].end, pair[1].start);
            }
            for w in &windows {
                assert!(w.start < w.end);
                assert!(w.duration() <= Duration::hours(hours));
            }
        }
    }

    #[test]
    fn test_last_window_is_clipped() {
        let windows = plan_windows(t0(), Duration::days(1), Duration::hours(5)).unwrap();
        assert_eq!(windows.len(), 5);
        assert_eq!(windows[4].duration(), Duration::hours(4));
    }

    #[test]
    fn test_non_positive_inputs_rejected() {
        assert!(matches!(
            plan_windows(t0(), Duration::zero(), Duration::hours(6)),
            Err(ConfigError::NonPositiveSpan(_))
        ));
        assert!(matches!(
            plan_windows(t0(), Duration::days(1), Duration::hours(-1)),
            Err(ConfigError::NonPositiveWindow(_))
        ));
        assert_eq!(batch_channels(&ids(3), 0), Err(ConfigError::ZeroBatchSize));
    }

    #[test]
    fn test_span_past_date_range_is_config_error() {
        assert_eq!(
            plan_windows(t0(), Duration::MAX, Duration::hours(6)),
            Err(ConfigError::SpanOutOfRange)
        );
        assert_eq!(
            plan_windows(t0(), Duration::days(1_000_000_000), Duration::hours(6)),
            Err(ConfigError::SpanOutOfRange)
        );
    }

    #[test]
    fn test_window_larger_than_representable_is_one_window() {
        let windows = plan_windows(t0(), Duration::days(1), Duration::MAX).unwrap();
        assert_eq!(windows.len(), 1);
        assert_eq!(windows[0].duration(), Duration::days(1));
    }

    #[test]
    fn test_batches_partition_input() {
        for (n, b) in [(45, 40), (40, 40), (1, 40), (100, 7), (0, 5), (13, 1)] {
            let input = ids(n);
            let batches = batch_channels(&input, b).unwrap();
            assert_eq!(batches.len(), n.div_ceil(b));

            let flat: Vec<String> = batches.iter().flat_map(|x| x.ids().to_vec()).collect();
            assert_eq!(flat, input);

            if let Some((last, rest)) = batches.split_last() {
                assert!(rest.iter().all(|x| x.len() == b));
                assert!(!last.is_empty() && last.len() <= b);
            }
        }
    }

    #[test]
    fn test_batching_is_deterministic() {
        let input = ids(97);
        assert_eq!(
            batch_channels(&input, 10).unwrap(),
            batch_channels(&input, 10).unwrap()
        );
    }

    #[test]
    fn test_normalize_sorts_and_dedups() {
        let raw = vec!["b", " a ", "", "b", "c", "a"];
        assert_eq!(normalize_channel_ids(raw), vec!["a", "b", "c"]);
    }

    #[test]
    fn test_work_items_are_window_major() {
        let windows = plan_windows(t0(), Duration::days(1), Duration::hours(6)).unwrap();
        let batches = batch_channels(&ids(45), 40).unwrap();
        let items = work_items(&windows, &batches);

        assert_eq!(items.len(), 8);
        let order: Vec<(usize, usize)> = items
            .iter()
            .map(|i| (i.window_index, i.batch_index))
            .collect();
        assert_eq!(
            order,
            vec![(0, 0), (0, 1), (1, 0), (1, 1), (2, 0), (2, 1), (3, 0), (3, 1)]
        );
        assert!(items.iter().enumerate().all(|(i, item)| item.index == i));
        assert_eq!(items[1].batch.len(), 5);
    }

    #[test]
    fn test_plan_summary_counts() {
        let windows = plan_windows(t0(), Duration::days(1), Duration::hours(6)).unwrap();
        let batches = batch_channels(&ids(45), 40).unwrap();
        let summary = PlanSummary::new(&windows, &batches);
        assert_eq!(summary.work_items(), 8);
        assert_eq!(summary.channels, 45);
        assert_eq!(summary.min_requests, 8);
        assert_eq!(summary.max_requests, 8 + 4 * 45);
    }
}
