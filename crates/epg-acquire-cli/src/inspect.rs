//! Summary of an existing combined document.

use std::collections::BTreeSet;
use std::fmt;
use std::path::Path;

use anyhow::{Context, Result};
use serde::Serialize;

use epg_acquire::{read_combined, CombinedDocument};

/// Counts describing one combined document.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DocumentSummary {
    pub run_id: String,
    pub start_utc: String,
    pub end_utc: String,
    pub windows: usize,
    pub payloads: usize,
    pub fallback_payloads: usize,
    /// Channels named by at least one schedule record.
    pub channels_seen: usize,
    pub channels_requested: usize,
    pub schedule_entries: usize,
    pub programme_entries: usize,
    pub requests: u64,
}

/// Load and summarize the combined document at `path`.
pub fn inspect_file(path: &Path) -> Result<DocumentSummary> {
    let doc = read_combined(path)
        .with_context(|| format!("cannot load combined document {}", path.display()))?;
    Ok(summarize(&doc))
}

pub fn summarize(doc: &CombinedDocument) -> DocumentSummary {
    let windows: BTreeSet<i64> = doc.payloads.iter().map(|p| p.window.start_ms).collect();
    let channels: BTreeSet<&str> = doc
        .payloads
        .iter()
        .flat_map(|p| p.payload.channel_ids())
        .collect();

    DocumentSummary {
        run_id: doc.meta.run_id.to_string(),
        start_utc: doc.meta.start_utc.to_rfc3339(),
        end_utc: doc.meta.end_utc.to_rfc3339(),
        windows: windows.len(),
        payloads: doc.payloads.len(),
        fallback_payloads: doc.payloads.iter().filter(|p| p.fallback).count(),
        channels_seen: channels.len(),
        channels_requested: doc.meta.channel_ids_count,
        schedule_entries: doc.payloads.iter().map(|p| p.payload.schedules().len()).sum(),
        programme_entries: doc.payloads.iter().map(|p| p.payload.content_count()).sum(),
        requests: doc.meta.requests,
    }
}

impl fmt::Display for DocumentSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Run:        {}", self.run_id)?;
        writeln!(f, "Span:       {} -> {}", self.start_utc, self.end_utc)?;
        writeln!(f, "Windows:    {}", self.windows)?;
        writeln!(
            f,
            "Payloads:   {} ({} via single-channel fallback)",
            self.payloads, self.fallback_payloads
        )?;
        writeln!(
            f,
            "Channels:   {} seen / {} requested",
            self.channels_seen, self.channels_requested
        )?;
        writeln!(f, "Schedules:  {}", self.schedule_entries)?;
        writeln!(f, "Programmes: {}", self.programme_entries)?;
        write!(f, "Requests:   {}", self.requests)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_report_values_share_one_column() {
        let summary = DocumentSummary {
            run_id: "r".into(),
            start_utc: "s".into(),
            end_utc: "e".into(),
            windows: 1,
            payloads: 2,
            fallback_payloads: 0,
            channels_seen: 3,
            channels_requested: 3,
            schedule_entries: 4,
            programme_entries: 5,
            requests: 6,
        };
        let text = summary.to_string();
        let columns: Vec<usize> = text
            .lines()
            .map(|line| {
                let label_end = line.find(':').unwrap() + 1;
                label_end + line[label_end..].len() - line[label_end..].trim_start().len()
            })
            .collect();
        assert_eq!(columns.len(), 8);
        assert!(columns.iter().all(|c| *c == columns[0]), "{text}");
    }
}
