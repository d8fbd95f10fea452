//! Persistence of resolved payloads.
//!
//! Two artifacts per run:
//! - an append-only JSONL record stream, one resolved payload per line,
//!   flushed as each work item resolves (diagnostic trail of partial runs)
//! - the combined document (`meta` + ordered `payloads`), written once at the
//!   end via a temp file and rename, so it either exists complete or not at all

use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};

use crate::error::{AcquireError, AcquireResult};
use crate::types::{CombinedDocument, ResolvedResult};

/// Default file name of the record stream.
pub const RECORD_STREAM_FILE: &str = "schedule_windows.jsonl";

/// Default file name of the combined document.
pub const COMBINED_FILE: &str = "dtv_schedule_raw.json";

/// Append-only JSONL stream, one line per resolved work item.
pub struct RecordStream {
    file: File,
    path: PathBuf,
    records: usize,
}

impl RecordStream {
    /// Create or truncate the stream; a rerun never intermixes with old lines.
    pub fn create(path: &Path) -> AcquireResult<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(path)?;
        Ok(Self {
            file,
            path: path.to_path_buf(),
            records: 0,
        })
    }

    /// Append one record as a single line and flush it.
    pub fn append(&mut self, record: &ResolvedResult) -> AcquireResult<()> {
        let mut line = serde_json::to_string(record)?;
        line.push('\n');
        self.file.write_all(line.as_bytes())?;
        self.file.flush()?;
        self.records += 1;
        Ok(())
    }

    pub fn records(&self) -> usize {
        self.records
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// Writes the record stream during a run and the combined document at the end.
pub struct PersistenceWriter {
    stream: RecordStream,
    combined_path: PathBuf,
}

impl PersistenceWriter {
    /// Use the default file names inside `out_dir`.
    pub fn create(out_dir: &Path) -> AcquireResult<Self> {
        Self::new(&out_dir.join(RECORD_STREAM_FILE), &out_dir.join(COMBINED_FILE))
    }

    pub fn new(stream_path: &Path, combined_path: &Path) -> AcquireResult<Self> {
        Ok(Self {
            stream: RecordStream::create(stream_path)?,
            combined_path: combined_path.to_path_buf(),
        })
    }

    pub fn append(&mut self, record: &ResolvedResult) -> AcquireResult<()> {
        self.stream.append(record)
    }

    pub fn records_written(&self) -> usize {
        self.stream.records()
    }

    pub fn stream_path(&self) -> &Path {
        self.stream.path()
    }

    pub fn combined_path(&self) -> &Path {
        &self.combined_path
    }

    /// Write the combined document atomically and return its path.
    pub fn finalize(&self, document: &CombinedDocument) -> AcquireResult<PathBuf> {
        write_combined(document, &self.combined_path)?;
        Ok(self.combined_path.clone())
    }
}

/// Write a combined document to `path` via a sibling temp file.
pub fn write_combined(document: &CombinedDocument, path: &Path) -> AcquireResult<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let file_name = path
        .file_name()
        .and_then(|n| n.to_str())
        .ok_or_else(|| AcquireError::Storage(format!("invalid output path: {}", path.display())))?;
    let tmp = path.with_file_name(format!("{file_name}.tmp"));

    {
        let mut file = std::io::BufWriter::new(File::create(&tmp)?);
        serde_json::to_writer_pretty(&mut file, document)?;
        file.write_all(b"\n")?;
        file.flush()?;
    }
    std::fs::rename(&tmp, path)?;
    Ok(())
}

/// Read a combined document written by `write_combined`.
pub fn read_combined(path: &Path) -> AcquireResult<CombinedDocument> {
    let file = File::open(path)?;
    let doc = serde_json::from_reader(BufReader::new(file))?;
    Ok(doc)
}

/// Read back a record stream, skipping blank lines.
pub fn read_records(path: &Path) -> AcquireResult<Vec<ResolvedResult>> {
    let reader = BufReader::new(File::open(path)?);
    let mut records = Vec::new();
    for (n, line) in reader.lines().enumerate() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        let record = serde_json::from_str(&line).map_err(|e| {
            AcquireError::Storage(format!("{}:{}: {e}", path.display(), n + 1))
        })?;
        records.push(record);
    }
    Ok(records)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{AcquisitionMeta, SchedulePayload, TimeWindow, WindowTag};
    use chrono::{TimeZone, Utc};

    fn record(hour: u32) -> ResolvedResult {
        let window = TimeWindow {
            start: Utc.with_ymd_and_hms(2026, 1, 1, hour, 0, 0).unwrap(),
            end: Utc.with_ymd_and_hms(2026, 1, 1, hour + 1, 0, 0).unwrap(),
        };
        ResolvedResult {
            window: WindowTag::new(&window, 2),
            fallback: hour % 2 == 1,
            payload: SchedulePayload::from_json_str(
                r#"{"schedules":[{"channelId":"a","contents":[]}]}"#,
            )
            .unwrap(),
        }
    }

    fn meta() -> AcquisitionMeta {
        let start = Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap();
        AcquisitionMeta {
            run_id: uuid::Uuid::new_v4(),
            base_url: "https://api.example.com".into(),
            schedule_path: crate::types::SCHEDULE_PATH.into(),
            generated_utc: start,
            start_utc: start,
            end_utc: start + chrono::Duration::days(1),
            days: 1,
            window_hours: 6,
            max_channels: 40,
            include_4k: false,
            is_4k_compatible: false,
            channel_ids_count: 2,
            window_count: 4,
            work_item_count: 4,
            requests: 4,
            fallbacks: 0,
        }
    }

    #[test]
    fn test_stream_one_line_per_record() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("s.jsonl");
        let mut stream = RecordStream::create(&path).unwrap();
        stream.append(&record(0)).unwrap();
        stream.append(&record(1)).unwrap();
        assert_eq!(stream.records(), 2);

        let text = std::fs::read_to_string(&path).unwrap();
        assert_eq!(text.lines().count(), 2);
        assert!(text.ends_with('\n'));

        let back = read_records(&path).unwrap();
        assert_eq!(back, vec![record(0), record(1)]);
    }

    #[test]
    fn test_stream_truncates_previous_run() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("s.jsonl");
        {
            let mut stream = RecordStream::create(&path).unwrap();
            stream.append(&record(0)).unwrap();
            stream.append(&record(1)).unwrap();
        }
        let mut stream = RecordStream::create(&path).unwrap();
        stream.append(&record(2)).unwrap();
        assert_eq!(read_records(&path).unwrap(), vec![record(2)]);
    }

    #[test]
    fn test_combined_roundtrip_leaves_no_temp_file() {
        let dir = tempfile::tempdir().unwrap();
        let writer = PersistenceWriter::create(dir.path()).unwrap();
        let doc = CombinedDocument {
            meta: meta(),
            payloads: vec![record(0), record(1)],
        };
        let path = writer.finalize(&doc).unwrap();
        assert_eq!(path, dir.path().join(COMBINED_FILE));
        assert!(!dir.path().join(format!("{COMBINED_FILE}.tmp")).exists());

        let loaded = read_combined(&path).unwrap();
        assert_eq!(loaded, doc);

        let raw: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(raw["meta"]["channel_ids_count"], 2);
        assert_eq!(raw["meta"]["include4K"], false);
        assert_eq!(raw["payloads"][1]["_fallback_single_channel"], true);
    }

    #[test]
    fn test_read_records_reports_bad_line() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.jsonl");
        std::fs::write(&path, "{\"_window\": 1}\n").unwrap();
        let err = read_records(&path).unwrap_err();
        assert!(err.to_string().contains("bad.jsonl:1"));
    }
}
