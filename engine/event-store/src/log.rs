//! Segmented append-only event log
//!
//! Every event is written as one JSON line to the current segment before it
//! becomes visible to readers. Segments are named after the first id they
//! hold, so their order on disk is recoverable from file names alone.

use crate::config::StoreConfig;
use crate::error::{Result, StoreError};
use crate::event::{Event, EventRecord, NewEvent};
use chrono::Utc;
use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use tokio::sync::Mutex;
use tokio::time::Instant;

const SEGMENT_PREFIX: &str = "events_";
const SEGMENT_EXTENSION: &str = "log";

/// Segment file metadata
#[derive(Debug, Clone)]
pub struct SegmentInfo {
    /// File path
    pub path: PathBuf,

    /// First id stored in this segment (taken from the file name)
    pub first_id: u64,

    /// File size in bytes
    pub size: u64,
}

/// Append-only event log
pub struct EventLog {
    config: StoreConfig,
    segments_dir: PathBuf,
    writer: Mutex<WriterState>,
    last_flush: Mutex<Instant>,
}

/// Single-writer state: id assignment and the open segment move together
struct WriterState {
    last_id: u64,
    current: Option<Segment>,
}

/// Segment currently being written to
struct Segment {
    path: PathBuf,
    writer: BufWriter<File>,
    current_size: u64,
}

impl EventLog {
    /// Open the log under `config.segments_dir()`, recovering the highest id
    pub fn open(config: StoreConfig) -> Result<Self> {
        let segments_dir = config.segments_dir();
        std::fs::create_dir_all(&segments_dir)?;

        let last_id = Self::recover(&segments_dir)?;
        tracing::debug!("Opened event log at {:?}, last id {}", segments_dir, last_id);

        Ok(Self {
            config,
            segments_dir,
            writer: Mutex::new(WriterState { last_id, current: None }),
            last_flush: Mutex::new(Instant::now()),
        })
    }

    /// Highest id appended so far (0 for an empty log)
    pub async fn last_id(&self) -> u64 {
        self.writer.lock().await.last_id
    }

    /// Append an event, assigning the next id. Returns the stored event.
    ///
    /// An error means no id was consumed. Once the line is buffered, rotation
    /// and flush failures are logged and surface on the next explicit `flush`.
    pub async fn append(&self, event: NewEvent) -> Result<Event> {
        let record = {
            let mut state = self.writer.lock().await;
            let id = state.last_id + 1;
            let record = EventRecord::encode(id, event, Utc::now());

            let line = serde_json::to_string(&record)?;
            if state.current.is_none() {
                state.current = Some(self.create_segment(id)?);
            }
            if let Some(segment) = state.current.as_mut() {
                writeln!(segment.writer, "{line}")?;
                segment.current_size += line.len() as u64 + 1;
            }
            state.last_id = id;

            // Id is committed; later failures are logged, not returned
            if let Err(e) = self.check_rotation(&mut state) {
                tracing::error!("Failed to close segment after event {}: {}", id, e);
            }
            record
        };

        if let Err(e) = self.check_flush().await {
            tracing::error!("Deferred flush after event {} failed: {}", record.id, e);
        }

        Ok(record.into_event())
    }

    /// Flush all pending writes to disk
    pub async fn flush(&self) -> Result<()> {
        let mut state = self.writer.lock().await;
        if let Some(ref mut segment) = state.current {
            segment.writer.flush()?;

            if self.config.fsync_every_write {
                segment.writer.get_ref().sync_all()?;
            }
        }

        *self.last_flush.lock().await = Instant::now();

        Ok(())
    }

    /// Read up to `limit` events, newest first, straight from the segments
    pub async fn read_recent(&self, limit: usize) -> Result<Vec<Event>> {
        self.flush().await?;
        self.scan_recent(limit)
    }

    /// Segment files sorted by first id
    pub fn list_segments(&self) -> Result<Vec<SegmentInfo>> {
        Self::segments_in(&self.segments_dir)
    }

    /// Read segments newest first until `limit` events are collected.
    /// Only the segments that hold the requested window are touched.
    pub(crate) fn scan_recent(&self, limit: usize) -> Result<Vec<Event>> {
        let mut events = Vec::with_capacity(limit.min(self.config.hot_cache_size));
        if limit == 0 {
            return Ok(events);
        }

        for segment in self.list_segments()?.iter().rev() {
            let records = Self::read_segment(&segment.path)?;
            for record in records.into_iter().rev() {
                events.push(record.into_event());
                if events.len() == limit {
                    return Ok(events);
                }
            }
        }

        Ok(events)
    }

    // Private methods

    fn create_segment(&self, first_id: u64) -> Result<Segment> {
        let filename = format!("{SEGMENT_PREFIX}{first_id:016x}.{SEGMENT_EXTENSION}");
        let path = self.segments_dir.join(filename);

        let file = OpenOptions::new().create_new(true).append(true).open(&path)?;

        tracing::debug!("Started segment {:?}", path);

        Ok(Segment { path, writer: BufWriter::new(file), current_size: 0 })
    }

    fn check_rotation(&self, state: &mut WriterState) -> Result<()> {
        let full = state
            .current
            .as_ref()
            .is_some_and(|segment| segment.current_size >= self.config.max_segment_bytes);

        if full {
            if let Some(mut segment) = state.current.take() {
                segment.writer.flush()?;
                if self.config.fsync_every_write {
                    segment.writer.get_ref().sync_all()?;
                }
                tracing::info!(
                    "Closed segment {:?} at {} bytes",
                    segment.path,
                    segment.current_size
                );
            }
        }

        Ok(())
    }

    async fn check_flush(&self) -> Result<()> {
        let should_flush = {
            let last_flush = self.last_flush.lock().await;
            last_flush.elapsed() >= self.config.flush_interval()
        };

        if should_flush {
            self.flush().await?;
        }

        Ok(())
    }

    fn segments_in(dir: &Path) -> Result<Vec<SegmentInfo>> {
        let mut segments = Vec::new();

        for entry in std::fs::read_dir(dir)? {
            let entry = entry?;
            let path = entry.path();

            let Some(first_id) = Self::parse_segment_name(&path) else {
                continue;
            };
            let size = entry.metadata()?.len();

            segments.push(SegmentInfo { path, first_id, size });
        }

        segments.sort_by_key(|s| s.first_id);

        Ok(segments)
    }

    fn parse_segment_name(path: &Path) -> Option<u64> {
        if path.extension().and_then(|s| s.to_str()) != Some(SEGMENT_EXTENSION) {
            return None;
        }
        let stem = path.file_stem()?.to_str()?;
        let hex = stem.strip_prefix(SEGMENT_PREFIX)?;
        u64::from_str_radix(hex, 16).ok()
    }

    /// Repair the tail of the newest segment and recover the highest id.
    ///
    /// The recovered id never falls below the newest segment's first id, so
    /// the next segment never lands on an existing file.
    fn recover(dir: &Path) -> Result<u64> {
        let segments = Self::segments_in(dir)?;
        let Some(newest) = segments.last() else {
            return Ok(0);
        };
        let floor = newest.first_id.saturating_sub(1);

        if newest.size == 0 || Self::truncate_torn_tail(&newest.path)? == 0 {
            tracing::warn!("Removing segment {:?} with no complete records", newest.path);
            std::fs::remove_file(&newest.path)?;
        }

        Ok(Self::find_highest_id(dir)?.max(floor))
    }

    /// Cut everything after the last complete record. Returns the kept length.
    fn truncate_torn_tail(path: &Path) -> Result<u64> {
        let bytes = std::fs::read(path)?;
        let mut valid_end = 0;
        let mut start = 0;

        while let Some(offset) = bytes[start..].iter().position(|&b| b == b'\n') {
            let end = start + offset;
            if serde_json::from_slice::<EventRecord>(&bytes[start..end]).is_ok() {
                valid_end = end + 1;
            }
            start = end + 1;
        }

        let kept = valid_end as u64;
        if valid_end < bytes.len() {
            tracing::warn!(
                "Truncating torn tail of {:?} from {} to {} bytes",
                path,
                bytes.len(),
                kept
            );
            OpenOptions::new().write(true).open(path)?.set_len(kept)?;
        }

        Ok(kept)
    }

    fn find_highest_id(dir: &Path) -> Result<u64> {
        // The newest non-empty segment holds the highest id
        for segment in Self::segments_in(dir)?.iter().rev() {
            if let Some(last) = Self::read_segment(&segment.path)?.last() {
                return Ok(last.id);
            }
        }

        Ok(0)
    }

    fn read_segment(path: &Path) -> Result<Vec<EventRecord>> {
        let bytes = std::fs::read(path)?;
        let content = String::from_utf8_lossy(&bytes);
        let mut records: Vec<EventRecord> = Vec::new();

        for (line_no, line) in content.lines().enumerate() {
            if line.trim().is_empty() {
                continue;
            }

            match serde_json::from_str::<EventRecord>(line) {
                Ok(record) => {
                    if let Some(previous) = records.last() {
                        if record.id <= previous.id {
                            return Err(StoreError::corruption(format!(
                                "{:?} line {}: id {} does not follow {}",
                                path,
                                line_no + 1,
                                record.id,
                                previous.id
                            )));
                        }
                    }
                    records.push(record);
                }
                Err(e) => {
                    tracing::warn!("Skipping unreadable line {} in {:?}: {}", line_no + 1, path, e);
                }
            }
        }

        Ok(records)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::TempDir;

    fn test_config(dir: &Path) -> StoreConfig {
        StoreConfig { flush_interval_ms: 0, ..StoreConfig::new(dir) }
    }

    #[tokio::test]
    async fn test_append_assigns_sequential_ids() {
        let temp_dir = TempDir::new().unwrap();
        let log = EventLog::open(test_config(temp_dir.path())).unwrap();

        let first = log.append(NewEvent::new("page_view").with_page("/home")).await.unwrap();
        let second = log.append(NewEvent::new("click")).await.unwrap();

        assert_eq!(first.id, 1);
        assert_eq!(second.id, 2);
        assert_eq!(log.last_id().await, 2);
    }

    #[tokio::test]
    async fn test_ids_continue_after_reopen() {
        let temp_dir = TempDir::new().unwrap();

        {
            let log = EventLog::open(test_config(temp_dir.path())).unwrap();
            for _ in 0..3 {
                log.append(NewEvent::new("page_view")).await.unwrap();
            }
            log.flush().await.unwrap();
        }

        let log = EventLog::open(test_config(temp_dir.path())).unwrap();
        assert_eq!(log.last_id().await, 3);

        let next = log.append(NewEvent::new("page_view")).await.unwrap();
        assert_eq!(next.id, 4);

        let recent = log.read_recent(10).await.unwrap();
        let ids: Vec<u64> = recent.iter().map(|e| e.id).collect();
        assert_eq!(ids, vec![4, 3, 2, 1]);
    }

    #[tokio::test]
    async fn test_rotation_spreads_events_across_segments() {
        let temp_dir = TempDir::new().unwrap();
        let config = StoreConfig { max_segment_bytes: 1, ..test_config(temp_dir.path()) };
        let log = EventLog::open(config).unwrap();

        for i in 0..5 {
            log.append(NewEvent::new("page_view").with_payload(json!({ "n": i }))).await.unwrap();
        }

        let segments = log.list_segments().unwrap();
        assert_eq!(segments.len(), 5);
        assert_eq!(segments[0].first_id, 1);
        assert_eq!(segments[4].first_id, 5);

        let recent = log.read_recent(3).await.unwrap();
        let ids: Vec<u64> = recent.iter().map(|e| e.id).collect();
        assert_eq!(ids, vec![5, 4, 3]);
        assert_eq!(recent[0].payload, json!({ "n": 4 }));
    }

    fn ids(events: &[Event]) -> Vec<u64> {
        events.iter().map(|e| e.id).collect()
    }

    fn segment_path(dir: &Path, first_id: u64) -> PathBuf {
        dir.join("events").join(format!("events_{first_id:016x}.log"))
    }

    #[tokio::test]
    async fn test_unreadable_lines_are_skipped() {
        let temp_dir = TempDir::new().unwrap();
        let log = EventLog::open(test_config(temp_dir.path())).unwrap();
        log.append(NewEvent::new("click")).await.unwrap();
        log.flush().await.unwrap();

        let segment = &log.list_segments().unwrap()[0];
        let valid = EventRecord::encode(2, NewEvent::new("click"), Utc::now());
        let mut file = OpenOptions::new().append(true).open(&segment.path).unwrap();
        writeln!(file, "{{\"id\": 9, \"type\": \"cli").unwrap();
        writeln!(file, "{}", serde_json::to_string(&valid).unwrap()).unwrap();
        drop(file);

        let reopened = EventLog::open(test_config(temp_dir.path())).unwrap();
        assert_eq!(reopened.last_id().await, 2);
        assert_eq!(ids(&reopened.read_recent(5).await.unwrap()), vec![2, 1]);
    }

    #[tokio::test]
    async fn test_torn_tail_is_truncated_on_open() {
        let temp_dir = TempDir::new().unwrap();

        {
            let log = EventLog::open(test_config(temp_dir.path())).unwrap();
            for _ in 0..3 {
                log.append(NewEvent::new("page_view")).await.unwrap();
            }
            log.flush().await.unwrap();
        }

        let path = segment_path(temp_dir.path(), 1);
        let intact = std::fs::read(&path).unwrap();
        let mut file = OpenOptions::new().append(true).open(&path).unwrap();
        write!(file, "{{\"id\":4,\"type\":\"cli").unwrap();
        drop(file);

        {
            let log = EventLog::open(test_config(temp_dir.path())).unwrap();
            assert_eq!(std::fs::read(&path).unwrap(), intact);
            assert_eq!(log.last_id().await, 3);

            let next = log.append(NewEvent::new("click")).await.unwrap();
            assert_eq!(next.id, 4);
            log.flush().await.unwrap();
        }

        let log = EventLog::open(test_config(temp_dir.path())).unwrap();
        assert_eq!(log.last_id().await, 4);
        assert_eq!(ids(&log.read_recent(10).await.unwrap()), vec![4, 3, 2, 1]);
    }

    #[tokio::test]
    async fn test_torn_segment_after_rotation_keeps_acknowledged_events() {
        let temp_dir = TempDir::new().unwrap();
        let config = || StoreConfig { max_segment_bytes: 1, ..test_config(temp_dir.path()) };

        {
            let log = EventLog::open(config()).unwrap();
            for _ in 0..4 {
                log.append(NewEvent::new("page_view")).await.unwrap();
            }
        }

        // Crash right after rotation: the new segment holds only a partial line
        std::fs::write(segment_path(temp_dir.path(), 5), "{\"id\":5,\"type\":\"cli").unwrap();

        let acked = {
            let log = EventLog::open(config()).unwrap();
            assert_eq!(log.last_id().await, 4);
            let event = log.append(NewEvent::new("click")).await.unwrap();
            log.flush().await.unwrap();
            event
        };
        assert_eq!(acked.id, 5);

        let log = EventLog::open(config()).unwrap();
        assert_eq!(log.last_id().await, 5);

        let recent = log.read_recent(10).await.unwrap();
        assert_eq!(ids(&recent), vec![5, 4, 3, 2, 1]);
        assert_eq!(recent[0].event_type, "click");

        let next = log.append(NewEvent::new("click")).await.unwrap();
        assert_eq!(next.id, 6);
    }

    #[tokio::test]
    async fn test_ids_never_fall_behind_newest_segment_name() {
        let temp_dir = TempDir::new().unwrap();

        {
            let log = EventLog::open(test_config(temp_dir.path())).unwrap();
            log.append(NewEvent::new("page_view")).await.unwrap();
            log.append(NewEvent::new("page_view")).await.unwrap();
            log.flush().await.unwrap();
        }
        std::fs::write(segment_path(temp_dir.path(), 9), "").unwrap();

        let log = EventLog::open(test_config(temp_dir.path())).unwrap();
        assert_eq!(log.last_id().await, 8);
        assert_eq!(log.append(NewEvent::new("click")).await.unwrap().id, 9);
        assert_eq!(ids(&log.read_recent(10).await.unwrap()), vec![9, 2, 1]);
    }

    #[tokio::test]
    async fn test_failed_append_consumes_no_id() {
        let temp_dir = TempDir::new().unwrap();
        let log = EventLog::open(test_config(temp_dir.path())).unwrap();

        // Something else already owns the file the first segment would use
        let blocker = segment_path(temp_dir.path(), 1);
        std::fs::write(&blocker, "").unwrap();

        assert!(log.append(NewEvent::new("click")).await.is_err());
        assert_eq!(log.last_id().await, 0);

        std::fs::remove_file(&blocker).unwrap();
        assert_eq!(log.append(NewEvent::new("click")).await.unwrap().id, 1);
        assert_eq!(ids(&log.read_recent(5).await.unwrap()), vec![1]);
    }

    #[tokio::test]
    async fn test_out_of_order_ids_are_corruption() {
        let temp_dir = TempDir::new().unwrap();
        let log = EventLog::open(test_config(temp_dir.path())).unwrap();
        log.append(NewEvent::new("click")).await.unwrap();
        log.flush().await.unwrap();

        let segment = &log.list_segments().unwrap()[0];
        let line = std::fs::read_to_string(&segment.path).unwrap();
        let mut file = OpenOptions::new().append(true).open(&segment.path).unwrap();
        write!(file, "{line}").unwrap();
        drop(file);

        let reopened = EventLog::open(test_config(temp_dir.path()));
        assert!(matches!(reopened, Err(StoreError::Corruption(_))));
    }

    #[tokio::test]
    async fn test_foreign_files_are_ignored() {
        let temp_dir = TempDir::new().unwrap();
        let log = EventLog::open(test_config(temp_dir.path())).unwrap();
        std::fs::write(temp_dir.path().join("events").join("notes.txt"), "hello").unwrap();

        log.append(NewEvent::new("click")).await.unwrap();
        assert_eq!(log.list_segments().unwrap().len(), 1);
    }
}
