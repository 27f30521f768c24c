//! Configuration for the event store

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Configuration for the event store
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Base directory for segment files
    pub data_dir: PathBuf,

    /// Maximum size of a single segment before a new one is started
    pub max_segment_bytes: u64,

    /// Flush interval for buffered appends (milliseconds)
    pub flush_interval_ms: u64,

    /// Whether to fsync on every flush
    pub fsync_every_write: bool,

    /// Number of most recent events kept in memory for `fetch_recent`
    pub hot_cache_size: usize,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("./analytics_data"),
            max_segment_bytes: 16 * 1024 * 1024, // 16MB
            flush_interval_ms: 100,
            fsync_every_write: false,
            hot_cache_size: 4096,
        }
    }
}

impl StoreConfig {
    /// Create a new configuration with custom data directory
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        Self { data_dir: data_dir.into(), ..Default::default() }
    }

    /// Get the segments directory path
    pub fn segments_dir(&self) -> PathBuf {
        self.data_dir.join("events")
    }

    pub fn flush_interval(&self) -> Duration {
        Duration::from_millis(self.flush_interval_ms)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), String> {
        if self.max_segment_bytes == 0 {
            return Err("max_segment_bytes must be greater than 0".to_string());
        }

        if self.hot_cache_size == 0 {
            return Err("hot_cache_size must be greater than 0".to_string());
        }

        Ok(())
    }
}
