//! # Configuration Management
//!
//! Configuration structures and management for the AnalyticsEngine.
//! Values come from defaults, then an optional TOML file, then `ANALYTICS_*`
//! environment variables.

use anyhow::{Context, Result};
use event_store::StoreConfig;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Route of the analytics dashboard itself
pub const DASHBOARD_ROUTE: &str = "/analytics";

/// Raw durations above this are taken to be milliseconds
pub const DEFAULT_MS_THRESHOLD: f64 = 10_000.0;

/// Main configuration for the AnalyticsEngine
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct AnalyticsConfig {
    /// Event store configuration
    pub store: StoreConfig,
    /// Ingestion configuration
    pub ingestion: IngestionConfig,
    /// Duration normalization configuration
    pub normalization: NormalizationConfig,
    /// Aggregation configuration
    pub aggregation: AggregationConfig,
    /// Logging configuration
    pub logging: LoggingConfig,
}

/// Ingestion configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct IngestionConfig {
    /// User recorded when a producer sends none
    pub default_user: String,
}

impl Default for IngestionConfig {
    fn default() -> Self {
        Self { default_user: event_store::DEFAULT_USER.to_string() }
    }
}

/// Duration normalization configuration
///
/// Producers send durations without a unit. Values strictly greater than
/// `ms_threshold` are read as milliseconds, everything else as seconds. This
/// is an approximation: true second counts above the threshold (about 2.7
/// hours at the default) are misread as milliseconds.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NormalizationConfig {
    pub ms_threshold: f64,
}

impl Default for NormalizationConfig {
    fn default() -> Self {
        Self { ms_threshold: DEFAULT_MS_THRESHOLD }
    }
}

/// Aggregation configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AggregationConfig {
    /// Events considered by the page analytics view
    pub analytics_window: usize,
    /// Events considered by the legacy summary
    pub legacy_window: usize,
    /// Size of the recent activity feed
    pub recent_limit: usize,
    /// Number of pages ranked by average time
    pub top_pages: usize,
    /// Pages never counted (the dashboard's own route)
    pub excluded_pages: Vec<String>,
}

impl Default for AggregationConfig {
    fn default() -> Self {
        Self {
            analytics_window: 2000,
            legacy_window: 1000,
            recent_limit: 10,
            top_pages: 5,
            excluded_pages: vec![DASHBOARD_ROUTE.to_string()],
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,
    /// Log format (pretty, json, compact)
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self { level: "info".to_string(), format: "pretty".to_string() }
    }
}

impl AnalyticsConfig {
    /// Defaults, overlaid with `path` if given, then the environment; validated
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(path) => Self::load_from_file(path)?,
            None => Self::default(),
        };

        config.apply_env_overrides()?;
        config.validate()?;

        Ok(config)
    }

    /// Load configuration from file
    pub fn load_from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {path:?}"))?;
        let config: AnalyticsConfig = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {path:?}"))?;
        Ok(config)
    }

    /// Save configuration to file
    pub fn save_to_file(&self, path: &Path) -> Result<()> {
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)
            .with_context(|| format!("Failed to write config file: {path:?}"))?;
        Ok(())
    }

    /// Override values from `ANALYTICS_*` environment variables
    pub fn apply_env_overrides(&mut self) -> Result<()> {
        if let Ok(data_dir) = std::env::var("ANALYTICS_DATA_DIR") {
            self.store.data_dir = PathBuf::from(data_dir);
        }

        if let Ok(level) = std::env::var("ANALYTICS_LOG_LEVEL") {
            self.logging.level = level;
        }

        if let Ok(format) = std::env::var("ANALYTICS_LOG_FORMAT") {
            self.logging.format = format;
        }

        if let Ok(window) = std::env::var("ANALYTICS_WINDOW_LIMIT") {
            self.aggregation.analytics_window = window
                .parse()
                .with_context(|| format!("Invalid ANALYTICS_WINDOW_LIMIT: {window}"))?;
        }

        if let Ok(threshold) = std::env::var("ANALYTICS_MS_THRESHOLD") {
            self.normalization.ms_threshold = threshold
                .parse()
                .with_context(|| format!("Invalid ANALYTICS_MS_THRESHOLD: {threshold}"))?;
        }

        Ok(())
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        self.store.validate().map_err(|e| anyhow::anyhow!("Invalid store config: {e}"))?;

        if self.aggregation.analytics_window == 0 || self.aggregation.legacy_window == 0 {
            return Err(anyhow::anyhow!("Aggregation windows must be greater than 0"));
        }

        if self.aggregation.recent_limit == 0 {
            return Err(anyhow::anyhow!("recent_limit must be greater than 0"));
        }

        if self.aggregation.top_pages == 0 {
            return Err(anyhow::anyhow!("top_pages must be greater than 0"));
        }

        if !(self.normalization.ms_threshold.is_finite() && self.normalization.ms_threshold > 0.0) {
            return Err(anyhow::anyhow!(
                "Invalid ms_threshold: {}",
                self.normalization.ms_threshold
            ));
        }

        match self.logging.level.as_str() {
            "trace" | "debug" | "info" | "warn" | "error" => {}
            _ => return Err(anyhow::anyhow!("Invalid log level: {}", self.logging.level)),
        }

        match self.logging.format.as_str() {
            "json" | "pretty" | "compact" => {}
            _ => return Err(anyhow::anyhow!("Invalid log format: {}", self.logging.format)),
        }

        Ok(())
    }

    /// Get storage path for the config
    pub fn storage_path(&self) -> &PathBuf {
        &self.store.data_dir
    }
}
