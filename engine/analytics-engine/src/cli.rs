//! # Command Line Interface
//!
//! CLI for recording events and querying analytics from a local store.

use crate::config::AnalyticsConfig;
use crate::ingestion::{RawPayload, RecordEventRequest, TimingRequest};
use crate::logging::initialize_logging;
use crate::{init_analytics, AnalyticsEngine};
use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use serde::Serialize;
use serde_json::Value;
use std::path::{Path, PathBuf};

/// Analytics CLI for recording and querying page analytics
#[derive(Parser)]
#[command(name = "analytics-cli")]
#[command(about = "Record interaction events and query page analytics")]
pub struct Cli {
    /// Configuration file (TOML)
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Path to event storage, overriding the configuration
    #[arg(short, long)]
    pub data_path: Option<PathBuf>,

    /// Command to execute
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Record a single event
    Record {
        /// Event type (page_view, click, time_on_page, ...)
        event_type: String,
        /// Page the event belongs to
        #[arg(long)]
        page: Option<String>,
        /// Payload as JSON text
        #[arg(long)]
        payload: Option<String>,
        /// User identifier
        #[arg(long)]
        user: Option<String>,
        /// Creation time (RFC 3339)
        #[arg(long)]
        timestamp: Option<String>,
    },
    /// Record time spent on a page
    Track {
        /// Page path
        #[arg(long)]
        page: String,
        /// Duration in seconds, or milliseconds above the threshold
        #[arg(long)]
        duration: String,
    },
    /// Show page analytics (total pages, most visited, top pages)
    Analytics {
        /// Number of recent events to consider
        #[arg(long)]
        window: Option<usize>,
    },
    /// Show the legacy summary
    Stats {
        /// Number of recent events to consider
        #[arg(long)]
        window: Option<usize>,
    },
    /// Show the most recent raw events
    Recent {
        /// Number of events to show
        #[arg(long)]
        limit: Option<usize>,
    },
    /// Write the effective configuration to a file
    InitConfig {
        /// Destination path
        path: PathBuf,
    },
}

/// Load configuration, set up logging and dispatch the command
pub async fn run(cli: Cli) -> Result<()> {
    let mut config = AnalyticsConfig::load(cli.config.as_deref())?;
    if let Some(data_path) = cli.data_path {
        config.store.data_dir = data_path;
    }

    if let Commands::InitConfig { path } = &cli.command {
        return save_config(&config, path);
    }

    initialize_logging(&config.logging)?;

    let handler = CliHandler::new(config).await?;
    handler.handle_command(cli.command).await
}

/// CLI handler
pub struct CliHandler {
    engine: AnalyticsEngine,
}

impl CliHandler {
    /// Create new CLI handler
    pub async fn new(config: AnalyticsConfig) -> Result<Self> {
        let engine = init_analytics(config).await.context("Failed to open event store")?;
        Ok(Self { engine })
    }

    /// Handle CLI commands
    pub async fn handle_command(&self, command: Commands) -> Result<()> {
        match command {
            Commands::Record { event_type, page, payload, user, timestamp } => {
                let request = RecordEventRequest {
                    event_type: Some(event_type),
                    page,
                    payload: payload.map(RawPayload::Encoded),
                    user,
                    timestamp,
                };
                let id = self.engine.record_event(request).await?;
                self.engine.flush().await?;
                println!("✅ Recorded event {id}");
            }
            Commands::Track { page, duration } => {
                let request =
                    TimingRequest::new(page).with_field("duration", Value::String(duration));
                let id = self.engine.record_timing(request).await?;
                self.engine.flush().await?;
                println!("⏱️ Recorded timing event {id}");
            }
            Commands::Analytics { window } => {
                let window = window.unwrap_or(self.engine.config.aggregation.analytics_window);
                println!("📈 Page Analytics (last {window} events)");
                println!("{}", "=".repeat(50));
                self.print_json(&self.engine.get_analytics(window).await?)?;
            }
            Commands::Stats { window } => {
                let window = window.unwrap_or(self.engine.config.aggregation.legacy_window);
                println!("📊 Summary (last {window} events)");
                println!("{}", "=".repeat(50));
                self.print_json(&self.engine.get_legacy_summary(window).await?)?;
            }
            Commands::Recent { limit } => {
                let limit = limit.unwrap_or(self.engine.config.aggregation.recent_limit);
                let events = self.engine.get_recent_events(limit).await?;
                let last_id = self.engine.last_event_id().await;
                println!("🕒 Recent Events ({} of last {})", events.len(), last_id);
                println!("{}", "=".repeat(50));
                if events.is_empty() {
                    println!("No data found");
                } else {
                    self.print_json(&events)?;
                }
            }
            Commands::InitConfig { path } => {
                save_config(&self.engine.config, &path)?;
            }
        }
        Ok(())
    }

    fn print_json<T: Serialize>(&self, value: &T) -> Result<()> {
        println!("{}", serde_json::to_string_pretty(value)?);
        Ok(())
    }
}

fn save_config(config: &AnalyticsConfig, path: &Path) -> Result<()> {
    config.save_to_file(path)?;
    println!("📝 Wrote configuration to {}", path.display());
    Ok(())
}
