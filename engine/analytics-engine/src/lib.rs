//! # AnalyticsEngine
//!
//! Collects client interaction events (page views, clicks, time on page) and
//! serves aggregated page analytics.
//!
//! Writes go straight to the event store. Every read fetches a bounded window
//! of the most recent events and recomputes its aggregates from scratch; no
//! aggregate state is kept between calls.

pub mod aggregation;
pub mod cli;
pub mod config;
pub mod error;
pub mod extract;
pub mod ingestion;
pub mod logging;
pub mod query;

#[cfg(test)]
mod tests;

// Re-export main types for easy usage
pub use aggregation::{AnalyticsReport, LegacySummary, PageStat, PageSummary};
pub use config::AnalyticsConfig;
pub use error::{AnalyticsError, Result};
pub use ingestion::{AnalyticsIngestion, RawPayload, RecordEventRequest, TimingRequest};
pub use query::QueryEngine;

use aggregation::AggregationRules;
use event_store::{Event, EventStore, LocalEventStore};
use extract::DurationPolicy;
use std::sync::Arc;

/// Initialize the AnalyticsEngine on a local event store
pub async fn init_analytics(config: AnalyticsConfig) -> Result<AnalyticsEngine> {
    tracing::info!("Initializing AnalyticsEngine with data dir {:?}", config.storage_path());

    let mut store = LocalEventStore::new(config.store.clone())?;
    store.initialize().await?;

    Ok(AnalyticsEngine::with_store(config, Arc::new(store)))
}

/// Main AnalyticsEngine service
pub struct AnalyticsEngine {
    pub ingestion: AnalyticsIngestion,
    pub query_engine: QueryEngine,
    pub config: AnalyticsConfig,
    store: Arc<dyn EventStore>,
}

impl AnalyticsEngine {
    /// Build the engine over an already initialized store
    pub fn with_store(config: AnalyticsConfig, store: Arc<dyn EventStore>) -> Self {
        let policy = DurationPolicy::from_config(&config.normalization);
        let rules = AggregationRules::from_config(&config.aggregation, &config.normalization);

        let ingestion = AnalyticsIngestion::new(config.ingestion.clone(), policy, store.clone());
        let query_engine = QueryEngine::new(config.aggregation.clone(), rules, store.clone());

        Self { ingestion, query_engine, config, store }
    }

    /// Record one event and return its id
    pub async fn record_event(&self, request: RecordEventRequest) -> Result<u64> {
        self.ingestion.record_event(request).await
    }

    /// Record a timing sample from the direct timing request
    pub async fn record_timing(&self, request: TimingRequest) -> Result<u64> {
        self.ingestion.record_timing(request).await
    }

    /// Page analytics over the `window_limit` most recent events
    pub async fn get_analytics(&self, window_limit: usize) -> Result<AnalyticsReport> {
        self.query_engine.get_analytics(window_limit).await
    }

    /// Legacy rollup over the `window_limit` most recent events
    pub async fn get_legacy_summary(&self, window_limit: usize) -> Result<LegacySummary> {
        self.query_engine.get_legacy_summary(window_limit).await
    }

    /// The `limit` most recent raw events, newest first
    pub async fn get_recent_events(&self, limit: usize) -> Result<Vec<Event>> {
        self.query_engine.get_recent_events(limit).await
    }

    /// Flush buffered events to disk
    pub async fn flush(&self) -> Result<()> {
        Ok(self.store.flush().await?)
    }

    /// Highest event id stored so far
    pub async fn last_event_id(&self) -> u64 {
        self.store.last_id().await
    }
}
