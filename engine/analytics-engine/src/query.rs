//! # Query Engine
//!
//! Read path: fetch a bounded window of recent events and recompute. The
//! window is bounded by count, not time, so totals describe the window only.

use crate::aggregation::{
    compute_analytics, compute_legacy_summary, AggregationRules, AnalyticsReport, LegacySummary,
};
use crate::config::AggregationConfig;
use crate::error::Result;
use event_store::{Event, EventStore};
use std::sync::Arc;

/// Query engine for analytics data
pub struct QueryEngine {
    config: AggregationConfig,
    rules: AggregationRules,
    store: Arc<dyn EventStore>,
}

impl QueryEngine {
    /// Create new query engine
    pub fn new(
        config: AggregationConfig,
        rules: AggregationRules,
        store: Arc<dyn EventStore>,
    ) -> Self {
        Self { config, rules, store }
    }

    /// Page analytics over the `window_limit` most recent events
    pub async fn get_analytics(&self, window_limit: usize) -> Result<AnalyticsReport> {
        let window = self.window(window_limit).await?;
        let report = compute_analytics(&window, &self.rules);

        tracing::debug!(
            "Computed analytics over {} events: {} pages",
            window.len(),
            report.total_pages
        );

        Ok(report)
    }

    /// Legacy rollup over the `window_limit` most recent events
    pub async fn get_legacy_summary(&self, window_limit: usize) -> Result<LegacySummary> {
        let window = self.window(window_limit).await?;
        Ok(compute_legacy_summary(&window, &self.rules.policy))
    }

    /// Raw events, newest first
    pub async fn get_recent_events(&self, limit: usize) -> Result<Vec<Event>> {
        self.window(limit).await
    }

    /// Page analytics over the configured window
    pub async fn analytics(&self) -> Result<AnalyticsReport> {
        self.get_analytics(self.config.analytics_window).await
    }

    /// Legacy rollup over the configured window
    pub async fn legacy_summary(&self) -> Result<LegacySummary> {
        self.get_legacy_summary(self.config.legacy_window).await
    }

    /// Recent activity feed of the configured size
    pub async fn recent_events(&self) -> Result<Vec<Event>> {
        self.get_recent_events(self.config.recent_limit).await
    }

    async fn window(&self, limit: usize) -> Result<Vec<Event>> {
        self.store.fetch_recent(limit).await.map_err(|e| {
            tracing::error!("Failed to fetch {} recent events: {}", limit, e);
            e.into()
        })
    }
}
