//! # Event Ingestion
//!
//! Validates producer requests, applies defaults and appends events to the
//! store. Bad payload data never blocks a write: only a missing event type
//! (or, for timing requests, a missing page or duration) is rejected.

use crate::config::IngestionConfig;
use crate::error::{AnalyticsError, Result};
use crate::extract::{parse_number, raw_duration, DurationPolicy, TIMING_DURATION_CANDIDATES};
use chrono::{DateTime, Utc};
use event_store::{EventKind, EventStore, NewEvent};
use serde::Deserialize;
use serde_json::{json, Map, Value};
use std::sync::Arc;

/// Payload as sent by a producer: structured data or JSON text
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum RawPayload {
    Encoded(String),
    Structured(Value),
}

impl RawPayload {
    /// Decode into structured data. Undecodable text becomes `{}`.
    pub fn decode(self) -> Value {
        match self {
            Self::Structured(value) => value,
            Self::Encoded(text) => match serde_json::from_str(&text) {
                Ok(value) => value,
                Err(e) => {
                    tracing::warn!("Malformed payload replaced with empty object: {}", e);
                    Value::Object(Map::new())
                }
            },
        }
    }
}

/// Request to record one event
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RecordEventRequest {
    #[serde(rename = "type", default)]
    pub event_type: Option<String>,
    #[serde(default)]
    pub page: Option<String>,
    #[serde(default, alias = "details")]
    pub payload: Option<RawPayload>,
    #[serde(default)]
    pub user: Option<String>,
    /// RFC 3339 creation time
    #[serde(default)]
    pub timestamp: Option<String>,
}

impl RecordEventRequest {
    pub fn new(event_type: impl Into<String>) -> Self {
        Self { event_type: Some(event_type.into()), ..Default::default() }
    }

    pub fn with_page(mut self, page: impl Into<String>) -> Self {
        self.page = Some(page.into());
        self
    }

    pub fn with_payload(mut self, payload: Value) -> Self {
        self.payload = Some(RawPayload::Structured(payload));
        self
    }

    pub fn with_user(mut self, user: impl Into<String>) -> Self {
        self.user = Some(user.into());
        self
    }

    pub fn with_timestamp(mut self, timestamp: impl Into<String>) -> Self {
        self.timestamp = Some(timestamp.into());
        self
    }
}

/// Direct timing request: a page plus a duration under any accepted name
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TimingRequest {
    #[serde(default)]
    pub page: Option<String>,
    #[serde(flatten)]
    pub fields: Map<String, Value>,
}

impl TimingRequest {
    pub fn new(page: impl Into<String>) -> Self {
        Self { page: Some(page.into()), fields: Map::new() }
    }

    pub fn with_field(mut self, key: impl Into<String>, value: Value) -> Self {
        self.fields.insert(key.into(), value);
        self
    }
}

/// Analytics ingestion service
pub struct AnalyticsIngestion {
    config: IngestionConfig,
    policy: DurationPolicy,
    store: Arc<dyn EventStore>,
}

impl AnalyticsIngestion {
    /// Create new analytics ingestion service
    pub fn new(
        config: IngestionConfig,
        policy: DurationPolicy,
        store: Arc<dyn EventStore>,
    ) -> Self {
        Self { config, policy, store }
    }

    /// Record a single event, returning its id
    pub async fn record_event(&self, request: RecordEventRequest) -> Result<u64> {
        let event_type = request
            .event_type
            .filter(|t| !t.is_empty())
            .ok_or_else(|| AnalyticsError::invalid_input("missing event type"))?;

        if EventKind::parse(&event_type).is_none() {
            tracing::debug!("Recording event of unrecognized type {:?}", event_type);
        }

        let user = request
            .user
            .filter(|u| !u.trim().is_empty())
            .unwrap_or_else(|| self.config.default_user.clone());

        let mut event = NewEvent::new(event_type)
            .with_user(user)
            .with_payload(request.payload.map(RawPayload::decode).unwrap_or_else(|| json!({})));

        if let Some(page) = request.page.filter(|p| !p.is_empty()) {
            event = event.with_page(page);
        }

        if let Some(timestamp) = request.timestamp.as_deref().and_then(parse_timestamp) {
            event = event.with_timestamp(timestamp);
        }

        self.append(event).await
    }

    /// Record a `time_on_page` sample from the direct timing request
    pub async fn record_timing(&self, request: TimingRequest) -> Result<u64> {
        let body = Value::Object(request.fields);

        let page = request.page.filter(|p| !p.is_empty());
        let (page, raw) = match (page, raw_duration(&body, TIMING_DURATION_CANDIDATES)) {
            (Some(page), Some(raw)) => (page, raw),
            _ => return Err(AnalyticsError::invalid_input("missing page or duration")),
        };

        let raw = parse_number(raw)
            .ok_or_else(|| AnalyticsError::invalid_input(format!("invalid duration: {raw}")))?;
        let seconds = self.policy.to_seconds(raw);

        let event = NewEvent::new(EventKind::TimeOnPage.as_str())
            .with_page(page.clone())
            .with_payload(json!({ "page": page, "duration": seconds }))
            .with_user(self.config.default_user.clone());

        let id = self.append(event).await?;
        tracing::info!("Tracked {}s on {}", seconds, page);

        Ok(id)
    }

    /// Record a batch; invalid requests are skipped. Returns how many were stored.
    pub async fn ingest_batch(&self, requests: Vec<RecordEventRequest>) -> Result<usize> {
        let mut processed = 0;

        for request in requests {
            match self.record_event(request).await {
                Ok(_) => processed += 1,
                Err(AnalyticsError::InvalidInput(reason)) => {
                    tracing::warn!("Skipping invalid event in batch: {}", reason);
                }
                Err(e) => return Err(e),
            }
        }

        Ok(processed)
    }

    async fn append(&self, event: NewEvent) -> Result<u64> {
        self.store.insert(event).await.map_err(|e| {
            tracing::error!("Failed to store event: {}", e);
            AnalyticsError::from(e)
        })
    }
}

/// Parse a producer timestamp; an unparseable one is dropped so the store
/// assigns the server time instead
fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    match DateTime::parse_from_rfc3339(raw.trim()) {
        Ok(timestamp) => Some(timestamp.with_timezone(&Utc)),
        Err(e) => {
            tracing::warn!("Ignoring unparseable timestamp {:?}: {}", raw, e);
            None
        }
    }
}
