//! Event model
//!
//! Events are immutable once appended. The store assigns `id` and, when the
//! producer did not supply one, `timestamp`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// User recorded when the producer does not identify one
pub const DEFAULT_USER: &str = "anonymous";

/// Event types understood by aggregation. The stored type is an open string;
/// anything not listed here is kept but ignored downstream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    PageView,
    Click,
    TimeOnPage,
}

impl EventKind {
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "page_view" => Some(Self::PageView),
            "click" => Some(Self::Click),
            "time_on_page" => Some(Self::TimeOnPage),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::PageView => "page_view",
            Self::Click => "click",
            Self::TimeOnPage => "time_on_page",
        }
    }
}

/// An event that has not been appended yet
#[derive(Debug, Clone, PartialEq)]
pub struct NewEvent {
    pub event_type: String,
    pub page: Option<String>,
    pub payload: Value,
    pub user: String,
    pub timestamp: Option<DateTime<Utc>>,
}

impl NewEvent {
    pub fn new(event_type: impl Into<String>) -> Self {
        Self {
            event_type: event_type.into(),
            page: None,
            payload: Value::Object(Map::new()),
            user: DEFAULT_USER.to_string(),
            timestamp: None,
        }
    }

    pub fn with_page(mut self, page: impl Into<String>) -> Self {
        self.page = Some(page.into());
        self
    }

    pub fn with_payload(mut self, payload: Value) -> Self {
        self.payload = payload;
        self
    }

    pub fn with_user(mut self, user: impl Into<String>) -> Self {
        self.user = user.into();
        self
    }

    pub fn with_timestamp(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = Some(timestamp);
        self
    }
}

/// A stored event
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    pub id: u64,
    #[serde(rename = "type")]
    pub event_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub page: Option<String>,
    pub payload: Value,
    pub user: String,
    pub timestamp: DateTime<Utc>,
}

impl Event {
    /// Known kind of this event, if any
    pub fn kind(&self) -> Option<EventKind> {
        EventKind::parse(&self.event_type)
    }
}

/// One line of a segment file. The payload is kept as encoded JSON text so
/// the record layout does not depend on the payload's shape.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventRecord {
    pub id: u64,
    #[serde(rename = "type")]
    pub event_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub page: Option<String>,
    pub payload: String,
    pub user: String,
    pub timestamp: DateTime<Utc>,
}

impl EventRecord {
    /// Build the record for `event` under the assigned `id`
    pub fn encode(id: u64, event: NewEvent, now: DateTime<Utc>) -> Self {
        let payload = match serde_json::to_string(&event.payload) {
            Ok(encoded) => encoded,
            Err(e) => {
                tracing::warn!("Failed to encode payload for event {}: {}", id, e);
                "{}".to_string()
            }
        };

        Self {
            id,
            event_type: event.event_type,
            page: event.page,
            payload,
            user: event.user,
            timestamp: event.timestamp.unwrap_or(now),
        }
    }

    /// Decode into an [`Event`]. An undecodable payload becomes `{}`.
    pub fn into_event(self) -> Event {
        let payload = match serde_json::from_str(&self.payload) {
            Ok(value) => value,
            Err(e) => {
                tracing::warn!("Stored payload for event {} is not valid JSON: {}", self.id, e);
                Value::Object(Map::new())
            }
        };

        Event {
            id: self.id,
            event_type: self.event_type,
            page: self.page,
            payload,
            user: self.user,
            timestamp: self.timestamp,
        }
    }
}
