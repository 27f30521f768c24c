//! # Field Extraction
//!
//! Producers name the same value differently (`page`/`url`/`path`,
//! `duration`/`time`/`timeSpent`). Each logical field has an ordered table
//! of candidate sources; the first usable candidate wins.

use crate::config::NormalizationConfig;
use event_store::Event;
use serde_json::Value;

/// Page key used when no candidate yields one
pub const UNKNOWN_PAGE: &str = "unknown";

/// Where a page key may be found
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageSource {
    /// The event's explicit `page` field
    Explicit,
    /// A top-level payload key
    Payload(&'static str),
}

/// Where a raw duration may be found
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DurationSource {
    /// A top-level payload key
    Payload(&'static str),
    /// A key inside a nested payload object
    Nested(&'static str, &'static str),
}

/// Page key candidates, in priority order
pub const PAGE_CANDIDATES: &[PageSource] = &[
    PageSource::Explicit,
    PageSource::Payload("page"),
    PageSource::Payload("url"),
    PageSource::Payload("path"),
];

/// Duration candidates for stored `time_on_page` events
pub const DURATION_CANDIDATES: &[DurationSource] = &[
    DurationSource::Payload("duration"),
    DurationSource::Payload("time"),
    DurationSource::Payload("timeSpent"),
    DurationSource::Nested("details", "duration"),
];

/// Duration candidates for the direct timing request body
pub const TIMING_DURATION_CANDIDATES: &[DurationSource] = &[
    DurationSource::Payload("duration"),
    DurationSource::Payload("timeSpent"),
    DurationSource::Payload("time"),
    DurationSource::Nested("details", "duration"),
];

impl PageSource {
    fn lookup<'a>(&self, explicit: Option<&'a str>, payload: &'a Value) -> Option<&'a str> {
        match self {
            Self::Explicit => explicit,
            Self::Payload(key) => payload.get(*key).and_then(Value::as_str),
        }
    }
}

impl DurationSource {
    fn lookup<'a>(&self, payload: &'a Value) -> Option<&'a Value> {
        match self {
            Self::Payload(key) => payload.get(*key),
            Self::Nested(outer, key) => payload.get(*outer).and_then(|inner| inner.get(*key)),
        }
    }
}

/// First non-empty page key among the candidates
pub fn page_key<'a>(explicit: Option<&'a str>, payload: &'a Value) -> Option<&'a str> {
    PAGE_CANDIDATES
        .iter()
        .filter_map(|source| source.lookup(explicit, payload))
        .find(|page| !page.is_empty())
}

/// Page key for an event, falling back to [`UNKNOWN_PAGE`]
pub fn resolve_page(event: &Event) -> &str {
    page_key(event.page.as_deref(), &event.payload).unwrap_or(UNKNOWN_PAGE)
}

/// First present (non-null) duration candidate. Later candidates are not
/// consulted even if this one turns out not to be numeric.
pub fn raw_duration<'a>(payload: &'a Value, candidates: &[DurationSource]) -> Option<&'a Value> {
    candidates.iter().filter_map(|source| source.lookup(payload)).find(|value| !value.is_null())
}

/// Numeric reading of a JSON number or numeric string
pub fn parse_number(value: &Value) -> Option<f64> {
    let n = match value {
        Value::Number(n) => n.as_f64()?,
        Value::String(s) => {
            let trimmed = s.trim();
            if trimmed.is_empty() {
                return None;
            }
            trimmed.parse::<f64>().ok()?
        }
        _ => return None,
    };

    n.is_finite().then_some(n)
}

/// Unit policy for raw durations
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DurationPolicy {
    ms_threshold: f64,
}

impl DurationPolicy {
    pub fn new(ms_threshold: f64) -> Self {
        Self { ms_threshold }
    }

    pub fn from_config(config: &NormalizationConfig) -> Self {
        Self::new(config.ms_threshold)
    }

    /// Seconds for a raw value: above the threshold it is milliseconds
    pub fn to_seconds(&self, raw: f64) -> f64 {
        if raw > self.ms_threshold {
            raw / 1000.0
        } else {
            raw
        }
    }

    /// Normalized seconds carried by `payload`, if any
    pub fn seconds_from(&self, payload: &Value, candidates: &[DurationSource]) -> Option<f64> {
        raw_duration(payload, candidates).and_then(parse_number).map(|raw| self.to_seconds(raw))
    }

    /// Normalized seconds carried by a stored event, if any
    pub fn event_seconds(&self, event: &Event) -> Option<f64> {
        self.seconds_from(&event.payload, DURATION_CANDIDATES)
    }
}

impl Default for DurationPolicy {
    fn default() -> Self {
        Self::from_config(&NormalizationConfig::default())
    }
}
