//! # Page Aggregation
//!
//! Turns a window of raw events into the page analytics view and the legacy
//! summary. Everything here is a pure function of the window: nothing is
//! cached between calls.

use crate::config::{AggregationConfig, NormalizationConfig};
use crate::extract::{resolve_page, DurationPolicy};
use event_store::{Event, EventKind};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

/// Per-page aggregate for one window
#[derive(Debug, Clone, PartialEq)]
pub struct PageStat {
    pub page: String,
    /// `page_view` events for this page
    pub views: u64,
    /// Accumulated `time_on_page` seconds for this page
    pub total_time: f64,
}

impl PageStat {
    fn new(page: &str) -> Self {
        Self { page: page.to_string(), views: 0, total_time: 0.0 }
    }

    /// `total_time / views`, or 0 without views
    pub fn avg_time(&self) -> f64 {
        if self.views > 0 {
            self.total_time / self.views as f64
        } else {
            0.0
        }
    }
}

/// Page entry in the analytics view
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageSummary {
    pub page: String,
    pub views: u64,
    /// Average seconds per view, one decimal place
    pub avg_time: String,
}

impl From<&PageStat> for PageSummary {
    fn from(stat: &PageStat) -> Self {
        Self {
            page: stat.page.clone(),
            views: stat.views,
            avg_time: format!("{:.1}", stat.avg_time()),
        }
    }
}

/// Page analytics view
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalyticsReport {
    /// Distinct page keys after exclusion
    pub total_pages: usize,
    pub most_visited: Option<PageSummary>,
    pub top_pages: Vec<PageSummary>,
}

/// Legacy rollup
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LegacySummary {
    /// Events in the window, of any type
    pub total_events: usize,
    pub page_views: u64,
    pub clicks: u64,
    /// Mean seconds across all timed events, two decimal places
    pub avg_time_on_page: String,
    pub most_viewed_pages: BTreeMap<String, u64>,
}

/// Policy knobs for a single aggregation call
#[derive(Debug, Clone)]
pub struct AggregationRules {
    pub policy: DurationPolicy,
    pub excluded_pages: Vec<String>,
    pub top_pages: usize,
}

impl AggregationRules {
    pub fn from_config(
        aggregation: &AggregationConfig,
        normalization: &NormalizationConfig,
    ) -> Self {
        Self {
            policy: DurationPolicy::from_config(normalization),
            excluded_pages: aggregation.excluded_pages.clone(),
            top_pages: aggregation.top_pages,
        }
    }

    fn is_excluded(&self, page: &str) -> bool {
        self.excluded_pages.iter().any(|excluded| excluded == page)
    }
}

impl Default for AggregationRules {
    fn default() -> Self {
        Self::from_config(&AggregationConfig::default(), &NormalizationConfig::default())
    }
}

/// Group a window by page key, in order of first sight.
///
/// Only `page_view` and `time_on_page` events touch per-page state; clicks
/// and unknown types never create an entry.
pub fn group_pages(events: &[Event], rules: &AggregationRules) -> Vec<PageStat> {
    let mut stats: Vec<PageStat> = Vec::new();
    let mut index: HashMap<String, usize> = HashMap::new();

    for event in events {
        let kind = match event.kind() {
            Some(kind @ (EventKind::PageView | EventKind::TimeOnPage)) => kind,
            _ => continue,
        };

        let page = resolve_page(event);
        if rules.is_excluded(page) {
            continue;
        }

        let slot = *index.entry(page.to_string()).or_insert_with(|| {
            stats.push(PageStat::new(page));
            stats.len() - 1
        });
        let stat = &mut stats[slot];

        match kind {
            EventKind::PageView => stat.views += 1,
            EventKind::TimeOnPage => {
                if let Some(seconds) = rules.policy.event_seconds(event) {
                    stat.total_time += seconds;
                }
            }
            EventKind::Click => {}
        }
    }

    stats
}

/// Page with the most views; on a tie the one grouped first wins
pub fn most_visited(stats: &[PageStat]) -> Option<&PageStat> {
    let mut best: Option<&PageStat> = None;
    for stat in stats {
        if best.map_or(true, |b| stat.views > b.views) {
            best = Some(stat);
        }
    }
    best
}

/// Up to `n` pages by average time, descending; ties keep grouping order.
///
/// Ranks on the unrounded average, so pages whose one-decimal `avgTime`
/// strings are equal may still be ordered by their exact averages.
pub fn top_pages(stats: &[PageStat], n: usize) -> Vec<&PageStat> {
    let mut ranked: Vec<&PageStat> = stats.iter().collect();
    ranked.sort_by(|a, b| b.avg_time().total_cmp(&a.avg_time()));
    ranked.truncate(n);
    ranked
}

/// Compute the page analytics view for a window
pub fn compute_analytics(events: &[Event], rules: &AggregationRules) -> AnalyticsReport {
    let stats = group_pages(events, rules);

    AnalyticsReport {
        total_pages: stats.len(),
        most_visited: most_visited(&stats).map(PageSummary::from),
        top_pages: top_pages(&stats, rules.top_pages).into_iter().map(PageSummary::from).collect(),
    }
}

/// Compute the legacy rollup for a window
pub fn compute_legacy_summary(events: &[Event], policy: &DurationPolicy) -> LegacySummary {
    let mut summary = LegacySummary {
        total_events: events.len(),
        page_views: 0,
        clicks: 0,
        avg_time_on_page: String::new(),
        most_viewed_pages: BTreeMap::new(),
    };

    let mut total_seconds = 0.0;
    let mut timed_events = 0u64;

    for event in events {
        match event.kind() {
            Some(EventKind::PageView) => {
                summary.page_views += 1;
                *summary.most_viewed_pages.entry(resolve_page(event).to_string()).or_insert(0) += 1;
            }
            Some(EventKind::Click) => summary.clicks += 1,
            Some(EventKind::TimeOnPage) => {
                if let Some(seconds) = policy.event_seconds(event) {
                    total_seconds += seconds;
                    timed_events += 1;
                }
            }
            None => {}
        }
    }

    let average = if timed_events > 0 { total_seconds / timed_events as f64 } else { 0.0 };
    summary.avg_time_on_page = format!("{average:.2}");

    summary
}
