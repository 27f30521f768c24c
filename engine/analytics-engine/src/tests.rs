//! End-to-end scenarios over a local on-disk store

use crate::{
    init_analytics, AnalyticsConfig, AnalyticsEngine, AnalyticsError, RecordEventRequest,
    TimingRequest,
};
use serde_json::json;
use tempfile::TempDir;

async fn create_test_engine(temp_dir: &TempDir) -> AnalyticsEngine {
    let mut config = AnalyticsConfig::default();
    config.store.data_dir = temp_dir.path().to_path_buf();
    config.store.flush_interval_ms = 0;
    init_analytics(config).await.unwrap()
}

async fn view(engine: &AnalyticsEngine, page: &str) -> u64 {
    engine.record_event(RecordEventRequest::new("page_view").with_page(page)).await.unwrap()
}

async fn time_on(engine: &AnalyticsEngine, page: &str, duration: serde_json::Value) -> u64 {
    let request = RecordEventRequest::new("time_on_page")
        .with_page(page)
        .with_payload(json!({ "duration": duration }));
    engine.record_event(request).await.unwrap()
}

#[tokio::test]
async fn test_home_about_scenario() {
    let temp_dir = TempDir::new().unwrap();
    let engine = create_test_engine(&temp_dir).await;

    for _ in 0..3 {
        view(&engine, "/home").await;
    }
    view(&engine, "/about").await;
    // 15000 is above the threshold (milliseconds), 3 is seconds
    time_on(&engine, "/home", json!(15000)).await;
    time_on(&engine, "/home", json!(3)).await;

    let report = engine.get_analytics(2000).await.unwrap();
    assert_eq!(report.total_pages, 2);

    let most = report.most_visited.unwrap();
    assert_eq!(most.page, "/home");
    assert_eq!(most.views, 3);
    assert_eq!(most.avg_time, "6.0");

    assert_eq!(report.top_pages.len(), 2);
    assert_eq!(report.top_pages[0].page, "/home");
    assert_eq!(report.top_pages[1].avg_time, "0.0");
}

#[tokio::test]
async fn test_time_spent_alias_converted_from_milliseconds() {
    let temp_dir = TempDir::new().unwrap();
    let engine = create_test_engine(&temp_dir).await;

    view(&engine, "/docs").await;
    let request = RecordEventRequest::new("time_on_page")
        .with_payload(json!({ "page": "/docs", "timeSpent": 12000 }));
    engine.record_event(request).await.unwrap();

    let report = engine.get_analytics(2000).await.unwrap();
    assert_eq!(report.most_visited.unwrap().avg_time, "12.0");

    let summary = engine.get_legacy_summary(1000).await.unwrap();
    assert_eq!(summary.avg_time_on_page, "12.00");
}

#[tokio::test]
async fn test_missing_type_persists_nothing() {
    let temp_dir = TempDir::new().unwrap();
    let engine = create_test_engine(&temp_dir).await;

    let request = RecordEventRequest::default().with_page("/home");
    let err = engine.record_event(request).await.unwrap_err();
    assert!(matches!(err, AnalyticsError::InvalidInput(_)));
    assert!(err.is_client_error());

    assert!(engine.get_recent_events(10).await.unwrap().is_empty());
    assert_eq!(engine.last_event_id().await, 0);
}

#[tokio::test]
async fn test_recent_event_round_trip() {
    let temp_dir = TempDir::new().unwrap();
    let engine = create_test_engine(&temp_dir).await;

    let before = chrono::Utc::now();
    let id = engine
        .record_event(
            RecordEventRequest::new("click")
                .with_page("/pricing")
                .with_payload(json!({ "tag": "A", "href": "/signup" }))
                .with_user("visitor-7"),
        )
        .await
        .unwrap();

    let recent = engine.get_recent_events(1).await.unwrap();
    assert_eq!(recent.len(), 1);

    let event = &recent[0];
    assert_eq!(event.id, id);
    assert_eq!(event.event_type, "click");
    assert_eq!(event.page.as_deref(), Some("/pricing"));
    assert_eq!(event.payload, json!({ "tag": "A", "href": "/signup" }));
    assert_eq!(event.user, "visitor-7");
    assert!(event.timestamp >= before);
}

#[tokio::test]
async fn test_recent_events_exact_window() {
    let temp_dir = TempDir::new().unwrap();
    let engine = create_test_engine(&temp_dir).await;

    let mut ids = Vec::new();
    for i in 0..12 {
        ids.push(view(&engine, &format!("/p{i}")).await);
    }

    let recent = engine.get_recent_events(5).await.unwrap();
    let got: Vec<u64> = recent.iter().map(|e| e.id).collect();
    let expected: Vec<u64> = ids.iter().rev().take(5).copied().collect();
    assert_eq!(got, expected);

    assert_eq!(engine.get_recent_events(100).await.unwrap().len(), 12);
}

#[tokio::test]
async fn test_dashboard_views_never_counted() {
    let temp_dir = TempDir::new().unwrap();
    let engine = create_test_engine(&temp_dir).await;

    for _ in 0..5 {
        view(&engine, "/analytics").await;
    }
    time_on(&engine, "/analytics", json!(900)).await;
    view(&engine, "/home").await;

    let report = engine.get_analytics(2000).await.unwrap();
    assert_eq!(report.total_pages, 1);
    assert_eq!(report.most_visited.unwrap().page, "/home");
    assert!(report.top_pages.iter().all(|p| p.page != "/analytics"));
}

#[tokio::test]
async fn test_aggregation_ignores_events_outside_window() {
    let temp_dir = TempDir::new().unwrap();
    let engine = create_test_engine(&temp_dir).await;

    for _ in 0..4 {
        view(&engine, "/old").await;
    }
    view(&engine, "/new").await;
    view(&engine, "/new").await;

    let report = engine.get_analytics(2).await.unwrap();
    assert_eq!(report.total_pages, 1);
    assert_eq!(report.most_visited.unwrap().views, 2);

    let report = engine.get_analytics(6).await.unwrap();
    assert_eq!(report.most_visited.unwrap().page, "/old");
}

#[tokio::test]
async fn test_timing_request_feeds_analytics() {
    let temp_dir = TempDir::new().unwrap();
    let engine = create_test_engine(&temp_dir).await;

    view(&engine, "/about").await;
    view(&engine, "/about").await;
    let timing = TimingRequest::new("/about").with_field("duration", json!(30000));
    engine.record_timing(timing).await.unwrap();

    let err = engine.record_timing(TimingRequest::new("/about")).await.unwrap_err();
    assert!(err.is_client_error());

    let report = engine.get_analytics(2000).await.unwrap();
    let about = report.most_visited.unwrap();
    assert_eq!(about.views, 2);
    assert_eq!(about.avg_time, "15.0");
}

#[tokio::test]
async fn test_events_survive_restart() {
    let temp_dir = TempDir::new().unwrap();

    {
        let engine = create_test_engine(&temp_dir).await;
        view(&engine, "/home").await;
        view(&engine, "/home").await;
        engine.flush().await.unwrap();
    }

    let engine = create_test_engine(&temp_dir).await;
    let id = view(&engine, "/about").await;
    assert_eq!(id, 3);

    let summary = engine.get_legacy_summary(1000).await.unwrap();
    assert_eq!(summary.total_events, 3);
    assert_eq!(summary.page_views, 3);
    assert_eq!(summary.most_viewed_pages.get("/home"), Some(&2));
}

#[tokio::test]
async fn test_legacy_summary_shape() {
    let temp_dir = TempDir::new().unwrap();
    let engine = create_test_engine(&temp_dir).await;

    view(&engine, "/home").await;
    engine.record_event(RecordEventRequest::new("click").with_page("/home")).await.unwrap();
    engine.record_event(RecordEventRequest::new("hover")).await.unwrap();

    let summary = engine.get_legacy_summary(1000).await.unwrap();
    let json = serde_json::to_value(&summary).unwrap();
    assert_eq!(
        json,
        json!({
            "total_events": 3,
            "page_views": 1,
            "clicks": 1,
            "avg_time_on_page": "0.00",
            "most_viewed_pages": { "/home": 1 }
        })
    );
}
