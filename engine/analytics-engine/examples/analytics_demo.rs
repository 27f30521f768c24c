//! # Analytics Engine Demo
//!
//! Records a short browsing session into a temporary store and prints the
//! resulting analytics.

use analytics_engine::{init_analytics, AnalyticsConfig, RecordEventRequest, TimingRequest};
use serde_json::json;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logging
    tracing_subscriber::fmt::init();

    println!("🚀 Starting AnalyticsEngine Demo");

    let data_dir = std::env::temp_dir().join(format!("analytics-demo-{}", std::process::id()));
    let mut config = AnalyticsConfig::default();
    config.store.data_dir = data_dir.clone();

    let engine = init_analytics(config).await?;

    println!("📊 Generating sample session...");
    for page in ["/", "/products", "/", "/about", "/products", "/", "/analytics"] {
        engine
            .record_event(
                RecordEventRequest::new("page_view")
                    .with_page(page)
                    .with_payload(json!({ "url": format!("http://localhost{page}") })),
            )
            .await?;
    }

    engine
        .record_event(
            RecordEventRequest::new("click")
                .with_page("/products")
                .with_payload(json!({ "tag": "BUTTON", "text": "Add to cart" })),
        )
        .await?;

    // Producers disagree on field names and units
    engine
        .record_event(
            RecordEventRequest::new("time_on_page")
                .with_payload(json!({ "page": "/", "duration": 42000 })),
        )
        .await?;
    engine
        .record_event(
            RecordEventRequest::new("time_on_page")
                .with_payload(json!({ "url": "/products", "timeSpent": 95 })),
        )
        .await?;
    engine.record_timing(TimingRequest::new("/about").with_field("time", json!(12500))).await?;

    println!("\n📈 Analytics:");
    println!("{}", serde_json::to_string_pretty(&engine.get_analytics(2000).await?)?);

    println!("\n📋 Summary:");
    println!("{}", serde_json::to_string_pretty(&engine.get_legacy_summary(1000).await?)?);

    println!("\n🕒 Last 3 events:");
    for event in engine.get_recent_events(3).await? {
        println!("  #{} {} {}", event.id, event.event_type, event.payload);
    }

    engine.flush().await?;
    std::fs::remove_dir_all(&data_dir)?;

    println!("\n✅ Demo completed successfully!");
    Ok(())
}
