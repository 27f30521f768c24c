//! # Analytics CLI Binary
//!
//! Command-line interface for recording events and querying analytics.

use analytics_engine::cli::{run, Cli};
use anyhow::Result;
use clap::Parser;

#[tokio::main]
async fn main() -> Result<()> {
    // Parse CLI arguments
    let cli = Cli::parse();

    run(cli).await
}
