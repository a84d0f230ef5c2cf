//! Operator backfill over a historical date range
//!
//! Usage: backfill <start YYYY-MM-DD> <end YYYY-MM-DD> [--force]
//!
//! Runs the standard batch sync: sequential dates, pacing between
//! requests, per-date failure isolation. `--force` refetches dates
//! that are already synced (delete-then-fetch per date).

use consentflow::config::Config;
use consentflow::store::SqliteConsentStore;
use consentflow::sync::SyncOrchestrator;
use consentflow::upstream::UpstreamConsentClient;
use chrono::NaiveDate;
use std::sync::Arc;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenv::dotenv().ok();
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args: Vec<String> = std::env::args().collect();
    if args.len() < 3 {
        eprintln!("Usage: backfill <start YYYY-MM-DD> <end YYYY-MM-DD> [--force]");
        std::process::exit(1);
    }

    let start: NaiveDate = args[1].parse()?;
    let end: NaiveDate = args[2].parse()?;
    let force = args.iter().any(|a| a == "--force");

    let config = Config::from_env();
    let store = SqliteConsentStore::open(&config.db_path)?;
    let client = UpstreamConsentClient::new(
        &config.upstream_base_url,
        config.upstream_api_token.clone(),
        config.collection_point_guid.clone(),
        config.page_size,
        config.request_timeout,
    )?;

    let orchestrator = SyncOrchestrator::new(
        Arc::new(client),
        store,
        config.sync_delay,
        config.delete_settle,
    );

    let summary = orchestrator.sync_range(start, end, force).await?;

    println!(
        "Backfill {} → {}: {} synced, {} skipped, {} failed",
        start,
        end,
        summary.synced,
        summary.skipped,
        summary.failed_count()
    );
    for failure in &summary.failed {
        println!("[{}] Error: {}", failure.date, failure.reason);
    }

    if summary.failed_count() > 0 {
        std::process::exit(1);
    }
    Ok(())
}
