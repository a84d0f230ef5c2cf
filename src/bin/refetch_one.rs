//! Forced refetch of a single date
//!
//! Usage: refetch_one <YYYY-MM-DD>
//!
//! Deletes any existing data for the date (upstream cache and local
//! record) and resyncs it from scratch.

use consentflow::config::Config;
use consentflow::store::SqliteConsentStore;
use consentflow::sync::{SyncOrchestrator, SyncOutcome};
use consentflow::upstream::UpstreamConsentClient;
use chrono::NaiveDate;
use std::sync::Arc;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenv::dotenv().ok();
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let date: NaiveDate = match std::env::args().nth(1) {
        Some(arg) => arg.parse()?,
        None => {
            eprintln!("Usage: refetch_one <YYYY-MM-DD>, e.g. refetch_one 2025-07-02");
            std::process::exit(1);
        }
    };

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

    match orchestrator.sync_date(date, true).await {
        SyncOutcome::Synced | SyncOutcome::Skipped => {
            println!("✓ Successfully refetched data for {}", date);
            Ok(())
        }
        SyncOutcome::Failed(e) => {
            eprintln!("✗ Error refetching {}: {}", date, e);
            std::process::exit(1);
        }
    }
}
