pub mod aggregate;
pub mod backoff;
pub mod config;
pub mod date_range;
pub mod error;
pub mod scheduler;
pub mod service;
pub mod store;
pub mod sync;
pub mod types;
pub mod upstream;

use {
    config::Config,
    date_range::{reference_offset, yesterday},
    std::sync::Arc,
    store::SqliteConsentStore,
    sync::SyncOrchestrator,
    upstream::UpstreamConsentClient,
};

/// Daemon entry point: catch up the backfill window, then keep syncing
/// yesterday every morning until ctrl-c.
#[tokio::main]
pub async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenv::dotenv().ok();

    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .target(env_logger::Target::Stderr)
        .init();

    let config = Config::from_env();
    log::info!("🚀 Starting consentflow...");
    log::info!("📊 Configuration:");
    log::info!("   Upstream: {}", config.upstream_base_url);
    log::info!("   Database: {}", config.db_path);
    log::info!("   Backfill start: {}", config.backfill_start_date);
    log::info!(
        "   Reference offset: UTC{:+}, daily sync at {:02}:00",
        config.tz_offset_hours,
        config.daily_sync_hour
    );

    let store = SqliteConsentStore::open(&config.db_path)?;
    let client = UpstreamConsentClient::new(
        &config.upstream_base_url,
        config.upstream_api_token.clone(),
        config.collection_point_guid.clone(),
        config.page_size,
        config.request_timeout,
    )?;

    let orchestrator = Arc::new(SyncOrchestrator::new(
        Arc::new(client),
        store.clone(),
        config.sync_delay,
        config.delete_settle,
    ));

    let offset = reference_offset(config.tz_offset_hours);

    // Catch-up pass: fill anything missing between the backfill start
    // and the most recent fully-elapsed day. Already-synced dates are
    // skipped, so restarts are cheap.
    let catch_up_end = yesterday(chrono::Utc::now(), offset);
    if config.backfill_start_date <= catch_up_end {
        let summary = orchestrator
            .sync_range(config.backfill_start_date, catch_up_end, false)
            .await?;
        log::info!(
            "📦 Catch-up: {} synced, {} skipped, {} failed",
            summary.synced,
            summary.skipped,
            summary.failed_count()
        );
    }

    let scheduler = tokio::spawn(scheduler::daily_sync_task(
        orchestrator,
        offset,
        config.daily_sync_hour,
    ));

    tokio::select! {
        _ = tokio::signal::ctrl_c() => {
            log::info!("👋 Shutting down");
        }
        _ = scheduler => {
            log::error!("❌ Daily sync task exited unexpectedly");
        }
    }

    Ok(())
}
