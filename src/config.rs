//! Configuration loaded from environment variables

use chrono::NaiveDate;
use std::env;
use std::time::Duration;

/// Runtime configuration for the sync engine
///
/// Loaded from environment variables (`.env` honoured via dotenv).
/// Only the upstream base URL is required; everything else carries the
/// defaults the original deployment ran with.
#[derive(Debug, Clone)]
pub struct Config {
    /// Base URL of the upstream consent service
    pub upstream_base_url: String,

    /// Bearer token sent on every upstream request
    pub upstream_api_token: Option<String>,

    /// Collection point scoping the upstream profile listing
    pub collection_point_guid: Option<String>,

    /// Path to the SQLite database file
    pub db_path: String,

    /// Per-request deadline for upstream calls
    pub request_timeout: Duration,

    /// Pause between consecutive dates in a batch run
    pub sync_delay: Duration,

    /// Settling pause after a forced delete, before the refetch
    pub delete_settle: Duration,

    /// Reference timezone, whole hours east of UTC (the dashboard
    /// reports against Asia/Bangkok, +7)
    pub tz_offset_hours: i32,

    /// Local wall-clock hour the daily sync fires at
    pub daily_sync_hour: u32,

    /// First day the backfill catch-up covers
    pub backfill_start_date: NaiveDate,

    /// Upstream page size for the profile listing
    pub page_size: u32,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Self {
        let upstream_base_url =
            env::var("UPSTREAM_BASE_URL").expect("UPSTREAM_BASE_URL must be set in .env file");

        let backfill_start_date = env::var("BACKFILL_START_DATE")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or_else(|| {
                NaiveDate::from_ymd_opt(2025, 2, 27).expect("valid default backfill start")
            });

        Self {
            upstream_base_url,
            upstream_api_token: env::var("UPSTREAM_API_TOKEN").ok(),
            collection_point_guid: env::var("COLLECTION_POINT_GUID").ok(),
            db_path: env::var("CONSENT_DB_PATH").unwrap_or_else(|_| "consent_data.db".to_string()),
            request_timeout: Duration::from_secs(env_u64("REQUEST_TIMEOUT_SECS", 30)),
            sync_delay: Duration::from_millis(env_u64("SYNC_DELAY_MS", 1_000)),
            delete_settle: Duration::from_millis(env_u64("DELETE_SETTLE_MS", 1_000)),
            tz_offset_hours: env::var("TZ_OFFSET_HOURS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(7),
            daily_sync_hour: env::var("DAILY_SYNC_HOUR")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(5),
            backfill_start_date,
            page_size: env::var("PAGE_SIZE")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(50),
        }
    }
}

fn env_u64(key: &str, default: u64) -> u64 {
    env::var(key).ok().and_then(|s| s.parse().ok()).unwrap_or(default)
}
