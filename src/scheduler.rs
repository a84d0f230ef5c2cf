//! Background task for the daily sync
//!
//! Fires once per day at the configured local wall-clock hour and
//! force-refetches yesterday, the most recent fully-elapsed day. The
//! orchestrator entry points stay pure; this is just the trigger glue,
//! replaceable by cron or any external scheduler.

use crate::date_range::yesterday;
use crate::sync::{SyncOrchestrator, SyncOutcome};
use chrono::{DateTime, Duration as ChronoDuration, FixedOffset, Timelike, Utc};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::sleep;

/// Runs until cancelled.
pub async fn daily_sync_task(
    orchestrator: Arc<SyncOrchestrator>,
    offset: FixedOffset,
    fire_hour: u32,
) {
    log::info!("⏰ Daily sync scheduled for {:02}:00 (UTC{})", fire_hour, offset);

    loop {
        let wait = duration_until_next_fire(Utc::now(), offset, fire_hour);
        log::info!("   └─ Next run in {}s", wait.as_secs());
        sleep(wait).await;

        let target = yesterday(Utc::now(), offset);
        log::info!("🌅 Daily sync firing for {}", target);

        match orchestrator.sync_date(target, true).await {
            SyncOutcome::Synced => log::info!("✅ Daily sync complete for {}", target),
            SyncOutcome::Skipped => log::info!("⏭️  Daily sync skipped for {}", target),
            SyncOutcome::Failed(e) => {
                // Next night's run (or an operator refetch) covers it
                log::error!("❌ Daily sync failed for {}: {}", target, e);
            }
        }
    }
}

/// Gap from `now` until the next occurrence of `fire_hour:00` local
/// time in the reference offset.
fn duration_until_next_fire(now: DateTime<Utc>, offset: FixedOffset, fire_hour: u32) -> Duration {
    let local = now.with_timezone(&offset);
    let today_fire = local
        .with_hour(fire_hour)
        .and_then(|t| t.with_minute(0))
        .and_then(|t| t.with_second(0))
        .and_then(|t| t.with_nanosecond(0))
        .unwrap_or(local);

    let next_fire = if local < today_fire {
        today_fire
    } else {
        today_fire + ChronoDuration::days(1)
    };

    (next_fire - local).to_std().unwrap_or(Duration::ZERO)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::date_range::reference_offset;
    use chrono::TimeZone;

    #[test]
    fn test_fire_later_today() {
        let offset = reference_offset(7);
        // 01:00 local (+7) on July 2nd; next 05:00 is 4h away
        let now = Utc.with_ymd_and_hms(2025, 7, 1, 18, 0, 0).unwrap();
        let wait = duration_until_next_fire(now, offset, 5);
        assert_eq!(wait.as_secs(), 4 * 3600);
    }

    #[test]
    fn test_fire_tomorrow_when_hour_already_passed() {
        let offset = reference_offset(7);
        // 06:00 local; 05:00 already passed, next fire in 23h
        let now = Utc.with_ymd_and_hms(2025, 7, 1, 23, 0, 0).unwrap();
        let wait = duration_until_next_fire(now, offset, 5);
        assert_eq!(wait.as_secs(), 23 * 3600);
    }

    #[test]
    fn test_fire_exactly_at_hour_waits_a_day() {
        let offset = reference_offset(0);
        let now = Utc.with_ymd_and_hms(2025, 7, 1, 5, 0, 0).unwrap();
        let wait = duration_until_next_fire(now, offset, 5);
        assert_eq!(wait.as_secs(), 24 * 3600);
    }
}
