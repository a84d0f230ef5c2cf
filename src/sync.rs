//! Sync orchestration: single-date sync, forced refetch, range backfill
//!
//! Per date the flow is a short state machine:
//!
//! ```text
//! not-started → fetching → aggregating → storing → synced
//!                   └──────────┴────────────┴────→ failed(reason)
//! ```
//!
//! A forced refetch prepends a delete phase: upstream delete, store
//! delete, settling pause, then the normal fetch path. The upstream
//! delete is allowed to fail (absence of cached data is not an error),
//! the store delete is not.
//!
//! Batch runs process dates strictly sequentially with a configurable
//! pause between requests. One bad date never aborts the batch; a
//! 200-day backfill is not all-or-nothing. Transient failures get one
//! bounded backoff-paced retry round at the end of the run.

use crate::aggregate::aggregate;
use crate::backoff::ExponentialBackoff;
use crate::date_range::DateRange;
use crate::error::{SyncError, SyncResult};
use crate::store::SqliteConsentStore;
use crate::upstream::ConsentSource;
use chrono::NaiveDate;
use std::collections::HashSet;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::time::sleep;

/// Ceiling for the retry-pass backoff delay.
const RETRY_MAX_DELAY_MS: u64 = 30_000;

/// Retry-pass budget per batch run.
const RETRY_MAX_ATTEMPTS: u32 = 5;

/// Per-date result of one orchestrator invocation.
#[derive(Debug)]
pub enum SyncOutcome {
    /// Fresh upstream data was fetched, aggregated and stored.
    Synced,
    /// A record already existed and no refetch was forced; upstream
    /// was never contacted.
    Skipped,
    /// The date's sync failed; nothing partial was stored.
    Failed(SyncError),
}

impl SyncOutcome {
    pub fn is_synced(&self) -> bool {
        matches!(self, SyncOutcome::Synced)
    }

    pub fn is_failed(&self) -> bool {
        matches!(self, SyncOutcome::Failed(_))
    }
}

/// A date that stayed failed after the retry pass, with its reason.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FailedDate {
    pub date: NaiveDate,
    pub reason: String,
}

/// Caller-visible result of a batch run.
#[derive(Debug, Default)]
pub struct BatchSummary {
    pub synced: usize,
    pub skipped: usize,
    pub failed: Vec<FailedDate>,
}

impl BatchSummary {
    pub fn failed_count(&self) -> usize {
        self.failed.len()
    }
}

/// Drives single-date sync and range backfill against the upstream
/// source and the record store.
pub struct SyncOrchestrator {
    source: Arc<dyn ConsentSource>,
    store: SqliteConsentStore,
    sync_delay: Duration,
    delete_settle: Duration,

    /// Dates currently being synced. Two callers hitting the same date
    /// concurrently would otherwise race delete-then-fetch against
    /// each other; the second caller fails fast instead.
    in_flight: Mutex<HashSet<NaiveDate>>,

    /// Unix-millis clock, injectable for deterministic tests.
    now_millis: Box<dyn Fn() -> i64 + Send + Sync>,
}

impl SyncOrchestrator {
    pub fn new(
        source: Arc<dyn ConsentSource>,
        store: SqliteConsentStore,
        sync_delay: Duration,
        delete_settle: Duration,
    ) -> Self {
        Self::new_with_clock(
            source,
            store,
            sync_delay,
            delete_settle,
            Box::new(|| chrono::Utc::now().timestamp_millis()),
        )
    }

    /// Construct with a custom clock (tests).
    pub fn new_with_clock(
        source: Arc<dyn ConsentSource>,
        store: SqliteConsentStore,
        sync_delay: Duration,
        delete_settle: Duration,
        now_millis: Box<dyn Fn() -> i64 + Send + Sync>,
    ) -> Self {
        Self {
            source,
            store,
            sync_delay,
            delete_settle,
            in_flight: Mutex::new(HashSet::new()),
            now_millis,
        }
    }

    /// Sync one date. With `force_refetch` false an already-synced date
    /// is skipped without contacting upstream; with it true, any
    /// existing data is deleted first so the stored record reflects
    /// exactly one fresh upstream snapshot.
    pub async fn sync_date(&self, date: NaiveDate, force_refetch: bool) -> SyncOutcome {
        let _guard = match self.begin(date) {
            Some(guard) => guard,
            None => return SyncOutcome::Failed(SyncError::AlreadyInFlight(date)),
        };

        let exists = match self.store.exists(date) {
            Ok(exists) => exists,
            Err(e) => return SyncOutcome::Failed(e),
        };

        if exists && !force_refetch {
            log::debug!("⏭️  {} already synced, skipping", date);
            return SyncOutcome::Skipped;
        }

        if exists {
            // Forced refetch: two-phase delete, then fetch. No reliance
            // on upstream-side merge or dedup semantics.
            if let Err(e) = self.source.delete_snapshot(date).await {
                log::warn!("⚠️  Upstream delete for {} failed ({}), fetching anyway", date, e);
            }
            if let Err(e) = self.store.delete(date) {
                return SyncOutcome::Failed(e);
            }
            sleep(self.delete_settle).await;
        }

        // fetching
        let snapshot = match self.source.fetch_snapshot(date).await {
            Ok(snapshot) => snapshot,
            Err(e) => {
                log::error!("❌ Fetch failed for {}: {}", date, e);
                return SyncOutcome::Failed(e);
            }
        };

        // aggregating → storing. The upsert only happens after a
        // successful aggregate; no partial record is ever written.
        let record = aggregate(date, &snapshot, (self.now_millis)());
        if let Err(e) = self.store.upsert(&record) {
            log::error!("❌ Store failed for {}: {}", date, e);
            return SyncOutcome::Failed(e);
        }

        log::info!(
            "✅ Synced {}: total={} marketing={:?}%",
            date,
            record.total_consents,
            record.marketing_consent_percentage
        );
        SyncOutcome::Synced
    }

    /// Backfill an inclusive date range, oldest first.
    ///
    /// Dates run strictly sequentially with `sync_delay` between
    /// consecutive requests. Per-date failures are recorded, never
    /// propagated; transient ones (timeouts, unreachable upstream,
    /// 5xx) get a bounded retry round before the summary is built.
    pub async fn sync_range(
        &self,
        start: NaiveDate,
        end: NaiveDate,
        force_refetch: bool,
    ) -> SyncResult<BatchSummary> {
        let range = DateRange::new(start, end)?;
        log::info!(
            "🔄 Backfill {} → {} ({} dates, force={})",
            start,
            end,
            range.len(),
            force_refetch
        );

        let mut outcomes: Vec<(NaiveDate, SyncOutcome)> = Vec::with_capacity(range.len());
        for (i, date) in range.into_iter().enumerate() {
            if i > 0 {
                sleep(self.sync_delay).await;
            }
            outcomes.push((date, self.sync_date(date, force_refetch).await));
        }

        self.retry_transient(&mut outcomes, force_refetch).await;

        let mut summary = BatchSummary::default();
        for (date, outcome) in outcomes {
            match outcome {
                SyncOutcome::Synced => summary.synced += 1,
                SyncOutcome::Skipped => summary.skipped += 1,
                SyncOutcome::Failed(e) => summary.failed.push(FailedDate {
                    date,
                    reason: e.to_string(),
                }),
            }
        }

        log::info!(
            "🏁 Backfill done: {} synced, {} skipped, {} failed",
            summary.synced,
            summary.skipped,
            summary.failed_count()
        );
        for failure in &summary.failed {
            log::warn!("   ├─ {} failed: {}", failure.date, failure.reason);
        }

        Ok(summary)
    }

    /// One bounded retry round over the transiently-failed dates of a
    /// batch run. 4xx failures stay failed: within a single run they
    /// are treated as a property of the date, not of the moment.
    async fn retry_transient(
        &self,
        outcomes: &mut [(NaiveDate, SyncOutcome)],
        force_refetch: bool,
    ) {
        let transient: Vec<usize> = outcomes
            .iter()
            .enumerate()
            .filter(|(_, (_, outcome))| {
                matches!(outcome, SyncOutcome::Failed(e) if e.is_transient())
            })
            .map(|(i, _)| i)
            .collect();

        if transient.is_empty() {
            return;
        }

        log::info!("🔁 Retrying {} transiently-failed dates", transient.len());
        let initial = (self.sync_delay.as_millis() as u64).max(500);
        let mut backoff = ExponentialBackoff::new(initial, RETRY_MAX_DELAY_MS, RETRY_MAX_ATTEMPTS);

        for i in transient {
            if backoff.sleep().await.is_err() {
                log::warn!("⚠️  Retry budget exhausted, remaining dates stay failed");
                break;
            }
            let date = outcomes[i].0;
            let outcome = self.sync_date(date, force_refetch).await;
            if outcome.is_synced() {
                backoff.reset();
            }
            outcomes[i].1 = outcome;
        }
    }

    fn begin(&self, date: NaiveDate) -> Option<InFlightGuard<'_>> {
        let mut in_flight = self.in_flight.lock().ok()?;
        if !in_flight.insert(date) {
            return None;
        }
        Some(InFlightGuard { set: &self.in_flight, date })
    }
}

/// Releases the per-date in-flight slot on drop, including on the
/// failure edges out of the state machine.
struct InFlightGuard<'a> {
    set: &'a Mutex<HashSet<NaiveDate>>,
    date: NaiveDate,
}

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        if let Ok(mut set) = self.set.lock() {
            set.remove(&self.date);
        }
    }
}
