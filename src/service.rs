//! Query facade consumed by the presentation layer
//!
//! The dashboard and the historical table talk to this, not to the
//! store or the orchestrator directly. Transport (REST, whatever) is
//! someone else's problem; this layer only shapes data.

use crate::aggregate::totals;
use crate::date_range::yesterday;
use crate::error::SyncResult;
use crate::store::SqliteConsentStore;
use crate::sync::{SyncOrchestrator, SyncOutcome};
use crate::types::{ConsentDailyRecord, ConsentTotals, DailySlot};
use chrono::{DateTime, FixedOffset, NaiveDate, Utc};
use std::sync::Arc;

pub struct DashboardService {
    store: SqliteConsentStore,
    orchestrator: Arc<SyncOrchestrator>,
    offset: FixedOffset,
}

impl DashboardService {
    pub fn new(
        store: SqliteConsentStore,
        orchestrator: Arc<SyncOrchestrator>,
        offset: FixedOffset,
    ) -> Self {
        Self {
            store,
            orchestrator,
            offset,
        }
    }

    /// Latest synced record, for the "current state" card.
    pub fn get_summary(&self) -> SyncResult<Option<ConsentDailyRecord>> {
        self.store.latest()
    }

    /// All-time sums with percentages recomputed from the summed counts.
    pub fn get_totals(&self) -> SyncResult<ConsentTotals> {
        Ok(totals(&self.store.all_records()?))
    }

    /// Present records within the span, ascending, for charting.
    /// Placeholder days are dropped here; charts skip gaps.
    pub fn get_daily_series(
        &self,
        start: NaiveDate,
        end: NaiveDate,
    ) -> SyncResult<Vec<ConsentDailyRecord>> {
        Ok(self
            .store
            .get_range(start, end)?
            .into_iter()
            .filter_map(|slot| slot.record)
            .collect())
    }

    /// Full historical range for the table: earliest synced date through
    /// yesterday (in the reference offset), gaps as explicit
    /// placeholders. Empty until the first sync ever lands.
    pub fn get_all_records(&self, now: DateTime<Utc>) -> SyncResult<Vec<DailySlot>> {
        let start = match self.store.earliest_date()? {
            Some(date) => date,
            None => return Ok(Vec::new()),
        };
        let end = yesterday(now, self.offset).max(start);
        self.store.get_range(start, end)
    }

    /// User-triggered refetch of one date: always delete-then-resync.
    pub async fn trigger_manual_sync(&self, date: NaiveDate) -> SyncOutcome {
        self.orchestrator.sync_date(date, true).await
    }
}
