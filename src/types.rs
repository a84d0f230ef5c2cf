//! Core data structures for the consent sync engine
//!
//! Two shapes matter:
//! - `ConsentSnapshot`: raw per-date counts as retrieved from upstream.
//!   Immutable once fetched, never persisted directly.
//! - `ConsentDailyRecord`: the derived aggregate written to SQLite, one
//!   row per calendar day.
//!
//! The null-vs-zero rule runs through everything here: a day with zero
//! activity is valid data (counts 0, percentages None), a day that was
//! never synced is an absent record. Channel counts are never None —
//! missing channel data means a count of zero events.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Raw per-date consent counts from upstream, pre-aggregation.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ConsentSnapshot {
    /// Calendar day the counts cover
    pub date: NaiveDate,

    /// Profiles that completed the consent flow on this day
    pub total_consents: i64,

    /// ACTIVE privacy-policy purposes
    pub privacy_policy_consents: i64,

    /// ACTIVE marketing purposes
    pub marketing_consents: i64,

    // Per-channel counts, keyed off the identifier prefix.
    // Missing channel data is 0, never null.
    pub f1_channel_consents: i64,
    pub kp_channel_consents: i64,
    pub gwl_channel_consents: i64,

    /// Profiles that consented but never reached a sales channel
    pub dropoff_count: i64,

    /// Identifiers carrying none of the known channel prefixes
    pub new_users: i64,
}

/// Derived per-date aggregate, persisted in `consent_daily`.
///
/// Replaced wholesale on refetch, never field-patched. Percentages are
/// in [0, 100] or None when the denominator was zero.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConsentDailyRecord {
    pub date: NaiveDate,
    pub total_consents: i64,
    pub privacy_policy_consents: i64,
    pub marketing_consents: i64,
    pub marketing_consent_percentage: Option<f64>,
    pub f1_channel_consents: i64,
    pub kp_channel_consents: i64,
    pub gwl_channel_consents: i64,
    pub dropoff_count: i64,
    pub dropoff_percentage: Option<f64>,
    pub new_users: i64,

    /// Unix millis of the sync that produced this record
    pub last_synced_at: i64,
}

/// One slot of a total-coverage range view.
///
/// The historical table renders every date in the requested span, so
/// gaps are explicit placeholders (`record: None`) rather than silently
/// omitted rows.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DailySlot {
    pub date: NaiveDate,
    pub record: Option<ConsentDailyRecord>,
}

impl DailySlot {
    pub fn placeholder(date: NaiveDate) -> Self {
        Self { date, record: None }
    }

    pub fn present(record: ConsentDailyRecord) -> Self {
        Self {
            date: record.date,
            record: Some(record),
        }
    }

    pub fn is_placeholder(&self) -> bool {
        self.record.is_none()
    }
}

/// All-time sums over every persisted record, for the dashboard header.
///
/// Percentages are recomputed from the summed counts rather than
/// averaged over per-day percentages.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ConsentTotals {
    pub total_consents: i64,
    pub privacy_policy_consents: i64,
    pub marketing_consents: i64,
    pub marketing_consent_percentage: Option<f64>,
    pub f1_channel_consents: i64,
    pub kp_channel_consents: i64,
    pub gwl_channel_consents: i64,
    pub dropoff_count: i64,
    pub dropoff_percentage: Option<f64>,
    pub new_users: i64,
}
