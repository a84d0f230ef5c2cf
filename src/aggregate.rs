//! Snapshot-to-record derivation
//!
//! Pure numeric policy, no I/O. The caller supplies the sync timestamp
//! so the function stays deterministic under test.
//!
//! Percentage rule: `part / total * 100`, rounded to 2 decimal places,
//! and None — not 0.0, not an error — when the denominator is zero.
//! Zero total with a None percentage is how a valid zero-activity day
//! is distinguished from a day that simply was never synced.

use crate::types::{ConsentDailyRecord, ConsentSnapshot, ConsentTotals};
use chrono::NaiveDate;

/// Derive the persisted record for one day from its raw snapshot.
pub fn aggregate(date: NaiveDate, snapshot: &ConsentSnapshot, synced_at_millis: i64) -> ConsentDailyRecord {
    ConsentDailyRecord {
        date,
        total_consents: snapshot.total_consents,
        privacy_policy_consents: snapshot.privacy_policy_consents,
        marketing_consents: snapshot.marketing_consents,
        marketing_consent_percentage: percentage(snapshot.marketing_consents, snapshot.total_consents),
        f1_channel_consents: snapshot.f1_channel_consents,
        kp_channel_consents: snapshot.kp_channel_consents,
        gwl_channel_consents: snapshot.gwl_channel_consents,
        dropoff_count: snapshot.dropoff_count,
        dropoff_percentage: percentage(snapshot.dropoff_count, snapshot.total_consents),
        new_users: snapshot.new_users,
        last_synced_at: synced_at_millis,
    }
}

/// Sum every record into the dashboard totals view, recomputing the
/// percentages from the summed counts.
pub fn totals(records: &[ConsentDailyRecord]) -> ConsentTotals {
    let mut sums = ConsentTotals::default();

    for record in records {
        sums.total_consents += record.total_consents;
        sums.privacy_policy_consents += record.privacy_policy_consents;
        sums.marketing_consents += record.marketing_consents;
        sums.f1_channel_consents += record.f1_channel_consents;
        sums.kp_channel_consents += record.kp_channel_consents;
        sums.gwl_channel_consents += record.gwl_channel_consents;
        sums.dropoff_count += record.dropoff_count;
        sums.new_users += record.new_users;
    }

    sums.marketing_consent_percentage = percentage(sums.marketing_consents, sums.total_consents);
    sums.dropoff_percentage = percentage(sums.dropoff_count, sums.total_consents);
    sums
}

/// `part / total * 100` to 2 decimals, None when total is zero.
fn percentage(part: i64, total: i64) -> Option<f64> {
    if total == 0 {
        return None;
    }
    Some(round2(part as f64 / total as f64 * 100.0))
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;

    fn snapshot(total: i64, marketing: i64, dropoff: i64) -> ConsentSnapshot {
        ConsentSnapshot {
            date: NaiveDate::from_ymd_opt(2025, 7, 2).unwrap(),
            total_consents: total,
            privacy_policy_consents: total,
            marketing_consents: marketing,
            f1_channel_consents: 10,
            kp_channel_consents: 5,
            gwl_channel_consents: 1,
            dropoff_count: dropoff,
            new_users: 3,
        }
    }

    #[test]
    fn test_marketing_percentage_two_decimals() {
        let snap = snapshot(200, 90, 0);
        let record = aggregate(snap.date, &snap, 1_700_000_000_000);
        assert_eq!(record.marketing_consent_percentage, Some(45.0));
    }

    #[test]
    fn test_percentage_rounding() {
        // 1/3 of 100 -> 33.333... -> 33.33
        let snap = snapshot(3, 1, 2);
        let record = aggregate(snap.date, &snap, 0);
        assert_eq!(record.marketing_consent_percentage, Some(33.33));
        assert_eq!(record.dropoff_percentage, Some(66.67));
    }

    #[test]
    fn test_zero_total_yields_null_percentages_not_zero() {
        let snap = snapshot(0, 0, 0);
        let record = aggregate(snap.date, &snap, 0);

        // A zero-activity day is valid data: counts 0, percentages None
        assert_eq!(record.total_consents, 0);
        assert_eq!(record.marketing_consent_percentage, None);
        assert_eq!(record.dropoff_percentage, None);
    }

    #[test]
    fn test_channel_counts_pass_through() {
        let snap = snapshot(100, 40, 10);
        let record = aggregate(snap.date, &snap, 42);
        assert_eq!(record.f1_channel_consents, 10);
        assert_eq!(record.kp_channel_consents, 5);
        assert_eq!(record.gwl_channel_consents, 1);
        assert_eq!(record.new_users, 3);
        assert_eq!(record.last_synced_at, 42);
    }

    #[test]
    fn test_missing_channels_default_to_zero() {
        let snap = ConsentSnapshot {
            date: NaiveDate::from_ymd_opt(2025, 7, 2).unwrap(),
            total_consents: 5,
            ..Default::default()
        };
        let record = aggregate(snap.date, &snap, 0);
        assert_eq!(record.f1_channel_consents, 0);
        assert_eq!(record.kp_channel_consents, 0);
        assert_eq!(record.gwl_channel_consents, 0);
    }

    #[test]
    fn test_totals_recompute_percentages_from_sums() {
        let a = aggregate(
            NaiveDate::from_ymd_opt(2025, 7, 1).unwrap(),
            &snapshot(100, 90, 10),
            0,
        );
        let b = aggregate(
            NaiveDate::from_ymd_opt(2025, 7, 2).unwrap(),
            &snapshot(300, 30, 30),
            0,
        );

        let sums = totals(&[a, b]);
        assert_eq!(sums.total_consents, 400);
        assert_eq!(sums.marketing_consents, 120);
        // 120/400, not the mean of 90.00 and 10.00
        assert_eq!(sums.marketing_consent_percentage, Some(30.0));
        assert_eq!(sums.dropoff_percentage, Some(10.0));
    }

    #[test]
    fn test_totals_of_nothing() {
        let sums = totals(&[]);
        assert_eq!(sums.total_consents, 0);
        assert_eq!(sums.marketing_consent_percentage, None);
    }
}
