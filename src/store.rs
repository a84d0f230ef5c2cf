//! SQLite persistence for daily consent records
//!
//! One row per calendar day, keyed by ISO date text. The store is the
//! single source of truth for "has this date been synced": upsert and
//! delete for a given date go through one connection behind a mutex,
//! and upsert is a single `INSERT ... ON CONFLICT(date) DO UPDATE`
//! statement, so two syncs of the same date cannot interleave a lost
//! update.

use crate::date_range::DateRange;
use crate::error::{SyncError, SyncResult};
use crate::types::{ConsentDailyRecord, DailySlot};
use chrono::NaiveDate;
use rusqlite::{params, Connection, Row};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS consent_daily (
    date                         TEXT PRIMARY KEY,
    total_consents               INTEGER NOT NULL,
    privacy_policy_consents      INTEGER NOT NULL,
    marketing_consents           INTEGER NOT NULL,
    marketing_consent_percentage REAL,
    f1_channel_consents          INTEGER NOT NULL,
    kp_channel_consents          INTEGER NOT NULL,
    gwl_channel_consents         INTEGER NOT NULL,
    dropoff_count                INTEGER NOT NULL,
    dropoff_percentage           REAL,
    new_users                    INTEGER NOT NULL DEFAULT 0,
    last_synced_at               INTEGER NOT NULL
)
"#;

/// SQLite-backed record store
#[derive(Clone)]
pub struct SqliteConsentStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteConsentStore {
    /// Open (or create) the database and ensure the schema exists.
    pub fn open(db_path: &str) -> SyncResult<Self> {
        let conn = Connection::open(db_path)?;
        conn.pragma_update(None, "journal_mode", "WAL")?;
        conn.execute_batch(SCHEMA)?;
        log::info!("🗄️  Consent store ready at {}", db_path);

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// In-memory store for tests and dry runs.
    pub fn open_in_memory() -> SyncResult<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch(SCHEMA)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    fn lock(&self) -> SyncResult<std::sync::MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| SyncError::Store("connection mutex poisoned".to_string()))
    }

    /// Fetch the record for one date, if it was ever synced.
    pub fn get(&self, date: NaiveDate) -> SyncResult<Option<ConsentDailyRecord>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(
            "SELECT * FROM consent_daily WHERE date = ?1",
        )?;

        let mut rows = stmt.query_map(params![date.to_string()], row_to_record)?;
        match rows.next() {
            Some(row) => Ok(Some(row?)),
            None => Ok(None),
        }
    }

    /// Whether a record exists for the date.
    pub fn exists(&self, date: NaiveDate) -> SyncResult<bool> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare("SELECT date FROM consent_daily WHERE date = ?1")?;
        Ok(stmt.exists(params![date.to_string()])?)
    }

    /// Total-coverage view over an inclusive range: one slot per date,
    /// ascending, with absent dates as explicit placeholders.
    pub fn get_range(&self, start: NaiveDate, end: NaiveDate) -> SyncResult<Vec<DailySlot>> {
        let range = DateRange::new(start, end)?;

        let mut by_date: HashMap<NaiveDate, ConsentDailyRecord> = HashMap::new();
        {
            let conn = self.lock()?;
            let mut stmt = conn.prepare(
                "SELECT * FROM consent_daily WHERE date BETWEEN ?1 AND ?2 ORDER BY date ASC",
            )?;
            let rows = stmt.query_map(params![start.to_string(), end.to_string()], row_to_record)?;
            for row in rows {
                let record = row?;
                by_date.insert(record.date, record);
            }
        }

        Ok(range
            .into_iter()
            .map(|date| match by_date.remove(&date) {
                Some(record) => DailySlot::present(record),
                None => DailySlot::placeholder(date),
            })
            .collect())
    }

    /// Atomically replace any existing record for the date. At most one
    /// row per date holds afterward regardless of prior state.
    pub fn upsert(&self, record: &ConsentDailyRecord) -> SyncResult<()> {
        let conn = self.lock()?;
        conn.execute(
            r#"
            INSERT INTO consent_daily (
                date, total_consents, privacy_policy_consents, marketing_consents,
                marketing_consent_percentage,
                f1_channel_consents, kp_channel_consents, gwl_channel_consents,
                dropoff_count, dropoff_percentage, new_users, last_synced_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)
            ON CONFLICT(date) DO UPDATE SET
                total_consents = excluded.total_consents,
                privacy_policy_consents = excluded.privacy_policy_consents,
                marketing_consents = excluded.marketing_consents,
                marketing_consent_percentage = excluded.marketing_consent_percentage,
                f1_channel_consents = excluded.f1_channel_consents,
                kp_channel_consents = excluded.kp_channel_consents,
                gwl_channel_consents = excluded.gwl_channel_consents,
                dropoff_count = excluded.dropoff_count,
                dropoff_percentage = excluded.dropoff_percentage,
                new_users = excluded.new_users,
                last_synced_at = excluded.last_synced_at
            "#,
            params![
                record.date.to_string(),
                record.total_consents,
                record.privacy_policy_consents,
                record.marketing_consents,
                record.marketing_consent_percentage,
                record.f1_channel_consents,
                record.kp_channel_consents,
                record.gwl_channel_consents,
                record.dropoff_count,
                record.dropoff_percentage,
                record.new_users,
                record.last_synced_at,
            ],
        )?;

        Ok(())
    }

    /// Remove the record for a date. No-op when absent.
    pub fn delete(&self, date: NaiveDate) -> SyncResult<()> {
        let conn = self.lock()?;
        conn.execute(
            "DELETE FROM consent_daily WHERE date = ?1",
            params![date.to_string()],
        )?;
        Ok(())
    }

    /// Most recent record, for the dashboard summary card.
    pub fn latest(&self) -> SyncResult<Option<ConsentDailyRecord>> {
        let conn = self.lock()?;
        let mut stmt =
            conn.prepare("SELECT * FROM consent_daily ORDER BY date DESC LIMIT 1")?;
        let mut rows = stmt.query_map([], row_to_record)?;
        match rows.next() {
            Some(row) => Ok(Some(row?)),
            None => Ok(None),
        }
    }

    /// First date that ever synced, if any.
    pub fn earliest_date(&self) -> SyncResult<Option<NaiveDate>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare("SELECT MIN(date) FROM consent_daily")?;
        let min: Option<String> = stmt.query_row([], |row| row.get(0))?;
        match min {
            Some(text) => Ok(Some(parse_date(&text)?)),
            None => Ok(None),
        }
    }

    /// Every persisted record, ascending by date.
    pub fn all_records(&self) -> SyncResult<Vec<ConsentDailyRecord>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare("SELECT * FROM consent_daily ORDER BY date ASC")?;
        let rows = stmt.query_map([], row_to_record)?;
        let mut records = Vec::new();
        for row in rows {
            records.push(row?);
        }
        Ok(records)
    }
}

fn parse_date(text: &str) -> SyncResult<NaiveDate> {
    text.parse()
        .map_err(|_| SyncError::Store(format!("malformed date key in store: {text}")))
}

fn row_to_record(row: &Row<'_>) -> rusqlite::Result<ConsentDailyRecord> {
    let date_text: String = row.get("date")?;
    let date = date_text.parse().map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(
            0,
            rusqlite::types::Type::Text,
            Box::new(e),
        )
    })?;

    Ok(ConsentDailyRecord {
        date,
        total_consents: row.get("total_consents")?,
        privacy_policy_consents: row.get("privacy_policy_consents")?,
        marketing_consents: row.get("marketing_consents")?,
        marketing_consent_percentage: row.get("marketing_consent_percentage")?,
        f1_channel_consents: row.get("f1_channel_consents")?,
        kp_channel_consents: row.get("kp_channel_consents")?,
        gwl_channel_consents: row.get("gwl_channel_consents")?,
        dropoff_count: row.get("dropoff_count")?,
        dropoff_percentage: row.get("dropoff_percentage")?,
        new_users: row.get("new_users")?,
        last_synced_at: row.get("last_synced_at")?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::NamedTempFile;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    fn record(date: NaiveDate, total: i64, synced_at: i64) -> ConsentDailyRecord {
        ConsentDailyRecord {
            date,
            total_consents: total,
            privacy_policy_consents: total,
            marketing_consents: total / 2,
            marketing_consent_percentage: if total > 0 { Some(50.0) } else { None },
            f1_channel_consents: 3,
            kp_channel_consents: 2,
            gwl_channel_consents: 1,
            dropoff_count: 4,
            dropoff_percentage: if total > 0 { Some(4.0) } else { None },
            new_users: 1,
            last_synced_at: synced_at,
        }
    }

    #[test]
    fn test_open_on_disk_and_reopen() {
        let temp = NamedTempFile::new().unwrap();
        let path = temp.path().to_str().unwrap();

        {
            let store = SqliteConsentStore::open(path).unwrap();
            store.upsert(&record(d(2025, 7, 2), 100, 1)).unwrap();
        }

        // Schema init is idempotent and data survives reopen
        let store = SqliteConsentStore::open(path).unwrap();
        let loaded = store.get(d(2025, 7, 2)).unwrap().unwrap();
        assert_eq!(loaded.total_consents, 100);
    }

    #[test]
    fn test_get_absent_date() {
        let store = SqliteConsentStore::open_in_memory().unwrap();
        assert!(store.get(d(2025, 7, 2)).unwrap().is_none());
        assert!(!store.exists(d(2025, 7, 2)).unwrap());
    }

    #[test]
    fn test_upsert_replaces_wholesale() {
        let store = SqliteConsentStore::open_in_memory().unwrap();
        let date = d(2025, 7, 2);

        store.upsert(&record(date, 100, 1)).unwrap();

        let mut replacement = record(date, 250, 2);
        replacement.marketing_consent_percentage = Some(12.5);
        store.upsert(&replacement).unwrap();

        let loaded = store.get(date).unwrap().unwrap();
        assert_eq!(loaded, replacement);

        // still exactly one row for the date
        let slots = store.get_range(date, date).unwrap();
        assert_eq!(slots.len(), 1);
    }

    #[test]
    fn test_null_percentages_round_trip() {
        let store = SqliteConsentStore::open_in_memory().unwrap();
        let date = d(2025, 7, 2);

        store.upsert(&record(date, 0, 1)).unwrap();

        let loaded = store.get(date).unwrap().unwrap();
        assert_eq!(loaded.marketing_consent_percentage, None);
        assert_eq!(loaded.dropoff_percentage, None);
        assert_eq!(loaded.total_consents, 0);
    }

    #[test]
    fn test_delete_is_idempotent() {
        let store = SqliteConsentStore::open_in_memory().unwrap();
        let date = d(2025, 7, 2);

        store.upsert(&record(date, 10, 1)).unwrap();
        store.delete(date).unwrap();
        assert!(store.get(date).unwrap().is_none());

        // deleting an absent date is a no-op, not an error
        store.delete(date).unwrap();
    }

    #[test]
    fn test_range_fills_gaps_with_placeholders() {
        let store = SqliteConsentStore::open_in_memory().unwrap();

        // only the middle day of a 3-day span is synced
        store.upsert(&record(d(2025, 7, 2), 100, 1)).unwrap();

        let slots = store.get_range(d(2025, 7, 1), d(2025, 7, 3)).unwrap();
        assert_eq!(slots.len(), 3);
        assert!(slots[0].is_placeholder());
        assert_eq!(slots[0].date, d(2025, 7, 1));
        assert!(!slots[1].is_placeholder());
        assert_eq!(slots[1].record.as_ref().unwrap().total_consents, 100);
        assert!(slots[2].is_placeholder());
        assert_eq!(slots[2].date, d(2025, 7, 3));
    }

    #[test]
    fn test_range_rejects_inverted_bounds() {
        let store = SqliteConsentStore::open_in_memory().unwrap();
        let result = store.get_range(d(2025, 7, 3), d(2025, 7, 1));
        assert!(matches!(result, Err(SyncError::InvalidRange { .. })));
    }

    #[test]
    fn test_latest_and_earliest() {
        let store = SqliteConsentStore::open_in_memory().unwrap();
        assert!(store.latest().unwrap().is_none());
        assert!(store.earliest_date().unwrap().is_none());

        store.upsert(&record(d(2025, 7, 1), 10, 1)).unwrap();
        store.upsert(&record(d(2025, 7, 5), 50, 2)).unwrap();
        store.upsert(&record(d(2025, 7, 3), 30, 3)).unwrap();

        assert_eq!(store.latest().unwrap().unwrap().date, d(2025, 7, 5));
        assert_eq!(store.earliest_date().unwrap().unwrap(), d(2025, 7, 1));

        let all = store.all_records().unwrap();
        let dates: Vec<NaiveDate> = all.iter().map(|r| r.date).collect();
        assert_eq!(dates, vec![d(2025, 7, 1), d(2025, 7, 3), d(2025, 7, 5)]);
    }
}
