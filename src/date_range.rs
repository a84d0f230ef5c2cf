//! Calendar-day range iteration and civil-date boundaries
//!
//! Every other module keys its work on `NaiveDate`. Dates are compared
//! by civil day in the configured reference offset only; time-of-day
//! never participates. The helpers here are pure: `now` is always an
//! explicit argument resolved by the caller, so range computation stays
//! deterministic under test.

use crate::error::{SyncError, SyncResult};
use chrono::{DateTime, Duration, FixedOffset, NaiveDate, Utc};

/// Inclusive, strictly-increasing sequence of calendar dates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DateRange {
    start: NaiveDate,
    end: NaiveDate,
}

impl DateRange {
    /// Build a range covering `start..=end`. Fails when start is after
    /// end; a single-day range (start == end) is valid.
    pub fn new(start: NaiveDate, end: NaiveDate) -> SyncResult<Self> {
        if start > end {
            return Err(SyncError::InvalidRange { start, end });
        }
        Ok(Self { start, end })
    }

    pub fn start(&self) -> NaiveDate {
        self.start
    }

    pub fn end(&self) -> NaiveDate {
        self.end
    }

    /// Number of dates in the range, bounds included.
    pub fn len(&self) -> usize {
        (self.end - self.start).num_days() as usize + 1
    }

    pub fn is_empty(&self) -> bool {
        false // a valid range always holds at least one date
    }

    pub fn iter(&self) -> DateRangeIter {
        DateRangeIter {
            next: Some(self.start),
            end: self.end,
        }
    }
}

impl IntoIterator for DateRange {
    type Item = NaiveDate;
    type IntoIter = DateRangeIter;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

/// Restartable iterator over a `DateRange`.
pub struct DateRangeIter {
    next: Option<NaiveDate>,
    end: NaiveDate,
}

impl Iterator for DateRangeIter {
    type Item = NaiveDate;

    fn next(&mut self) -> Option<NaiveDate> {
        let current = self.next?;
        self.next = if current < self.end {
            current.succ_opt()
        } else {
            None
        };
        Some(current)
    }
}

/// Build the reference offset from whole hours east of UTC.
///
/// The original deployment reports against Asia/Bangkok (+7); the
/// offset is configuration, not something derived at call sites.
pub fn reference_offset(hours_east: i32) -> FixedOffset {
    FixedOffset::east_opt(hours_east * 3600).expect("TZ offset out of range")
}

/// Civil date of `now` in the reference offset.
pub fn civil_date(now: DateTime<Utc>, offset: FixedOffset) -> NaiveDate {
    now.with_timezone(&offset).date_naive()
}

/// Civil date of the day before `now` in the reference offset. This is
/// the default sync target: the most recent fully-elapsed day.
pub fn yesterday(now: DateTime<Utc>, offset: FixedOffset) -> NaiveDate {
    civil_date(now - Duration::days(1), offset)
}
