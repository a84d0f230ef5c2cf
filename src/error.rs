//! Error taxonomy for the sync engine
//!
//! One enum covers the whole pipeline: range validation, upstream
//! transport, payload decoding, and store failures. The orchestrator
//! uses `is_transient()` to decide which failed dates are worth a
//! second pass at the end of a batch run.

use chrono::NaiveDate;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SyncError {
    /// Caller passed a range with start after end. Never retried.
    #[error("invalid date range: {start} is after {end}")]
    InvalidRange { start: NaiveDate, end: NaiveDate },

    /// Could not reach the upstream service (DNS, connect, transport).
    #[error("upstream unavailable: {0}")]
    UpstreamUnavailable(String),

    /// Upstream did not answer within the configured deadline.
    #[error("upstream timed out after {seconds}s")]
    UpstreamTimeout { seconds: u64 },

    /// Upstream answered with a non-2xx status code.
    #[error("upstream returned HTTP {status}")]
    UpstreamHttp { status: u16 },

    /// Upstream answered 2xx but the body did not parse.
    #[error("upstream payload decode failed: {0}")]
    UpstreamDecode(String),

    /// SQLite failure. Fatal for that date's sync, never swallowed.
    #[error("store error: {0}")]
    Store(String),

    /// Another caller is already syncing this date.
    #[error("sync already in flight for {0}")]
    AlreadyInFlight(NaiveDate),
}

impl SyncError {
    /// Whether a batch run should re-attempt this date later in the
    /// same run. 4xx responses are considered a property of the date
    /// (bad request, missing data) and are not retried; 5xx and
    /// transport failures are.
    pub fn is_transient(&self) -> bool {
        match self {
            SyncError::UpstreamUnavailable(_) => true,
            SyncError::UpstreamTimeout { .. } => true,
            SyncError::UpstreamHttp { status } => *status >= 500,
            _ => false,
        }
    }
}

impl From<rusqlite::Error> for SyncError {
    fn from(value: rusqlite::Error) -> Self {
        SyncError::Store(value.to_string())
    }
}

pub type SyncResult<T> = Result<T, SyncError>;
