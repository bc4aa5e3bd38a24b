//! Error types for the scheduler and its storage backends.

use thiserror::Error;

/// Failure inside a [`StateStore`](crate::store::StateStore) implementation.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("storage I/O failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("state serialization failed: {0}")]
    Json(#[from] serde_json::Error),

    #[error("database error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("store lock poisoned")]
    Poisoned,
}

pub type StoreResult<T> = std::result::Result<T, StoreError>;

/// Errors returned by [`Scheduler`](crate::srs::Scheduler) operations.
#[derive(Debug, Error)]
pub enum SchedulerError {
    /// Quality outside `0..=5`. Nothing was recorded.
    #[error("quality must be between 0 and 5, got {0}")]
    InvalidQuality(i64),

    #[error("item id must not be empty")]
    EmptyItemId,

    /// The next due time would fall outside the supported date range.
    #[error("review time {0} is out of range")]
    InvalidTimestamp(chrono::DateTime<chrono::Utc>),

    /// Import payload was not a map of review states.
    #[error("invalid import payload: {0}")]
    InvalidImport(String),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("scheduler lock poisoned")]
    LockPoisoned,

    #[error("storage did not respond within {0} ms")]
    Timeout(u64),
}

impl SchedulerError {
    /// True for caller mistakes that retrying will not fix.
    pub fn is_precondition(&self) -> bool {
        matches!(
            self,
            Self::InvalidQuality(_)
                | Self::EmptyItemId
                | Self::InvalidTimestamp(_)
                | Self::InvalidImport(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, SchedulerError>;
