use thiserror::Error;

use xposed_shared::error::AppealError;
use xposed_shared::types::InstrumentType;

/// Errors produced by the store layer.
#[derive(Error, Debug)]
pub enum StoreError {
    /// SQLite error.
    #[error("Database error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// Generic I/O error (e.g. creating the database directory).
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Migration failure.
    #[error("Migration error: {0}")]
    Migration(String),

    /// JSON column (review aliases) could not be encoded or decoded.
    #[error("JSON column error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Report not found")]
    ReportNotFound,

    #[error("Instrument not found")]
    InstrumentNotFound,

    #[error("Appeal not found")]
    AppealNotFound,

    #[error("Watchlist item not found")]
    WatchlistEntryNotFound,

    /// The caller does not own the record it tried to change.
    #[error("Not authorized to modify this record")]
    NotOwner,

    #[error("You have already reported this instrument")]
    DuplicateReview,

    #[error("You have already submitted an appeal for this instrument")]
    DuplicateAppeal,

    #[error("Already watching this category")]
    DuplicateWatch,

    /// The instrument exists under another category; the category of an
    /// instrument never changes.
    #[error("Instrument {instrument:?} is already registered as {existing}")]
    InstrumentTypeMismatch {
        instrument: String,
        existing: InstrumentType,
    },

    #[error(transparent)]
    Appeal(#[from] AppealError),
}

impl StoreError {
    /// True for SQLite UNIQUE/PRIMARY KEY violations.
    pub(crate) fn is_unique_violation(err: &rusqlite::Error) -> bool {
        matches!(
            err,
            rusqlite::Error::SqliteFailure(e, _)
                if e.code == rusqlite::ErrorCode::ConstraintViolation
        )
    }
}

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, StoreError>;
