use thiserror::Error;
use usync_common::UsyncError;

//--------------------------------------------------------------------------------------------------
// Type Definitions
//--------------------------------------------------------------------------------------------------

/// Store-layer errors. `Busy` is retried internally by
/// [`crate::retry::with_retry`] and should not normally escape the crate;
/// it is public so tests can assert on the retry behavior directly.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("conflict: {0}")]
    Conflict(String),

    #[error("storage is full")]
    StorageFull,

    #[error("database busy")]
    Busy,

    #[error("not found: {0}")]
    NotFound(String),

    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("task join error: {0}")]
    Join(#[from] tokio::task::JoinError),
}

impl From<StoreError> for UsyncError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Conflict(detail) => UsyncError::Conflict(detail),
            StoreError::StorageFull => UsyncError::StorageFull,
            StoreError::Busy => UsyncError::TransientNetwork("database busy".into()),
            StoreError::NotFound(detail) => UsyncError::NotFound(detail),
            StoreError::Sqlite(e) => UsyncError::Validation(e.to_string()),
            StoreError::Join(e) => UsyncError::Validation(e.to_string()),
        }
    }
}

pub type Result<T> = std::result::Result<T, StoreError>;

/// Classifies a raw [`rusqlite::Error`] into the store's own taxonomy:
/// unique-key violations become `Conflict`, `SQLITE_FULL` becomes
/// `StorageFull`, `SQLITE_BUSY`/`SQLITE_LOCKED` become `Busy` (retried by
/// the caller), everything else passes through unchanged.
pub(crate) fn classify(err: rusqlite::Error) -> StoreError {
    use rusqlite::ffi::ErrorCode;
    use rusqlite::Error::SqliteFailure;

    match &err {
        SqliteFailure(sqlite_err, _) => match sqlite_err.code {
            ErrorCode::ConstraintViolation => StoreError::Conflict(err.to_string()),
            ErrorCode::DatabaseFull => StoreError::StorageFull,
            ErrorCode::DatabaseBusy | ErrorCode::DatabaseLocked => StoreError::Busy,
            _ => StoreError::Sqlite(err),
        },
        _ => StoreError::Sqlite(err),
    }
}
