use thiserror::Error;

//--------------------------------------------------------------------------------------------------
// Type Definitions
//--------------------------------------------------------------------------------------------------

/// The workspace's shared error taxonomy. Every fallible operation
/// eventually bottoms out in one of these variants (component-local error
/// enums implement `From<LocalError> for UsyncError` instead of boxing an
/// opaque `anyhow::Error`, so callers can match on `kind()` and build a
/// structured `{ completed, failed: [(item, kind, detail)] }` result).
#[derive(Debug, Error)]
pub enum UsyncError {
    #[error("validation failed: {0}")]
    Validation(String),

    #[error("NNTP authentication failed for {host}")]
    Auth { host: String },

    #[error("connection pool exhausted after waiting {waited_secs}s")]
    PoolExhausted { waited_secs: u64 },

    #[error("transient network error: {0}")]
    TransientNetwork(String),

    #[error("permanent post failure for segment {subject}: {detail}")]
    PermanentPostFailure { subject: String, detail: String },

    #[error("integrity check failed: {0}")]
    Integrity(String),

    #[error("segment could not be recovered after exhausting all redundancy copies: {0}")]
    UnrecoverableSegment(String),

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("storage is full")]
    StorageFull,

    #[error("operation cancelled")]
    Cancelled,

    #[error("not found: {0}")]
    NotFound(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl UsyncError {
    /// A short, stable tag for the `kind` field of the structured result.
    /// Kept separate from the `Display` message so the
    /// tag never accidentally changes when a message is reworded.
    pub fn kind(&self) -> &'static str {
        match self {
            UsyncError::Validation(_) => "ValidationError",
            UsyncError::Auth { .. } => "AuthError",
            UsyncError::PoolExhausted { .. } => "PoolExhausted",
            UsyncError::TransientNetwork(_) => "TransientNetwork",
            UsyncError::PermanentPostFailure { .. } => "PermanentPostFailure",
            UsyncError::Integrity(_) => "IntegrityError",
            UsyncError::UnrecoverableSegment(_) => "UnrecoverableSegmentError",
            UsyncError::Conflict(_) => "ConflictError",
            UsyncError::StorageFull => "StorageFull",
            UsyncError::Cancelled => "CancelError",
            UsyncError::NotFound(_) => "NotFound",
            UsyncError::Io(_) => "Io",
        }
    }

    /// Whether a caller retrying the exact same operation might succeed.
    /// Fatal kinds (`AuthError`, `StorageFull`, `PermanentPostFailure`) are not.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            UsyncError::PoolExhausted { .. }
                | UsyncError::TransientNetwork(_)
                | UsyncError::Conflict(_)
                | UsyncError::Integrity(_)
        )
    }
}

/// One failed item in a batch operation's structured result.
#[derive(Debug)]
pub struct FailedItem<T> {
    pub item: T,
    pub kind: &'static str,
    pub detail: String,
}

impl<T> FailedItem<T> {
    pub fn new(item: T, error: &UsyncError) -> Self {
        Self {
            item,
            kind: error.kind(),
            detail: error.to_string(),
        }
    }
}

/// The `{ completed, failed: [(item, kind, detail)] }` shape every worker
/// pool in the workspace (the uploader, the downloader) reports through.
#[derive(Debug, Default)]
pub struct BatchResult<T, F> {
    pub completed: Vec<T>,
    pub failed: Vec<FailedItem<F>>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kind_tags_are_stable_identifiers_not_messages() {
        let err = UsyncError::Auth {
            host: "news.example.org".into(),
        };
        assert_eq!(err.kind(), "AuthError");
        assert!(!err.is_recoverable());
    }

    #[test]
    fn transient_network_is_recoverable() {
        assert!(UsyncError::TransientNetwork("reset".into()).is_recoverable());
    }
}
