use thiserror::Error;
use usync_common::UsyncError;

//--------------------------------------------------------------------------------------------------
// Type Definitions
//--------------------------------------------------------------------------------------------------

/// NNTP-layer errors.
#[derive(Debug, Error)]
pub enum NntpError {
    #[error("authentication failed for {host}")]
    Auth { host: String },

    #[error("connection pool exhausted after waiting {waited_secs}s")]
    PoolExhausted { waited_secs: u64 },

    #[error("transient network error: {0}")]
    Transient(String),

    #[error("permanent post failure for {subject}: {detail}")]
    PermanentPostFailure { subject: String, detail: String },

    #[error("no such article")]
    NoSuchArticle,

    #[error("malformed yEnc payload: {0}")]
    Yenc(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("tls error: {0}")]
    Tls(#[from] rustls::Error),
}

impl NntpError {
    /// Whether this error is transient (`4xx`,
    /// socket reset) and therefore worth retrying with backoff.
    pub fn is_transient(&self) -> bool {
        matches!(self, NntpError::Transient(_) | NntpError::Io(_))
    }
}

impl From<NntpError> for UsyncError {
    fn from(err: NntpError) -> Self {
        match err {
            NntpError::Auth { host } => UsyncError::Auth { host },
            NntpError::PoolExhausted { waited_secs } => UsyncError::PoolExhausted { waited_secs },
            NntpError::Transient(detail) => UsyncError::TransientNetwork(detail),
            NntpError::PermanentPostFailure { subject, detail } => UsyncError::PermanentPostFailure { subject, detail },
            NntpError::NoSuchArticle => UsyncError::NotFound("article".into()),
            NntpError::Yenc(detail) => UsyncError::Integrity(detail),
            NntpError::Io(e) => UsyncError::Io(e),
            NntpError::Tls(e) => UsyncError::TransientNetwork(e.to_string()),
        }
    }
}

pub type Result<T> = std::result::Result<T, NntpError>;
