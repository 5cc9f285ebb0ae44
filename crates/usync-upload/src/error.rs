use thiserror::Error;
use usync_common::UsyncError;

//--------------------------------------------------------------------------------------------------
// Type Definitions
//--------------------------------------------------------------------------------------------------

/// Upload-pipeline errors.
#[derive(Debug, Error)]
pub enum UploadError {
    #[error(transparent)]
    Store(#[from] usync_store::StoreError),

    #[error(transparent)]
    Nntp(#[from] usync_nntp::NntpError),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("{0}")]
    Validation(String),

    #[error("segment with subject {subject} exceeded max attempts")]
    MaxAttemptsExceeded { subject: String },
}

impl From<UploadError> for UsyncError {
    fn from(err: UploadError) -> Self {
        match err {
            UploadError::Store(e) => e.into(),
            UploadError::Nntp(e) => e.into(),
            UploadError::Io(e) => UsyncError::Io(e),
            UploadError::Validation(detail) => UsyncError::Validation(detail),
            UploadError::MaxAttemptsExceeded { subject } => {
                UsyncError::PermanentPostFailure { subject, detail: "max attempts exceeded".into() }
            }
        }
    }
}

pub type Result<T> = std::result::Result<T, UploadError>;
