use thiserror::Error;
use usync_common::UsyncError;

//--------------------------------------------------------------------------------------------------
// Type Definitions
//--------------------------------------------------------------------------------------------------

/// Share-builder errors.
#[derive(Debug, Error)]
pub enum ShareError {
    #[error(transparent)]
    Store(#[from] usync_store::StoreError),

    #[error(transparent)]
    Crypto(#[from] usync_crypto::CryptoError),

    #[error(transparent)]
    Access(#[from] usync_access::AccessError),

    #[error("malformed manifest: {0}")]
    Serde(#[from] serde_json::Error),

    #[error("{0}")]
    Validation(String),

    #[error("share index integrity check failed: {0}")]
    Integrity(String),
}

impl From<ShareError> for UsyncError {
    fn from(err: ShareError) -> Self {
        match err {
            ShareError::Store(e) => e.into(),
            ShareError::Crypto(e) => e.into(),
            ShareError::Access(e) => e.into(),
            ShareError::Serde(e) => UsyncError::Validation(e.to_string()),
            ShareError::Validation(detail) => UsyncError::Validation(detail),
            ShareError::Integrity(detail) => UsyncError::Integrity(detail),
        }
    }
}

pub type Result<T> = std::result::Result<T, ShareError>;
