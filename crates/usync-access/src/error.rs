use thiserror::Error;
use usync_common::UsyncError;

//--------------------------------------------------------------------------------------------------
// Type Definitions
//--------------------------------------------------------------------------------------------------

/// Access-control errors.
#[derive(Debug, Error)]
pub enum AccessError {
    #[error(transparent)]
    Crypto(#[from] usync_crypto::CryptoError),

    #[error("no access grant matches the proven membership commitment")]
    MembershipNotGranted,

    #[error("malformed wrapped key: {0}")]
    MalformedWrappedKey(String),
}

impl From<AccessError> for UsyncError {
    fn from(err: AccessError) -> Self {
        match err {
            AccessError::Crypto(e) => e.into(),
            AccessError::MembershipNotGranted => UsyncError::Integrity("membership proof has no matching access grant".into()),
            AccessError::MalformedWrappedKey(detail) => UsyncError::Validation(detail),
        }
    }
}

pub type Result<T> = std::result::Result<T, AccessError>;
