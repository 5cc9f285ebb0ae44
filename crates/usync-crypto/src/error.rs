use thiserror::Error;
use usync_common::UsyncError;

//--------------------------------------------------------------------------------------------------
// Type Definitions
//--------------------------------------------------------------------------------------------------

/// Crypto-layer errors. Converts into [`UsyncError::Integrity`] at the
/// workspace boundary, since a failed tag check or signature is the only
/// crypto failure mode callers outside this crate need to branch on (the
/// others are programmer errors: a malformed key length, a bad share-type
/// tag).
#[derive(Debug, Error)]
pub enum CryptoError {
    #[error("AES-GCM authentication tag mismatch")]
    TagMismatch,

    #[error("invalid key material: {0}")]
    InvalidKey(String),

    #[error("signature verification failed")]
    SignatureInvalid,

    #[error("membership proof verification failed")]
    ProofInvalid,
}

impl From<CryptoError> for UsyncError {
    fn from(err: CryptoError) -> Self {
        match err {
            CryptoError::TagMismatch => UsyncError::Integrity("AES-GCM tag mismatch".into()),
            CryptoError::SignatureInvalid => {
                UsyncError::Integrity("folder-key signature invalid".into())
            }
            CryptoError::ProofInvalid => {
                UsyncError::Integrity("zero-knowledge membership proof invalid".into())
            }
            CryptoError::InvalidKey(detail) => UsyncError::Validation(detail),
        }
    }
}

pub type Result<T> = std::result::Result<T, CryptoError>;
