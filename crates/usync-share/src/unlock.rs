use ed25519_dalek::Signature;
use usync_access::UserAccessKeys;
use usync_common::{FolderUniqueId, ShareId};
use usync_store::AccessGrantRow;

use crate::envelope::decode_envelope;
use crate::error::{Result, ShareError};
use crate::model::{Manifest, SignedManifest};

//--------------------------------------------------------------------------------------------------
// Type Definitions
//--------------------------------------------------------------------------------------------------

/// The secret material needed to recover a share's content key, one variant
/// per `ShareType`. The variant must match the `encrypted_index`
/// header's `access_type` or [`unlock_manifest`] rejects it.
pub enum UnlockRequest {
    Public,
    Protected { password: String },
    Private { access_keys: UserAccessKeys, grants: Vec<AccessGrantRow> },
}

//--------------------------------------------------------------------------------------------------
// Functions
//--------------------------------------------------------------------------------------------------

/// Decrypts and signature-verifies a share index, the
/// mirror image of [`crate::publish_share`]'s encryption half.
pub fn unlock_manifest(
    encrypted_index: &[u8],
    folder_unique_id: &FolderUniqueId,
    share_id: &ShareId,
    request: UnlockRequest,
) -> Result<Manifest> {
    let envelope = decode_envelope(encrypted_index)?;

    let signed_bytes = match (envelope.share_type, request) {
        (usync_common::ShareType::Public, UnlockRequest::Public) => {
            let key = usync_crypto::public_share_key(folder_unique_id);
            usync_crypto::aead_open(&key, envelope.payload)?
        }
        (usync_common::ShareType::Protected, UnlockRequest::Protected { password }) => {
            let (salt, sealed) = split_salt(envelope.payload)?;
            let password_key = usync_crypto::derive_password_key(&password, salt)?;
            let key = usync_crypto::protected_share_key(&password_key, share_id);
            usync_crypto::aead_open(&key, sealed)?
        }
        (usync_common::ShareType::Private, UnlockRequest::Private { access_keys, grants }) => {
            let (salt_share, sealed) = split_salt(envelope.payload)?;
            let proof = usync_access::prove_membership(&access_keys, share_id);
            let content_key = usync_access::unlock_private_share(&access_keys, &proof, share_id, salt_share, &grants)?;
            usync_crypto::aead_open(&content_key, sealed)?
        }
        (share_type, _) => {
            return Err(ShareError::Validation(format!("unlock request does not match share_type {share_type:?}")))
        }
    };

    let signed: SignedManifest = serde_json::from_slice(&signed_bytes)?;
    let manifest_bytes = serde_json::to_vec(&signed.manifest)?;
    let signature = Signature::from_slice(&signed.signature)
        .map_err(|_| ShareError::Integrity("malformed manifest signature".into()))?;
    usync_crypto::verify(&manifest_bytes, &signature, folder_unique_id)
        .map_err(|_| ShareError::Integrity("manifest signature does not verify".into()))?;

    Ok(signed.manifest)
}

fn split_salt(payload: &[u8]) -> Result<(&[u8; 16], &[u8])> {
    if payload.len() < 16 {
        return Err(ShareError::Integrity("payload shorter than its salt prefix".into()));
    }
    let (salt, rest) = payload.split_at(16);
    Ok((salt.try_into().expect("split_at(16) yields a 16-byte slice"), rest))
}
