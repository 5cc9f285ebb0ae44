use rand::{rngs::OsRng, RngCore};
use usync_common::{now, DbFolderId, FolderState, ShareId, ShareType, UserId};
use usync_store::{ContentStore, ShareRow};

use crate::envelope::encode_envelope;
use crate::error::{Result, ShareError};
use crate::manifest::build_manifest;
use crate::model::SignedManifest;

//--------------------------------------------------------------------------------------------------
// Type Definitions
//--------------------------------------------------------------------------------------------------

/// One authorized recipient of a PRIVATE share: the
/// two public keys derived from their `usync_access::UserAccessKeys`.
#[derive(Debug, Clone)]
pub struct PrivateMember {
    pub membership_public_key: [u8; 32],
    pub ecies_public_key: [u8; 32],
}

/// The access-type-specific inputs a publisher supplies. The
/// variant must match the `share_type` passed to [`publish_share`].
#[derive(Debug, Clone)]
pub enum PublishRequest {
    Public,
    Protected { password: String },
    Private { members: Vec<PrivateMember> },
}

//--------------------------------------------------------------------------------------------------
// Functions
//--------------------------------------------------------------------------------------------------

/// Assembles, signs, encrypts and stores a folder's share index,
/// driving the folder through `Uploaded -> Publishing -> Published`.
/// `owner_signing_key` is the owning user's
/// `share_id`-minting key seed; it is never persisted.
pub async fn publish_share(
    store: &dyn ContentStore,
    folder_db_id: DbFolderId,
    owner_id: &UserId,
    owner_signing_key: &[u8],
    share_type: ShareType,
    request: PublishRequest,
) -> Result<ShareId> {
    let folder = store
        .get_folder(folder_db_id)
        .await?
        .ok_or_else(|| ShareError::Validation(format!("folder {folder_db_id:?} not found")))?;

    if folder.state != FolderState::Uploaded {
        return Err(ShareError::Validation(format!(
            "folder must be Uploaded before publishing, was {:?}",
            folder.state
        )));
    }

    let share_id = usync_crypto::share_id(owner_signing_key, &folder.folder_unique_id, share_type);

    store.transition_folder_state(folder_db_id, FolderState::Publishing).await?;

    let manifest = build_manifest(store, folder_db_id, folder.folder_unique_id).await?;
    let manifest_bytes = serde_json::to_vec(&manifest)?;
    let signature = usync_crypto::sign(&manifest_bytes, &folder.folder_unique_id).to_bytes().to_vec();
    let signed_bytes = serde_json::to_vec(&SignedManifest { manifest, signature })?;

    let payload = match (share_type, request) {
        (ShareType::Public, PublishRequest::Public) => {
            let key = usync_crypto::public_share_key(&folder.folder_unique_id);
            usync_crypto::aead_seal(&key, &signed_bytes)
        }
        (ShareType::Protected, PublishRequest::Protected { password }) => {
            let mut salt = [0u8; 16];
            OsRng.fill_bytes(&mut salt);
            let password_key = usync_crypto::derive_password_key(&password, &salt)?;
            let key = usync_crypto::protected_share_key(&password_key, &share_id);
            prefix_with_salt(&salt, &usync_crypto::aead_seal(&key, &signed_bytes))
        }
        (ShareType::Private, PublishRequest::Private { members }) => {
            let mut salt_share = [0u8; 16];
            OsRng.fill_bytes(&mut salt_share);
            let mut content_key = [0u8; 32];
            OsRng.fill_bytes(&mut content_key);

            for member in &members {
                let grant = usync_access::make_access_grant(
                    &share_id,
                    &salt_share,
                    &member.membership_public_key,
                    &member.ecies_public_key,
                    &content_key,
                )?;
                store.insert_access_grant(grant).await?;
            }

            prefix_with_salt(&salt_share, &usync_crypto::aead_seal(&content_key, &signed_bytes))
        }
        (share_type, _) => {
            return Err(ShareError::Validation(format!(
                "publish request does not match share_type {share_type:?}"
            )))
        }
    };

    store
        .create_share(ShareRow {
            share_id: share_id.clone(),
            folder_db_id,
            share_type,
            encrypted_index: encode_envelope(share_type, &payload),
            owner_id: owner_id.clone(),
            created_at: now(),
            expires_at: None,
        })
        .await?;

    store.transition_folder_state(folder_db_id, FolderState::Published).await?;

    Ok(share_id)
}

fn prefix_with_salt(salt: &[u8; 16], sealed: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(16 + sealed.len());
    out.extend_from_slice(salt);
    out.extend_from_slice(sealed);
    out
}
