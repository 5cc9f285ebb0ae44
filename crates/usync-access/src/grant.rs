use usync_common::ShareId;
use usync_store::AccessGrantRow;

use crate::error::{AccessError, Result};

//--------------------------------------------------------------------------------------------------
// Functions
//--------------------------------------------------------------------------------------------------

/// Builds one authorized user's `AccessGrant` for a PRIVATE share: commits
/// to their membership public key without storing
/// it in the clear, and wraps the share's content key to their ECIES
/// public key so only they can recover it.
pub fn make_access_grant(
    share_id: &ShareId,
    salt_share: &[u8],
    member_membership_public_key: &[u8; 32],
    member_ecies_public_key: &[u8; 32],
    content_key: &[u8; 32],
) -> Result<AccessGrantRow> {
    let commitment = usync_crypto::membership_commitment(member_membership_public_key, salt_share);
    let wrapped = usync_crypto::ecies_wrap_key(member_ecies_public_key, content_key);
    let wrapped_key = bincode::serialize(&wrapped).map_err(|e| AccessError::MalformedWrappedKey(e.to_string()))?;
    Ok(AccessGrantRow { share_id: share_id.clone(), commitment, wrapped_key })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::keys::{derive_user_access_keys, ecies_public_key, membership_public_key};
    use crate::private::{prove_membership, unlock_private_share};

    #[test]
    fn grant_created_for_a_user_unlocks_for_that_user() {
        let share_id = ShareId::from_bytes([8u8; 16]);
        let salt_share = b"per-share-salt-1";
        let content_key = [5u8; 32];

        let member = derive_user_access_keys(&[11u8; 32]);
        let grant = make_access_grant(&share_id, salt_share, &membership_public_key(&member), &ecies_public_key(&member), &content_key).unwrap();

        let proof = prove_membership(&member, &share_id);
        let recovered = unlock_private_share(&member, &proof, &share_id, salt_share, std::slice::from_ref(&grant)).unwrap();
        assert_eq!(recovered, content_key);
    }
}
