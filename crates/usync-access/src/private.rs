use usync_common::ShareId;
use usync_crypto::MembershipProof;
use usync_store::AccessGrantRow;

use crate::error::{AccessError, Result};
use crate::keys::UserAccessKeys;

//--------------------------------------------------------------------------------------------------
// Functions
//--------------------------------------------------------------------------------------------------

/// Proves knowledge of `keys.membership_secret`, bound to `share_id` so the
/// proof can't be replayed against a different share.
pub fn prove_membership(keys: &UserAccessKeys, share_id: &ShareId) -> MembershipProof {
    usync_crypto::zk_membership_prove(&keys.membership_secret, share_id.as_bytes())
}

/// Verifies `proof`, matches it against `grants` by recomputing its
/// commitment, and unwraps the content key the matching grant carries.
/// The publisher never learns which grant matched;
/// only the caller, who already holds `keys`, can compute the commitment.
pub fn unlock_private_share(
    keys: &UserAccessKeys,
    proof: &MembershipProof,
    share_id: &ShareId,
    salt_share: &[u8],
    grants: &[AccessGrantRow],
) -> Result<[u8; 32]> {
    usync_crypto::zk_membership_verify(proof, share_id.as_bytes())?;

    let commitment = usync_crypto::membership_commitment(&proof.public_key, salt_share);
    let grant = grants.iter().find(|g| g.commitment == commitment).ok_or(AccessError::MembershipNotGranted)?;

    let wrapped: usync_crypto::WrappedKey =
        bincode::deserialize(&grant.wrapped_key).map_err(|e| AccessError::MalformedWrappedKey(e.to_string()))?;
    Ok(usync_crypto::ecies_unwrap_key(&keys.ecies_secret, &wrapped)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::keys::derive_user_access_keys;

    #[test]
    fn proof_verifies_against_its_own_share_id() {
        let keys = derive_user_access_keys(&[1u8; 32]);
        let share_id = ShareId::from_bytes([2u8; 16]);
        let proof = prove_membership(&keys, &share_id);
        usync_crypto::zk_membership_verify(&proof, share_id.as_bytes()).unwrap();
    }

    #[test]
    fn unlock_fails_when_no_grant_matches() {
        let keys = derive_user_access_keys(&[1u8; 32]);
        let share_id = ShareId::from_bytes([2u8; 16]);
        let proof = prove_membership(&keys, &share_id);
        let err = unlock_private_share(&keys, &proof, &share_id, b"salt-share-bytes", &[]).unwrap_err();
        assert!(matches!(err, AccessError::MembershipNotGranted));
    }
}
