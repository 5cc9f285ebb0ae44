use curve25519_dalek::{constants::RISTRETTO_BASEPOINT_POINT, ristretto::CompressedRistretto, scalar::Scalar};
use rand::{rngs::OsRng, RngCore};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256, Sha512};

use crate::error::{CryptoError, Result};

//--------------------------------------------------------------------------------------------------
// Type Definitions
//--------------------------------------------------------------------------------------------------

/// A Schnorr proof of knowledge of the secret scalar behind a user's
/// public commitment, bound to a particular `share_id` so it can't be
/// replayed against a different share.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MembershipProof {
    /// Compressed Ristretto point: the user's public key, `sk * G`.
    #[serde(with = "serde_bytes")]
    pub public_key: [u8; 32],
    /// Compressed Ristretto point: the Schnorr commitment `r * G`.
    #[serde(with = "serde_bytes")]
    pub commitment: [u8; 32],
    /// The scalar response `s = r + e * sk`.
    #[serde(with = "serde_bytes")]
    pub response: [u8; 32],
}

//--------------------------------------------------------------------------------------------------
// Functions
//--------------------------------------------------------------------------------------------------

/// Generates a fresh membership secret scalar for a user. The corresponding
/// public key (`sk * G`) is what gets committed to in an `AccessGrant`,
/// never the raw `user_id`.
pub fn generate_membership_secret() -> Scalar {
    let mut bytes = [0u8; 64];
    OsRng.fill_bytes(&mut bytes);
    Scalar::from_bytes_mod_order_wide(&bytes)
}

pub fn membership_public_key(user_sk: &Scalar) -> [u8; 32] {
    (user_sk * RISTRETTO_BASEPOINT_POINT).compress().to_bytes()
}

/// The commitment stored in an `AccessGrant`: `H(public_key ‖ salt_share)`.
/// The publisher stores only this, never a plaintext user id.
pub fn membership_commitment(public_key: &[u8; 32], salt_share: &[u8]) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(public_key);
    hasher.update(salt_share);
    hasher.finalize().into()
}

fn challenge(commitment_point: &[u8; 32], public_key: &[u8; 32], context: &[u8]) -> Scalar {
    let mut hasher = Sha512::new();
    hasher.update(commitment_point);
    hasher.update(public_key);
    hasher.update(context);
    let digest: [u8; 64] = hasher.finalize().into();
    Scalar::from_bytes_mod_order_wide(&digest)
}

/// Proves knowledge of `user_sk` without revealing it, binding the proof to
/// `context` (normally the share's `share_id` bytes) so it cannot be
/// replayed against a different share.
pub fn zk_membership_prove(user_sk: &Scalar, context: &[u8]) -> MembershipProof {
    let public_key = membership_public_key(user_sk);

    let mut nonce_bytes = [0u8; 64];
    OsRng.fill_bytes(&mut nonce_bytes);
    let r = Scalar::from_bytes_mod_order_wide(&nonce_bytes);
    let commitment_point = (r * RISTRETTO_BASEPOINT_POINT).compress().to_bytes();

    let e = challenge(&commitment_point, &public_key, context);
    let response = r + e * user_sk;

    MembershipProof {
        public_key,
        commitment: commitment_point,
        response: response.to_bytes(),
    }
}

/// Verifies a [`MembershipProof`] is a valid Schnorr proof of knowledge for
/// its embedded public key, against `context`. This alone proves the
/// prover knows *some* membership secret; callers must additionally check
/// `membership_commitment(&proof.public_key, salt_share)` is present among
/// the share's access grants. That check lives in `usync-access`, since it
/// requires the grant set, which this crate doesn't know about.
pub fn zk_membership_verify(proof: &MembershipProof, context: &[u8]) -> Result<()> {
    let response: Option<Scalar> = Scalar::from_canonical_bytes(proof.response).into();
    let response = response.ok_or(CryptoError::ProofInvalid)?;
    let public_point = CompressedRistretto::from_slice(&proof.public_key)
        .map_err(|_| CryptoError::ProofInvalid)?
        .decompress()
        .ok_or(CryptoError::ProofInvalid)?;
    let commitment_point = CompressedRistretto::from_slice(&proof.commitment)
        .map_err(|_| CryptoError::ProofInvalid)?
        .decompress()
        .ok_or(CryptoError::ProofInvalid)?;

    let e = challenge(&proof.commitment, &proof.public_key, context);
    let lhs = response * RISTRETTO_BASEPOINT_POINT;
    let rhs = commitment_point + e * public_point;

    if lhs == rhs {
        Ok(())
    } else {
        Err(CryptoError::ProofInvalid)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn valid_proof_verifies() {
        let sk = generate_membership_secret();
        let proof = zk_membership_prove(&sk, b"share-id-bytes");
        zk_membership_verify(&proof, b"share-id-bytes").unwrap();
    }

    #[test]
    fn proof_is_bound_to_its_context() {
        let sk = generate_membership_secret();
        let proof = zk_membership_prove(&sk, b"share-a");
        assert!(zk_membership_verify(&proof, b"share-b").is_err());
    }

    #[test]
    fn commitment_matches_membership_public_key() {
        let sk = generate_membership_secret();
        let pk = membership_public_key(&sk);
        let salt = b"per-share-salt-16";
        let commitment = membership_commitment(&pk, salt);
        assert_eq!(commitment, membership_commitment(&pk, salt));
    }
}
