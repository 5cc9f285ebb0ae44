use ed25519_dalek::{Signature, Signer, SigningKey, Verifier, VerifyingKey};
use hkdf::Hkdf;
use sha2::Sha256;
use usync_common::FolderUniqueId;

use crate::error::{CryptoError, Result};

//--------------------------------------------------------------------------------------------------
// Constants
//--------------------------------------------------------------------------------------------------

const DOMAIN_FOLDER_KEYS: &[u8] = b"UNS-v1-folder-ed25519-seed";
const DOMAIN_SIGN: &[u8] = b"UNS-v1";

//--------------------------------------------------------------------------------------------------
// Functions
//--------------------------------------------------------------------------------------------------

/// Deterministically derives the Ed25519 keypair for a folder from its
/// [`FolderUniqueId`]. The same `folder_unique_id` always yields the same
/// keypair on any host. Keys are never persisted in cleartext; they are
/// rederived on demand from the folder id whenever they're needed.
///
/// # Examples
///
/// ```
/// use usync_common::FolderUniqueId;
/// use usync_crypto::folder_keys_from_id;
///
/// let id = FolderUniqueId::from_bytes([7u8; 16]);
/// let (pk1, _) = folder_keys_from_id(&id);
/// let (pk2, _) = folder_keys_from_id(&id);
/// assert_eq!(pk1.to_bytes(), pk2.to_bytes());
/// ```
pub fn folder_keys_from_id(folder_unique_id: &FolderUniqueId) -> (VerifyingKey, SigningKey) {
    let hk = Hkdf::<Sha256>::new(Some(DOMAIN_FOLDER_KEYS), folder_unique_id.as_bytes());
    let mut seed = [0u8; 32];
    hk.expand(b"ed25519-seed", &mut seed)
        .expect("32 bytes is a valid HKDF-SHA256 output length");

    let signing_key = SigningKey::from_bytes(&seed);
    let verifying_key = signing_key.verifying_key();
    (verifying_key, signing_key)
}

fn domain_separated_digest(data: &[u8]) -> [u8; 32] {
    let mut payload = Vec::with_capacity(DOMAIN_SIGN.len() + data.len());
    payload.extend_from_slice(DOMAIN_SIGN);
    payload.extend_from_slice(data);
    crate::sha256(&payload)
}

/// Signs `data` under the folder key derived from `folder_unique_id`, over
/// the domain-separated payload `H("UNS-v1" ‖ data)`. Used to sign the
/// manifest at publish time so the downloader can refuse a tampered index.
pub fn sign(data: &[u8], folder_unique_id: &FolderUniqueId) -> Signature {
    let (_, signing_key) = folder_keys_from_id(folder_unique_id);
    let digest = domain_separated_digest(data);
    signing_key.sign(&digest)
}

/// Verifies a signature produced by [`sign`].
pub fn verify(data: &[u8], signature: &Signature, folder_unique_id: &FolderUniqueId) -> Result<()> {
    let (verifying_key, _) = folder_keys_from_id(folder_unique_id);
    let digest = domain_separated_digest(data);
    verifying_key
        .verify(&digest, signature)
        .map_err(|_| CryptoError::SignatureInvalid)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn folder_keys_are_a_pure_function_of_the_id() {
        let id = FolderUniqueId::from_bytes([42u8; 16]);
        let (pk_a, sk_a) = folder_keys_from_id(&id);
        let (pk_b, sk_b) = folder_keys_from_id(&id);
        assert_eq!(pk_a.to_bytes(), pk_b.to_bytes());
        assert_eq!(sk_a.to_bytes(), sk_b.to_bytes());
    }

    #[test]
    fn different_folders_derive_different_keys() {
        let a = folder_keys_from_id(&FolderUniqueId::from_bytes([1u8; 16]));
        let b = folder_keys_from_id(&FolderUniqueId::from_bytes([2u8; 16]));
        assert_ne!(a.0.to_bytes(), b.0.to_bytes());
    }

    #[test]
    fn sign_then_verify_round_trips() {
        let id = FolderUniqueId::from_bytes([9u8; 16]);
        let manifest = b"{\"version\":1}";
        let sig = sign(manifest, &id);
        verify(manifest, &sig, &id).unwrap();
    }

    #[test]
    fn verify_rejects_tampered_data() {
        let id = FolderUniqueId::from_bytes([9u8; 16]);
        let sig = sign(b"original", &id);
        assert!(verify(b"tampered", &sig, &id).is_err());
    }
}
