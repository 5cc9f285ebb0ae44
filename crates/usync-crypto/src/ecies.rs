use aes_gcm::{
    aead::{Aead, KeyInit},
    Aes256Gcm, Key, Nonce,
};
use hkdf::Hkdf;
use rand::{rngs::OsRng, RngCore};
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use x25519_dalek::{EphemeralSecret, PublicKey as X25519PublicKey, StaticSecret};

use crate::error::{CryptoError, Result};

//--------------------------------------------------------------------------------------------------
// Constants
//--------------------------------------------------------------------------------------------------

const DOMAIN_WRAP_KEY: &[u8] = b"UNS-v1-private-share-key-wrap";

//--------------------------------------------------------------------------------------------------
// Type Definitions
//--------------------------------------------------------------------------------------------------

/// A PRIVATE share's content key `K`, ECIES-wrapped to one authorized
/// user's X25519 public key. One of these is stored per `AccessGrant`
/// alongside its commitment.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WrappedKey {
    #[serde(with = "serde_bytes")]
    pub ephemeral_public: [u8; 32],
    #[serde(with = "serde_bytes")]
    pub nonce: [u8; 12],
    pub ciphertext: Vec<u8>,
}

//--------------------------------------------------------------------------------------------------
// Functions
//--------------------------------------------------------------------------------------------------

fn wrap_key_from_shared_secret(shared: &[u8; 32]) -> [u8; 32] {
    let hk = Hkdf::<Sha256>::new(Some(DOMAIN_WRAP_KEY), shared);
    let mut key = [0u8; 32];
    hk.expand(b"wrap-key", &mut key)
        .expect("32 bytes is a valid HKDF-SHA256 output length");
    key
}

/// Wraps `content_key` to `recipient_public` with a fresh ephemeral X25519
/// keypair. The recipient's static secret is never seen by
/// the publisher; only its public key travels in the clear, as is usual
/// for ECIES.
pub fn ecies_wrap_key(recipient_public: &[u8; 32], content_key: &[u8; 32]) -> WrappedKey {
    let ephemeral_secret = EphemeralSecret::random_from_rng(OsRng);
    let ephemeral_public = X25519PublicKey::from(&ephemeral_secret);
    let shared = ephemeral_secret.diffie_hellman(&X25519PublicKey::from(*recipient_public));
    let wrap_key = wrap_key_from_shared_secret(shared.as_bytes());

    let mut nonce_bytes = [0u8; 12];
    OsRng.fill_bytes(&mut nonce_bytes);

    let cipher = Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(&wrap_key));
    let nonce = Nonce::from_slice(&nonce_bytes);
    let ciphertext = cipher
        .encrypt(nonce, content_key.as_slice())
        .expect("AES-256-GCM encryption of a 32-byte key cannot fail");

    WrappedKey { ephemeral_public: ephemeral_public.to_bytes(), nonce: nonce_bytes, ciphertext }
}

/// Recovers the content key a matching [`ecies_wrap_key`] call wrapped,
/// given the recipient's static X25519 secret.
pub fn ecies_unwrap_key(recipient_secret: &[u8; 32], wrapped: &WrappedKey) -> Result<[u8; 32]> {
    let secret = StaticSecret::from(*recipient_secret);
    let ephemeral_public = X25519PublicKey::from(wrapped.ephemeral_public);
    let shared = secret.diffie_hellman(&ephemeral_public);
    let wrap_key = wrap_key_from_shared_secret(shared.as_bytes());

    let cipher = Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(&wrap_key));
    let nonce = Nonce::from_slice(&wrapped.nonce);
    let plaintext = cipher
        .decrypt(nonce, wrapped.ciphertext.as_slice())
        .map_err(|_| CryptoError::TagMismatch)?;

    plaintext.try_into().map_err(|_| CryptoError::InvalidKey("unwrapped key is not 32 bytes".into()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wrap_then_unwrap_round_trips() {
        let recipient_secret = StaticSecret::random_from_rng(OsRng);
        let recipient_public = X25519PublicKey::from(&recipient_secret).to_bytes();
        let content_key = [7u8; 32];

        let wrapped = ecies_wrap_key(&recipient_public, &content_key);
        let unwrapped = ecies_unwrap_key(&recipient_secret.to_bytes(), &wrapped).unwrap();
        assert_eq!(unwrapped, content_key);
    }

    #[test]
    fn wrong_recipient_secret_fails() {
        let recipient_secret = StaticSecret::random_from_rng(OsRng);
        let recipient_public = X25519PublicKey::from(&recipient_secret).to_bytes();
        let wrapped = ecies_wrap_key(&recipient_public, &[7u8; 32]);

        let other_secret = StaticSecret::random_from_rng(OsRng);
        assert!(ecies_unwrap_key(&other_secret.to_bytes(), &wrapped).is_err());
    }

    #[test]
    fn two_wraps_of_the_same_key_differ() {
        let recipient_secret = StaticSecret::random_from_rng(OsRng);
        let recipient_public = X25519PublicKey::from(&recipient_secret).to_bytes();
        let content_key = [7u8; 32];

        let a = ecies_wrap_key(&recipient_public, &content_key);
        let b = ecies_wrap_key(&recipient_public, &content_key);
        assert_ne!(a.ephemeral_public, b.ephemeral_public);
    }
}
