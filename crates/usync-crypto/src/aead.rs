use aes_gcm::{
    aead::{Aead, KeyInit},
    Aes256Gcm, Key, Nonce,
};
use rand::{rngs::OsRng, RngCore};

use crate::error::{CryptoError, Result};

const NONCE_LEN: usize = 12;

//--------------------------------------------------------------------------------------------------
// Functions
//--------------------------------------------------------------------------------------------------

/// General-purpose AES-256-GCM seal with a random nonce, used wherever a
/// value is encrypted once under a key that isn't itself content-addressed
/// (the share index, unlike segment ciphertext, which uses a deterministic
/// per-segment nonce instead). Returns `nonce ‖ ciphertext`.
pub fn aead_seal(key: &[u8; 32], plaintext: &[u8]) -> Vec<u8> {
    let cipher = Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(key));
    let mut nonce_bytes = [0u8; NONCE_LEN];
    OsRng.fill_bytes(&mut nonce_bytes);
    let nonce = Nonce::from_slice(&nonce_bytes);
    let ciphertext = cipher.encrypt(nonce, plaintext).expect("AES-256-GCM encryption cannot fail");

    let mut out = Vec::with_capacity(NONCE_LEN + ciphertext.len());
    out.extend_from_slice(&nonce_bytes);
    out.extend(ciphertext);
    out
}

/// Opens a value sealed by [`aead_seal`].
pub fn aead_open(key: &[u8; 32], sealed: &[u8]) -> Result<Vec<u8>> {
    if sealed.len() < NONCE_LEN {
        return Err(CryptoError::InvalidKey("sealed payload shorter than a nonce".into()));
    }
    let (nonce_bytes, ciphertext) = sealed.split_at(NONCE_LEN);
    let cipher = Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(key));
    let nonce = Nonce::from_slice(nonce_bytes);
    cipher.decrypt(nonce, ciphertext).map_err(|_| CryptoError::TagMismatch)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn seal_then_open_round_trips() {
        let key = [1u8; 32];
        let sealed = aead_seal(&key, b"share index bytes");
        assert_eq!(aead_open(&key, &sealed).unwrap(), b"share index bytes");
    }

    #[test]
    fn tampered_payload_fails_to_open() {
        let key = [1u8; 32];
        let mut sealed = aead_seal(&key, b"share index bytes");
        let last = sealed.len() - 1;
        sealed[last] ^= 0xFF;
        assert!(aead_open(&key, &sealed).is_err());
    }

    #[test]
    fn two_seals_of_the_same_plaintext_differ() {
        let key = [1u8; 32];
        let a = aead_seal(&key, b"same plaintext");
        let b = aead_seal(&key, b"same plaintext");
        assert_ne!(a, b);
    }
}
