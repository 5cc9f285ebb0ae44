use aes_gcm::{
    aead::{Aead, KeyInit},
    Aes256Gcm, Key, Nonce,
};
use hkdf::Hkdf;
use sha2::Sha256;
use usync_common::{FileId, FolderUniqueId, SegmentIndex};

use crate::error::{CryptoError, Result};

//--------------------------------------------------------------------------------------------------
// Constants
//--------------------------------------------------------------------------------------------------

const DOMAIN_SEGMENT_KEY: &[u8] = b"UNS-v1-segment-content-key";
const DOMAIN_NONCE: &[u8] = b"UNS-v1-segment-nonce";

//--------------------------------------------------------------------------------------------------
// Functions
//--------------------------------------------------------------------------------------------------

/// Derives the folder-wide AES-256-GCM content key used to encrypt every
/// segment of every file in a folder. It is a pure function of the folder
/// id, so any holder of a decrypted manifest (which carries the
/// `folder_unique_id`) can rederive it without a separate key exchange.
pub fn segment_content_key(folder_unique_id: &FolderUniqueId) -> [u8; 32] {
    let hk = Hkdf::<Sha256>::new(Some(DOMAIN_SEGMENT_KEY), folder_unique_id.as_bytes());
    let mut key = [0u8; 32];
    hk.expand(b"content-key", &mut key)
        .expect("32 bytes is a valid HKDF-SHA256 output length");
    key
}

/// Derives the per-segment nonce from `(folder_unique_id ‖ file_id ‖
/// segment_index)`. Deterministic so re-encrypting the same segment
/// content (e.g. on a resumed upload) reproduces the same ciphertext.
fn derive_nonce(folder_unique_id: &FolderUniqueId, file_id: FileId, segment_index: SegmentIndex) -> [u8; 12] {
    let mut ikm = Vec::with_capacity(16 + 8 + 4);
    ikm.extend_from_slice(folder_unique_id.as_bytes());
    ikm.extend_from_slice(&file_id.0.to_be_bytes());
    ikm.extend_from_slice(&segment_index.0.to_be_bytes());

    let hk = Hkdf::<Sha256>::new(Some(DOMAIN_NONCE), &ikm);
    let mut nonce = [0u8; 12];
    hk.expand(b"nonce", &mut nonce)
        .expect("12 bytes is a valid HKDF-SHA256 output length");
    nonce
}

/// Encrypts one segment's plaintext with AES-256-GCM, appending the
/// authentication tag. `key` is normally [`segment_content_key`]'s output
/// but is taken by reference so callers can swap in key material for tests
/// without rederiving it.
pub fn encrypt_segment(
    key: &[u8; 32],
    folder_unique_id: &FolderUniqueId,
    file_id: FileId,
    segment_index: SegmentIndex,
    plaintext: &[u8],
) -> Vec<u8> {
    let cipher = Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(key));
    let nonce_bytes = derive_nonce(folder_unique_id, file_id, segment_index);
    let nonce = Nonce::from_slice(&nonce_bytes);
    cipher
        .encrypt(nonce, plaintext)
        .expect("AES-256-GCM encryption of a bounded segment cannot fail")
}

/// Decrypts a segment produced by [`encrypt_segment`]. Fails with
/// [`CryptoError::TagMismatch`] on tag mismatch, which callers convert to
/// `UsyncError::Integrity` and, in the downloader, treat as a signal to
/// try the next redundancy copy.
pub fn decrypt_segment(
    key: &[u8; 32],
    folder_unique_id: &FolderUniqueId,
    file_id: FileId,
    segment_index: SegmentIndex,
    ciphertext: &[u8],
) -> Result<Vec<u8>> {
    let cipher = Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(key));
    let nonce_bytes = derive_nonce(folder_unique_id, file_id, segment_index);
    let nonce = Nonce::from_slice(&nonce_bytes);
    cipher
        .decrypt(nonce, ciphertext)
        .map_err(|_| CryptoError::TagMismatch)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encrypt_then_decrypt_round_trips() {
        let folder_id = FolderUniqueId::from_bytes([3u8; 16]);
        let key = segment_content_key(&folder_id);
        let plaintext = b"segment payload bytes";

        let ciphertext = encrypt_segment(&key, &folder_id, FileId(1), SegmentIndex(0), plaintext);
        let decrypted = decrypt_segment(&key, &folder_id, FileId(1), SegmentIndex(0), &ciphertext).unwrap();

        assert_eq!(decrypted, plaintext);
    }

    #[test]
    fn tampered_ciphertext_fails_with_tag_mismatch() {
        let folder_id = FolderUniqueId::from_bytes([3u8; 16]);
        let key = segment_content_key(&folder_id);
        let mut ciphertext = encrypt_segment(&key, &folder_id, FileId(1), SegmentIndex(0), b"data");
        let last = ciphertext.len() - 1;
        ciphertext[last] ^= 0xFF;

        let err = decrypt_segment(&key, &folder_id, FileId(1), SegmentIndex(0), &ciphertext).unwrap_err();
        assert!(matches!(err, CryptoError::TagMismatch));
    }

    #[test]
    fn different_segment_indices_use_different_nonces() {
        let folder_id = FolderUniqueId::from_bytes([3u8; 16]);
        let key = segment_content_key(&folder_id);
        let a = encrypt_segment(&key, &folder_id, FileId(1), SegmentIndex(0), b"same plaintext!!");
        let b = encrypt_segment(&key, &folder_id, FileId(1), SegmentIndex(1), b"same plaintext!!");
        assert_ne!(a, b);
    }

    #[test]
    fn segment_content_key_is_deterministic_per_folder() {
        let folder_id = FolderUniqueId::from_bytes([5u8; 16]);
        assert_eq!(segment_content_key(&folder_id), segment_content_key(&folder_id));
    }
}
