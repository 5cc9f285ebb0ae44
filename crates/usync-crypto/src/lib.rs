//! Cryptographic primitives: streaming segment encryption, key derivation,
//! signing, and the membership proof used by access control.
//!
//! Every function here treats [`FolderUniqueId`](usync_common::FolderUniqueId)
//! as the sole cryptographic identifier of a folder. There is no overload
//! that accepts a raw byte array or a database row id in its place.

mod aead;
mod ecies;
mod error;
mod kdf;
mod keys;
mod stream;
mod subject;
mod zk;

pub use aead::*;
pub use ecies::*;
pub use error::*;
pub use kdf::*;
pub use keys::*;
pub use stream::*;
pub use subject::*;
pub use zk::*;

use sha2::{Digest, Sha256};

/// `SHA-256` of full plaintext, streamed. Used for `content_hash` (whole
/// file) and `plaintext_hash` (single segment) alike, both a SHA-256 over
/// some byte range.
pub fn sha256(data: &[u8]) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hasher.finalize().into()
}

/// Incremental SHA-256 hasher for streaming large files in fixed-size reads
/// without holding the whole file in memory.
#[derive(Default)]
pub struct StreamingHasher(Sha256);

impl StreamingHasher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn update(&mut self, chunk: &[u8]) {
        self.0.update(chunk);
    }

    pub fn finalize(self) -> [u8; 32] {
        self.0.finalize().into()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn streaming_hasher_matches_one_shot() {
        let data = b"the quick brown fox jumps over the lazy dog";
        let mut hasher = StreamingHasher::new();
        for chunk in data.chunks(7) {
            hasher.update(chunk);
        }
        assert_eq!(hasher.finalize(), sha256(data));
    }
}
