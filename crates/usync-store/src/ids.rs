use rand::RngCore;
use sha2::{Digest, Sha256};
use usync_common::{FolderUniqueId, UserId};

/// `user_id` is a stable SHA-256 of the user's identity material; here
/// that material is the Ed25519 public key handed to `initialize_user`.
pub(crate) fn derive_user_id(public_key: &[u8; 32]) -> UserId {
    let mut hasher = Sha256::new();
    hasher.update(public_key);
    UserId::from_bytes(hasher.finalize().into())
}

/// A fresh, random `folder_unique_id`. Collisions are astronomically
/// unlikely at 128 bits; the `UNIQUE` constraint on the column is the
/// backstop, surfaced to callers as `ConflictError` if it ever fires.
pub(crate) fn random_folder_unique_id() -> FolderUniqueId {
    let mut bytes = [0u8; 16];
    rand::rngs::OsRng.fill_bytes(&mut bytes);
    FolderUniqueId::from_bytes(bytes)
}
