use argon2::{Argon2, Params, Version};
use hkdf::Hkdf;
use hmac::{Hmac, Mac};
use sha2::Sha256;
use usync_common::{FolderUniqueId, ShareId, ShareType};

use crate::error::{CryptoError, Result};

type HmacSha256 = Hmac<Sha256>;

//--------------------------------------------------------------------------------------------------
// Constants
//--------------------------------------------------------------------------------------------------

const DOMAIN_PUBLIC_SHARE: &[u8] = b"public";
const DOMAIN_PROTECTED_SHARE: &[u8] = b"UNS-v1-protected-share-key";

/// Argon2id parameters for PROTECTED share passwords: 19 MiB memory cost,
/// 2 iterations, 1 degree of parallelism, OWASP's baseline recommendation
/// for an interactive KDF. These are policy, not an invariant, and can be
/// raised later as long as the chosen cost parameters travel with the
/// salt.
const ARGON2_MEM_COST_KIB: u32 = 19 * 1024;
const ARGON2_TIME_COST: u32 = 2;
const ARGON2_PARALLELISM: u32 = 1;

//--------------------------------------------------------------------------------------------------
// Functions
//--------------------------------------------------------------------------------------------------

/// `HKDF(folder_unique_id ‖ "public")`. Any holder of the `share_id` can
/// recompute this, since `share_id` itself is derived from
/// `folder_unique_id` and both travel together out-of-band.
pub fn public_share_key(folder_unique_id: &FolderUniqueId) -> [u8; 32] {
    let hk = Hkdf::<Sha256>::new(Some(DOMAIN_PUBLIC_SHARE), folder_unique_id.as_bytes());
    let mut key = [0u8; 32];
    hk.expand(b"index-key", &mut key)
        .expect("32 bytes is a valid HKDF-SHA256 output length");
    key
}

/// `HKDF(password-derived-key ‖ share_id)`.
pub fn protected_share_key(password_derived_key: &[u8; 32], share_id: &ShareId) -> [u8; 32] {
    let hk = Hkdf::<Sha256>::new(Some(DOMAIN_PROTECTED_SHARE), password_derived_key);
    let mut key = [0u8; 32];
    hk.expand(share_id.as_bytes(), &mut key)
        .expect("32 bytes is a valid HKDF-SHA256 output length");
    key
}

/// Stretches a PROTECTED share's password into key material with Argon2id,
/// given the random per-share salt stored alongside the ciphertext.
pub fn derive_password_key(password: &str, salt: &[u8]) -> Result<[u8; 32]> {
    let params = Params::new(ARGON2_MEM_COST_KIB, ARGON2_TIME_COST, ARGON2_PARALLELISM, Some(32))
        .map_err(|e| CryptoError::InvalidKey(e.to_string()))?;
    let argon2 = Argon2::new(argon2::Algorithm::Argon2id, Version::V0x13, params);

    let mut out = [0u8; 32];
    argon2
        .hash_password_into(password.as_bytes(), salt, &mut out)
        .map_err(|e| CryptoError::InvalidKey(e.to_string()))?;
    Ok(out)
}

/// `HMAC-SHA-256(owner_key, folder_unique_id ‖ share_type)` truncated to
/// 128 bits. `owner_key` is the owning user's signing-key seed
/// material, so only the owner can mint a valid `share_id` for a given
/// `(folder, share_type)` pair, yet recomputing it to *verify* a `share_id`
/// requires no secret beyond knowing the claimed folder and owner.
pub fn share_id(owner_key: &[u8], folder_unique_id: &FolderUniqueId, share_type: ShareType) -> ShareId {
    let mut mac = HmacSha256::new_from_slice(owner_key).expect("HMAC accepts keys of any length");
    mac.update(folder_unique_id.as_bytes());
    mac.update(&[share_type.wire_tag()]);
    let full = mac.finalize().into_bytes();

    let mut truncated = [0u8; 16];
    truncated.copy_from_slice(&full[..16]);
    ShareId::from_bytes(truncated)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn public_share_key_is_deterministic() {
        let id = FolderUniqueId::from_bytes([1u8; 16]);
        assert_eq!(public_share_key(&id), public_share_key(&id));
    }

    #[test]
    fn password_key_depends_on_salt() {
        let a = derive_password_key("s3cret!", b"salt-one-16bytes").unwrap();
        let b = derive_password_key("s3cret!", b"salt-two-16bytes").unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn password_key_is_deterministic_for_same_salt() {
        let salt = b"fixed-salt-bytes";
        let a = derive_password_key("s3cret!", salt).unwrap();
        let b = derive_password_key("s3cret!", salt).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn share_id_differs_by_share_type() {
        let owner_key = b"owner-signing-key-seed-material";
        let folder_id = FolderUniqueId::from_bytes([2u8; 16]);
        let public_id = share_id(owner_key, &folder_id, ShareType::Public);
        let private_id = share_id(owner_key, &folder_id, ShareType::Private);
        assert_ne!(public_id.as_bytes(), private_id.as_bytes());
    }
}
