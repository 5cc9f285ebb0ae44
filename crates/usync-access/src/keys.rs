use curve25519_dalek::scalar::Scalar;
use hkdf::Hkdf;
use sha2::Sha256;
use x25519_dalek::{PublicKey as X25519PublicKey, StaticSecret};

//--------------------------------------------------------------------------------------------------
// Constants
//--------------------------------------------------------------------------------------------------

const DOMAIN_USER_ACCESS_KEYS: &[u8] = b"UNS-v1-user-access-keys";

//--------------------------------------------------------------------------------------------------
// Type Definitions
//--------------------------------------------------------------------------------------------------

/// A user's two purpose-specific access-control keys, both derived from
/// one 32-byte secret seed (`user_sk` in the `download_share` call). The
/// membership secret proves PRIVATE-share membership; the ECIES
/// secret unwraps the content key a grant wrapped to this user.
/// Keeping them distinct, rather than reusing one curve point
/// for both Ristretto and X25519 operations, avoids mixing incompatible
/// group representations.
#[derive(Debug, Clone)]
pub struct UserAccessKeys {
    pub membership_secret: Scalar,
    pub ecies_secret: [u8; 32],
}

//--------------------------------------------------------------------------------------------------
// Functions
//--------------------------------------------------------------------------------------------------

/// Deterministically derives both access keys from a user's secret seed.
pub fn derive_user_access_keys(user_secret_seed: &[u8; 32]) -> UserAccessKeys {
    let hk = Hkdf::<Sha256>::new(Some(DOMAIN_USER_ACCESS_KEYS), user_secret_seed);

    let mut membership_wide = [0u8; 64];
    hk.expand(b"membership-scalar", &mut membership_wide)
        .expect("64 bytes is a valid HKDF-SHA256 output length");
    let membership_secret = Scalar::from_bytes_mod_order_wide(&membership_wide);

    let mut ecies_secret = [0u8; 32];
    hk.expand(b"ecies-secret", &mut ecies_secret)
        .expect("32 bytes is a valid HKDF-SHA256 output length");

    UserAccessKeys { membership_secret, ecies_secret }
}

/// The Ristretto public key committed to in an `AccessGrant`.
pub fn membership_public_key(keys: &UserAccessKeys) -> [u8; 32] {
    usync_crypto::membership_public_key(&keys.membership_secret)
}

/// The X25519 public key a publisher wraps a PRIVATE share's content key to.
pub fn ecies_public_key(keys: &UserAccessKeys) -> [u8; 32] {
    X25519PublicKey::from(&StaticSecret::from(keys.ecies_secret)).to_bytes()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn same_seed_derives_the_same_keys() {
        let seed = [9u8; 32];
        let a = derive_user_access_keys(&seed);
        let b = derive_user_access_keys(&seed);
        assert_eq!(a.membership_secret, b.membership_secret);
        assert_eq!(a.ecies_secret, b.ecies_secret);
    }

    #[test]
    fn different_seeds_derive_different_keys() {
        let a = derive_user_access_keys(&[1u8; 32]);
        let b = derive_user_access_keys(&[2u8; 32]);
        assert_ne!(a.membership_secret, b.membership_secret);
        assert_ne!(a.ecies_secret, b.ecies_secret);
    }

    #[test]
    fn membership_and_ecies_public_keys_differ() {
        let keys = derive_user_access_keys(&[3u8; 32]);
        assert_ne!(membership_public_key(&keys), ecies_public_key(&keys));
    }
}
