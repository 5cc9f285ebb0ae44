//! Access control for PROTECTED and PRIVATE shares.
//!
//! PROTECTED shares need only a password; PRIVATE shares need a Schnorr
//! proof of membership checked against a commitment set, the way
//! [`usync_crypto::zk_membership_prove`]/`verify` were designed to be used.

mod error;
mod grant;
mod keys;
mod private;
mod protected;

pub use error::{AccessError, Result};
pub use grant::make_access_grant;
pub use keys::{derive_user_access_keys, ecies_public_key, membership_public_key, UserAccessKeys};
pub use private::{prove_membership, unlock_private_share};
pub use protected::unlock_protected_share;
