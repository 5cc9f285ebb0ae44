use usync_common::ShareId;

use crate::error::Result;

//--------------------------------------------------------------------------------------------------
// Functions
//--------------------------------------------------------------------------------------------------

/// Recovers a PROTECTED share's index decryption key from its password and
/// per-share salt. A wrong password derives a different
/// key silently; the caller finds out only when the resulting AES-GCM tag
/// check on the index fails (no oracle on
/// password correctness is ever exposed).
pub fn unlock_protected_share(password: &str, salt: &[u8], share_id: &ShareId) -> Result<[u8; 32]> {
    let password_derived_key = usync_crypto::derive_password_key(password, salt)?;
    Ok(usync_crypto::protected_share_key(&password_derived_key, share_id))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn same_password_and_salt_derive_the_same_key() {
        let share_id = ShareId::from_bytes([4u8; 16]);
        let a = unlock_protected_share("s3cret!", b"fixed-salt-bytes", &share_id).unwrap();
        let b = unlock_protected_share("s3cret!", b"fixed-salt-bytes", &share_id).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn wrong_password_derives_a_different_key() {
        let share_id = ShareId::from_bytes([4u8; 16]);
        let correct = unlock_protected_share("s3cret!", b"fixed-salt-bytes", &share_id).unwrap();
        let wrong = unlock_protected_share("wrong!!", b"fixed-salt-bytes", &share_id).unwrap();
        assert_ne!(correct, wrong);
    }
}
