use rand::{rngs::OsRng, RngCore};

const LOWERCASE_ALPHABET: &[u8] = b"abcdefghijklmnopqrstuvwxyz";
const SUBJECT_LEN: usize = 20;

//--------------------------------------------------------------------------------------------------
// Functions
//--------------------------------------------------------------------------------------------------

/// Generates a fresh 20-character lowercase `usenet_subject`. Each call
/// draws independently from a CSPRNG: no bit of the result is correlated
/// with segment content, file name, or any prior call.
pub fn obfuscated_subject() -> String {
    obfuscated_subject_with_rng(&mut OsRng)
}

/// Same as [`obfuscated_subject`] but takes an explicit RNG, so tests and
/// deterministic replay tooling can supply a seeded one.
pub fn obfuscated_subject_with_rng(rng: &mut impl RngCore) -> String {
    let mut bytes = vec![0u8; SUBJECT_LEN];
    rng.fill_bytes(&mut bytes);
    bytes
        .into_iter()
        .map(|b| LOWERCASE_ALPHABET[(b as usize) % LOWERCASE_ALPHABET.len()] as char)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand_chacha::rand_core::SeedableRng;
    use rand_chacha::ChaCha20Rng;
    use std::collections::HashSet;

    #[test]
    fn subject_is_twenty_lowercase_letters() {
        let subject = obfuscated_subject();
        assert_eq!(subject.len(), SUBJECT_LEN);
        assert!(subject.chars().all(|c| c.is_ascii_lowercase()));
    }

    #[test]
    fn repeated_calls_are_independent() {
        let mut rng = ChaCha20Rng::seed_from_u64(42);
        let mut seen = HashSet::new();
        for _ in 0..1000 {
            seen.insert(obfuscated_subject_with_rng(&mut rng));
        }
        // Collisions across 1000 draws of 26^20 space would indicate a broken RNG, not chance.
        assert_eq!(seen.len(), 1000);
    }
}
