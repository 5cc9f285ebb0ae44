use usync_common::ShareType;

use crate::error::{Result, ShareError};

//--------------------------------------------------------------------------------------------------
// Constants
//--------------------------------------------------------------------------------------------------

const MAGIC: &[u8; 4] = b"UNSI";
const VERSION: u16 = 1;
const CIPHER_SUITE_AES_256_GCM: u8 = 0;

//--------------------------------------------------------------------------------------------------
// Functions
//--------------------------------------------------------------------------------------------------

/// Frames an already-encrypted payload into the `Share.encrypted_index`
/// wire format: `magic ‖ version:u16 ‖ access_type:u8 ‖ cipher_suite:u8 ‖ payload`.
pub fn encode_envelope(share_type: ShareType, payload: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(4 + 2 + 1 + 1 + payload.len());
    out.extend_from_slice(MAGIC);
    out.extend_from_slice(&VERSION.to_be_bytes());
    out.push(share_type.wire_tag());
    out.push(CIPHER_SUITE_AES_256_GCM);
    out.extend_from_slice(payload);
    out
}

/// The parsed header fields of an encrypted index, plus the remaining
/// (still-encrypted) payload bytes.
pub struct Envelope<'a> {
    pub version: u16,
    pub share_type: ShareType,
    pub cipher_suite: u8,
    pub payload: &'a [u8],
}

pub fn decode_envelope(bytes: &[u8]) -> Result<Envelope<'_>> {
    if bytes.len() < 8 || &bytes[0..4] != MAGIC {
        return Err(ShareError::Integrity("missing or malformed UNSI magic".into()));
    }
    let version = u16::from_be_bytes([bytes[4], bytes[5]]);
    let share_type = ShareType::from_wire_tag(bytes[6])
        .ok_or_else(|| ShareError::Integrity(format!("unknown access_type tag {}", bytes[6])))?;
    let cipher_suite = bytes[7];
    if cipher_suite != CIPHER_SUITE_AES_256_GCM {
        return Err(ShareError::Integrity(format!("unsupported cipher_suite {cipher_suite}")));
    }

    Ok(Envelope { version, share_type, cipher_suite, payload: &bytes[8..] })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encode_then_decode_round_trips() {
        let encoded = encode_envelope(ShareType::Private, b"ciphertext-bytes");
        let decoded = decode_envelope(&encoded).unwrap();
        assert_eq!(decoded.version, VERSION);
        assert_eq!(decoded.share_type, ShareType::Private);
        assert_eq!(decoded.payload, b"ciphertext-bytes");
    }

    #[test]
    fn rejects_bad_magic() {
        let err = decode_envelope(b"XXXX\x00\x01\x00\x00payload").unwrap_err();
        assert!(matches!(err, ShareError::Integrity(_)));
    }

    #[test]
    fn rejects_unknown_cipher_suite() {
        let mut encoded = encode_envelope(ShareType::Public, b"x");
        encoded[7] = 9;
        assert!(decode_envelope(&encoded).is_err());
    }
}
