//! A minimal single-part yEnc codec. yEnc shifts every
//! byte by 42 (mod 256), escaping the handful of values that would
//! otherwise collide with NNTP control characters, and wraps output at a
//! fixed line length the way every yEnc encoder does.

use crate::error::{NntpError, Result};

const SHIFT: u8 = 42;
const ESCAPE: u8 = 0x3d; // '='
const LINE_LENGTH: usize = 128;

/// Bytes that must be escaped after shifting: NUL, LF, CR, and the escape
/// character itself, since a raw NNTP line reader treats those specially.
fn needs_escape(b: u8) -> bool {
    matches!(b, 0x00 | 0x0a | 0x0d | ESCAPE)
}

/// Encodes `data` into yEnc body lines (no `=ybegin`/`=yend` markers; those
/// are added by the caller alongside the NNTP headers).
pub fn encode(data: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(data.len() + data.len() / 8 + 16);
    let mut col = 0usize;
    for &byte in data {
        let shifted = byte.wrapping_add(SHIFT);
        if needs_escape(shifted) {
            out.push(ESCAPE);
            out.push(shifted.wrapping_add(SHIFT));
            col += 2;
        } else {
            out.push(shifted);
            col += 1;
        }
        if col >= LINE_LENGTH {
            out.push(b'\n');
            col = 0;
        }
    }
    if col != 0 {
        out.push(b'\n');
    }
    out
}

/// Decodes yEnc body lines produced by [`encode`]. Tolerant of the
/// encoder's own line breaks; any other byte is un-shifted verbatim.
pub fn decode(data: &[u8]) -> Result<Vec<u8>> {
    let mut out = Vec::with_capacity(data.len());
    let mut iter = data.iter().copied().filter(|&b| b != b'\n' && b != b'\r');
    while let Some(byte) = iter.next() {
        if byte == ESCAPE {
            let next = iter.next().ok_or_else(|| NntpError::Yenc("dangling escape byte".into()))?;
            out.push(next.wrapping_sub(SHIFT).wrapping_sub(SHIFT));
        } else {
            out.push(byte.wrapping_sub(SHIFT));
        }
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn round_trips_arbitrary_bytes() {
        let data: Vec<u8> = (0u16..=255).map(|b| b as u8).collect();
        let encoded = encode(&data);
        let decoded = decode(&encoded).unwrap();
        assert_eq!(decoded, data);
    }

    #[test]
    fn escapes_control_bytes() {
        let data = vec![0x00, 0x0a, 0x0d, 0x3d];
        let encoded = encode(&data);
        let decoded = decode(&encoded).unwrap();
        assert_eq!(decoded, data);
    }

    #[test]
    fn wraps_long_lines() {
        let data = vec![1u8; 1000];
        let encoded = encode(&data);
        assert!(encoded.split(|&b| b == b'\n').all(|line| line.len() <= LINE_LENGTH));
    }

    proptest! {
        #[test]
        fn round_trips_any_byte_string(data in proptest::collection::vec(any::<u8>(), 0..2000)) {
            let encoded = encode(&data);
            let decoded = decode(&encoded).unwrap();
            prop_assert_eq!(decoded, data);
        }
    }
}
