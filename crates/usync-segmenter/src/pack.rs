use usync_common::FileId;

use crate::error::{Result, SegmenterError};

//--------------------------------------------------------------------------------------------------
// Type Definitions
//--------------------------------------------------------------------------------------------------

/// A small-file candidate for packing: qualifies when
/// `size <= PAYLOAD_MAX / 4`.
#[derive(Debug, Clone)]
pub struct PackCandidate {
    pub file_id: FileId,
    pub relative_path: String,
    pub content_hash: [u8; 32],
    pub plaintext: Vec<u8>,
}

/// One entry of the compact packing header prefixed to a packed segment's
/// plaintext: `[count, (file_id, offset, length) x count]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PackEntry {
    pub file_id: FileId,
    pub offset: u32,
    pub length: u32,
}

/// A group of files packed into a single segment, plus the concatenated
/// plaintext (header included) ready for encryption.
#[derive(Debug, Clone)]
pub struct PackedGroup {
    pub entries: Vec<PackEntry>,
    pub plaintext: Vec<u8>,
}

//--------------------------------------------------------------------------------------------------
// Functions
//--------------------------------------------------------------------------------------------------

/// Greedily bins `candidates` into packed segments no larger than
/// `payload_max`, at most `max_per_segment` files each. Candidates are
/// first sorted by `relative_path` ascending so that two files with
/// identical `content_hash` are packed with the lexicographically smaller
/// path first.
pub fn pack_small_files(mut candidates: Vec<PackCandidate>, payload_max: u64, max_per_segment: usize) -> Vec<PackedGroup> {
    candidates.sort_by(|a, b| a.relative_path.as_bytes().cmp(b.relative_path.as_bytes()));

    let mut groups = Vec::new();
    let mut current: Vec<PackCandidate> = Vec::new();
    let mut current_size: u64 = 0;

    for candidate in candidates {
        let would_overflow = current_size + candidate.plaintext.len() as u64 > payload_max;
        if (!current.is_empty() && would_overflow) || current.len() >= max_per_segment {
            groups.push(build_group(std::mem::take(&mut current)));
            current_size = 0;
        }
        current_size += candidate.plaintext.len() as u64;
        current.push(candidate);
    }
    if !current.is_empty() {
        groups.push(build_group(current));
    }
    groups
}

fn build_group(files: Vec<PackCandidate>) -> PackedGroup {
    let mut entries = Vec::with_capacity(files.len());
    let mut offset = 0u32;
    let mut data = Vec::new();
    for file in &files {
        let length = file.plaintext.len() as u32;
        entries.push(PackEntry { file_id: file.file_id, offset, length });
        data.extend_from_slice(&file.plaintext);
        offset += length;
    }

    let mut plaintext = encode_pack_header(&entries);
    plaintext.extend_from_slice(&data);
    PackedGroup { entries, plaintext }
}

/// Encodes the compact packing header: `count:u32 ‖ (file_id:i64,
/// offset:u32, length:u32) x count`, all big-endian. Offsets
/// are relative to the start of the data area, i.e. right after the header.
pub fn encode_pack_header(entries: &[PackEntry]) -> Vec<u8> {
    let mut out = Vec::with_capacity(4 + entries.len() * 16);
    out.extend_from_slice(&(entries.len() as u32).to_be_bytes());
    for entry in entries {
        out.extend_from_slice(&entry.file_id.0.to_be_bytes());
        out.extend_from_slice(&entry.offset.to_be_bytes());
        out.extend_from_slice(&entry.length.to_be_bytes());
    }
    out
}

/// Decodes a packed segment's plaintext into its header entries and the
/// remaining data area, so reassembly knows where each sibling file's
/// bytes start. The inverse of [`encode_pack_header`].
pub fn decode_pack_header(plaintext: &[u8]) -> Result<(Vec<PackEntry>, &[u8])> {
    if plaintext.len() < 4 {
        return Err(SegmenterError::Validation("packed segment shorter than its header length prefix".into()));
    }
    let count = u32::from_be_bytes(plaintext[0..4].try_into().expect("4 bytes")) as usize;
    let header_len = 4 + count * 16;
    if plaintext.len() < header_len {
        return Err(SegmenterError::Validation("packed segment shorter than its declared header".into()));
    }

    let mut entries = Vec::with_capacity(count);
    for i in 0..count {
        let start = 4 + i * 16;
        let file_id = i64::from_be_bytes(plaintext[start..start + 8].try_into().expect("8 bytes"));
        let offset = u32::from_be_bytes(plaintext[start + 8..start + 12].try_into().expect("4 bytes"));
        let length = u32::from_be_bytes(plaintext[start + 12..start + 16].try_into().expect("4 bytes"));
        entries.push(PackEntry { file_id: FileId(file_id), offset, length });
    }

    Ok((entries, &plaintext[header_len..]))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn candidate(path: &str, hash: u8, bytes: &[u8]) -> PackCandidate {
        PackCandidate {
            file_id: FileId(path.len() as i64),
            relative_path: path.to_string(),
            content_hash: [hash; 32],
            plaintext: bytes.to_vec(),
        }
    }

    #[test]
    fn packs_multiple_small_files_into_one_group_when_they_fit() {
        let groups = pack_small_files(
            vec![candidate("b.txt", 1, b"bbb"), candidate("a.txt", 2, b"aa")],
            1000,
            10,
        );
        assert_eq!(groups.len(), 1);
        assert_eq!(groups[0].entries.len(), 2);
        // a.txt sorts first even though it was pushed second.
        let (entries, data) = decode_pack_header(&groups[0].plaintext).unwrap();
        assert_eq!(entries, groups[0].entries);
        assert_eq!(data, b"aabbb");
    }

    #[test]
    fn header_round_trips_through_decode() {
        let groups = pack_small_files(vec![candidate("b.txt", 1, b"bbb"), candidate("a.txt", 2, b"aa")], 1000, 10);
        let (entries, data) = decode_pack_header(&groups[0].plaintext).unwrap();
        for entry in &entries {
            let slice = &data[entry.offset as usize..(entry.offset + entry.length) as usize];
            assert_eq!(slice.len(), entry.length as usize);
        }
    }

    #[test]
    fn splits_into_multiple_groups_when_total_exceeds_payload_max() {
        let groups = pack_small_files(
            vec![candidate("a.txt", 1, &[0u8; 6]), candidate("b.txt", 2, &[0u8; 6])],
            10,
            10,
        );
        assert_eq!(groups.len(), 2);
    }

    #[test]
    fn respects_max_files_per_segment() {
        let groups = pack_small_files(
            vec![candidate("a.txt", 1, b"a"), candidate("b.txt", 2, b"b"), candidate("c.txt", 3, b"c")],
            1000,
            2,
        );
        assert_eq!(groups.len(), 2);
        assert_eq!(groups[0].entries.len(), 2);
        assert_eq!(groups[1].entries.len(), 1);
    }

    #[test]
    fn identical_hash_ties_break_on_lexicographic_path() {
        let groups = pack_small_files(vec![candidate("z.txt", 5, b"zz"), candidate("a.txt", 5, b"aa")], 1000, 10);
        assert_eq!(groups[0].entries[0].file_id, FileId("a.txt".len() as i64));
    }
}
