use data_encoding::{BASE32_NOPAD, HEXLOWER};
use serde::{Deserialize, Serialize};
use std::fmt;

//--------------------------------------------------------------------------------------------------
// Type Definitions
//--------------------------------------------------------------------------------------------------

/// The opaque 128-bit value that is the single cryptographic identifier of
/// a folder: every key derivation, signature, subject, and share id in the
/// system is a function of this value and nothing else.
///
/// `DbFolderId` (a local surrogate row id) and `FolderUniqueId` are
/// deliberately different types with no `From`/`Into` between them, so a
/// caller cannot accidentally pass the wrong one to a cryptographic API.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct FolderUniqueId(#[serde(with = "serde_bytes")] [u8; 16]);

impl FolderUniqueId {
    pub fn from_bytes(bytes: [u8; 16]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; 16] {
        &self.0
    }

    /// First 8 hex characters, used as the short form embedded in
    /// `Message-ID` headers.
    pub fn short_hex(&self) -> String {
        HEXLOWER.encode(&self.0[..4])
    }
}

impl fmt::Display for FolderUniqueId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", HEXLOWER.encode(&self.0))
    }
}

/// A local-only numeric surrogate key for a folder row in [`usync_store`].
/// Never transmitted, never used for key derivation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct DbFolderId(pub i64);

/// Per-folder file identifier, unique within the owning folder only.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct FileId(pub i64);

/// 0-based position of a segment within its file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SegmentIndex(pub u32);

/// Stable identity of a user: SHA-256 of their initial identity material.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct UserId(#[serde(with = "serde_bytes")] [u8; 32]);

impl UserId {
    pub fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", HEXLOWER.encode(&self.0))
    }
}

/// Base32 encoding of a 128-bit HMAC: the only out-of-band identifier a
/// share recipient needs.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ShareId(#[serde(with = "serde_bytes")] [u8; 16]);

impl ShareId {
    pub fn from_bytes(bytes: [u8; 16]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; 16] {
        &self.0
    }
}

impl fmt::Display for ShareId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", BASE32_NOPAD.encode(&self.0))
    }
}

/// The PUBLIC/PRIVATE/PROTECTED access policy of a [`crate::ShareId`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ShareType {
    Public,
    Private,
    Protected,
}

impl ShareType {
    /// Stable one-byte wire tag used in the encrypted index header.
    pub fn wire_tag(self) -> u8 {
        match self {
            ShareType::Public => 0,
            ShareType::Private => 1,
            ShareType::Protected => 2,
        }
    }

    pub fn from_wire_tag(tag: u8) -> Option<Self> {
        match tag {
            0 => Some(ShareType::Public),
            1 => Some(ShareType::Private),
            2 => Some(ShareType::Protected),
            _ => None,
        }
    }
}

/// Where a folder is in the publish pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FolderState {
    Added,
    Indexing,
    Indexed,
    Segmenting,
    Segmented,
    Uploading,
    Uploaded,
    Publishing,
    Published,
    Error,
}

impl FolderState {
    /// Whether `self -> next` is a legal transition of the folder state machine.
    /// `Error` is reachable from any state.
    pub fn can_transition_to(self, next: FolderState) -> bool {
        use FolderState::*;
        if next == Error {
            return true;
        }
        matches!(
            (self, next),
            (Added, Indexing)
                | (Indexing, Indexed)
                | (Indexed, Segmenting)
                | (Segmenting, Segmented)
                | (Segmented, Uploading)
                | (Uploading, Uploaded)
                | (Uploaded, Publishing)
                | (Publishing, Published)
                | (Published, Indexing) // resync
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn folder_unique_id_round_trips_through_display() {
        let id = FolderUniqueId::from_bytes([0xab; 16]);
        assert_eq!(id.short_hex().len(), 8);
        assert_eq!(id.to_string().len(), 32);
    }

    #[test]
    fn share_id_displays_as_base32() {
        let id = ShareId::from_bytes([0u8; 16]);
        // 128 bits / 5 bits-per-base32-char, rounded up = 26 chars.
        assert_eq!(id.to_string().len(), 26);
    }

    #[test]
    fn state_machine_rejects_out_of_order_transitions() {
        assert!(FolderState::Added.can_transition_to(FolderState::Indexing));
        assert!(!FolderState::Added.can_transition_to(FolderState::Segmented));
        assert!(FolderState::Segmented.can_transition_to(FolderState::Error));
    }

    #[test]
    fn folder_unique_id_and_db_folder_id_are_distinct_types() {
        fn wants_unique_id(_: FolderUniqueId) {}
        let _db_id = DbFolderId(42);
        wants_unique_id(FolderUniqueId::from_bytes([0u8; 16]));
        // `wants_unique_id(_db_id)` would not compile: that's the point.
    }
}
