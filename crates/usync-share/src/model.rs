use serde::{Deserialize, Serialize};
use usync_common::{FileId, FolderUniqueId, Timestamp};

//--------------------------------------------------------------------------------------------------
// Type Definitions
//--------------------------------------------------------------------------------------------------

/// One segment of a manifest file entry. For a
/// packed segment this describes the constituent file's own view of the
/// shared article: `message_id`/`usenet_subject` are identical across
/// every sibling in the pack.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ManifestSegment {
    pub segment_index: u32,
    pub plaintext_hash: [u8; 32],
    pub size: u64,
    pub message_id: String,
    pub usenet_subject: String,
    pub redundancy_message_ids: Vec<String>,
}

/// One file entry of a manifest.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ManifestFile {
    pub file_id: FileId,
    pub relative_path: String,
    pub content_hash: [u8; 32],
    pub size: u64,
    pub segment_count: u32,
    pub segments: Vec<ManifestSegment>,
}

/// The decrypted share index: self-contained, so a holder needs
/// no publisher-side query to retrieve and reassemble every file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Manifest {
    pub version: u16,
    pub folder_unique_id: FolderUniqueId,
    pub created_at: Timestamp,
    pub files: Vec<ManifestFile>,
}

/// A manifest plus the folder-key signature over its canonical bytes.
/// This whole structure, serialized, is what gets encrypted
/// into a `Share.encrypted_index`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SignedManifest {
    pub manifest: Manifest,
    pub signature: Vec<u8>,
}
