use serde::{Deserialize, Serialize};
use usync_common::{DbFolderId, FileId, FolderState, FolderUniqueId, ShareId, ShareType, Timestamp, UserId};

//--------------------------------------------------------------------------------------------------
// Type Definitions
//--------------------------------------------------------------------------------------------------

/// A `Users` row.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserRow {
    pub user_id: UserId,
    pub display_name: String,
    pub public_key: [u8; 32],
    pub created_at: Timestamp,
}

/// A `Folders` row. `db_id` never leaves the host; `folder_unique_id`
/// is the only identifier any other component is allowed to derive keys
/// or signatures from.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FolderRow {
    pub db_id: DbFolderId,
    pub folder_unique_id: FolderUniqueId,
    pub owner_id: UserId,
    pub root_path: String,
    pub state: FolderState,
    pub created_at: Timestamp,
}

/// A `Files` row.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileRow {
    pub file_id: FileId,
    pub folder_db_id: DbFolderId,
    pub relative_path: String,
    pub size: u64,
    pub content_hash: [u8; 32],
    pub segment_count: u32,
    pub version: u32,
}

/// A `Segments` row.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SegmentRow {
    pub folder_db_id: DbFolderId,
    pub file_id: FileId,
    pub segment_index: u32,
    pub size: u64,
    pub plaintext_hash: [u8; 32],
    pub ciphertext_hash: Option<[u8; 32]>,
    pub usenet_subject: String,
    pub message_id: Option<String>,
    pub redundancy_group: u32,
    pub packed_with: Vec<FileId>,
}

/// A `Shares` row.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShareRow {
    pub share_id: ShareId,
    pub folder_db_id: DbFolderId,
    pub share_type: ShareType,
    pub encrypted_index: Vec<u8>,
    pub owner_id: UserId,
    pub created_at: Timestamp,
    pub expires_at: Option<Timestamp>,
}

/// An `AccessGrants` row (PRIVATE shares only). Only the
/// commitment is stored; the authorized user's identity is never
/// persisted in the clear. `wrapped_key` is the PRIVATE share's content
/// key, ECIES-wrapped to this grant's authorized user.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccessGrantRow {
    pub share_id: ShareId,
    pub commitment: [u8; 32],
    pub wrapped_key: Vec<u8>,
}

/// New-row input for [`crate::ContentStore::upsert_file`]: the scanner
/// supplies everything but the store-assigned `file_id`/`version`.
#[derive(Debug, Clone)]
pub struct NewFile {
    pub relative_path: String,
    pub size: u64,
    pub content_hash: [u8; 32],
}

/// Outcome of [`crate::ContentStore::upsert_file`]: whether the row
/// was freshly inserted, version-bumped, or left untouched.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpsertOutcome {
    Inserted,
    VersionBumped,
    Unchanged,
}
