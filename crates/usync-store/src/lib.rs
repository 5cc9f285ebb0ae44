//! The transactional content store.
//!
//! [`ContentStore`] is the one mutation point shared between workers;
//! every other component reaches the database only through this trait, the
//! way [`wnfs_common::BlockStore`] is the sole seam between the private
//! filesystem layer and its backing storage.

mod error;
mod ids;
mod model;
mod retry;
mod schema;
mod sqlite;

pub use error::{Result, StoreError};
pub use model::{AccessGrantRow, FileRow, FolderRow, NewFile, SegmentRow, ShareRow, UpsertOutcome, UserRow};
pub use sqlite::SqliteStore;

use async_trait::async_trait;
use usync_common::{DbFolderId, FileId, FolderState, FolderUniqueId, ShareId, UserId};

/// Durable storage for folders, files, segments, shares, users and access
/// grants. Implementations must serialize per-folder mutations
/// (e.g. via SQLite's own locking, as [`SqliteStore`] does) and retry
/// transient contention internally rather than surfacing it to callers.
#[async_trait]
pub trait ContentStore: Send + Sync {
    async fn create_user(&self, display_name: &str, public_key: [u8; 32]) -> Result<UserRow>;
    async fn get_user(&self, user_id: &UserId) -> Result<Option<UserRow>>;

    async fn create_folder(&self, root_path: &str, owner_id: &UserId) -> Result<FolderRow>;
    async fn get_folder(&self, db_id: DbFolderId) -> Result<Option<FolderRow>>;
    async fn get_folder_by_unique_id(&self, id: &FolderUniqueId) -> Result<Option<FolderRow>>;
    async fn list_folders(&self) -> Result<Vec<FolderRow>>;
    async fn transition_folder_state(&self, db_id: DbFolderId, next: FolderState) -> Result<()>;
    async fn delete_folder(&self, db_id: DbFolderId) -> Result<()>;

    async fn upsert_file(&self, folder_db_id: DbFolderId, new_file: NewFile) -> Result<(FileRow, UpsertOutcome)>;
    async fn list_files(&self, folder_db_id: DbFolderId) -> Result<Vec<FileRow>>;
    async fn get_file(&self, folder_db_id: DbFolderId, file_id: FileId) -> Result<Option<FileRow>>;

    async fn insert_segment(&self, segment: SegmentRow) -> Result<()>;
    async fn update_segment_post_result(
        &self,
        folder_db_id: DbFolderId,
        file_id: FileId,
        segment_index: u32,
        redundancy_group: u32,
        message_id: String,
        usenet_subject: String,
        ciphertext_hash: [u8; 32],
    ) -> Result<()>;
    async fn list_segments_for_file(&self, folder_db_id: DbFolderId, file_id: FileId) -> Result<Vec<SegmentRow>>;
    async fn list_segments_for_folder(&self, folder_db_id: DbFolderId) -> Result<Vec<SegmentRow>>;

    async fn create_share(&self, share: ShareRow) -> Result<()>;
    async fn get_share(&self, share_id: &ShareId) -> Result<Option<ShareRow>>;

    async fn insert_access_grant(&self, grant: AccessGrantRow) -> Result<()>;
    async fn list_access_grants(&self, share_id: &ShareId) -> Result<Vec<AccessGrantRow>>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use usync_common::ShareType;

    async fn store() -> SqliteStore {
        SqliteStore::open_in_memory().unwrap()
    }

    #[tokio::test]
    async fn create_and_fetch_folder_round_trips() {
        let store = store().await;
        let user = store.create_user("alice", [1u8; 32]).await.unwrap();
        let folder = store.create_folder("/home/alice/docs", &user.user_id).await.unwrap();

        let fetched = store.get_folder_by_unique_id(&folder.folder_unique_id).await.unwrap().unwrap();
        assert_eq!(fetched.db_id, folder.db_id);
        assert_eq!(fetched.state, FolderState::Added);
    }

    #[tokio::test]
    async fn duplicate_root_path_is_a_conflict() {
        let store = store().await;
        let user = store.create_user("alice", [1u8; 32]).await.unwrap();
        store.create_folder("/home/alice/docs", &user.user_id).await.unwrap();

        let err = store.create_folder("/home/alice/docs", &user.user_id).await.unwrap_err();
        assert!(matches!(err, StoreError::Conflict(_)));
    }

    #[tokio::test]
    async fn folder_state_machine_rejects_illegal_jumps() {
        let store = store().await;
        let user = store.create_user("alice", [1u8; 32]).await.unwrap();
        let folder = store.create_folder("/home/alice/docs", &user.user_id).await.unwrap();

        let err = store.transition_folder_state(folder.db_id, FolderState::Segmented).await.unwrap_err();
        assert!(matches!(err, StoreError::Conflict(_)));

        store.transition_folder_state(folder.db_id, FolderState::Indexing).await.unwrap();
        let reloaded = store.get_folder(folder.db_id).await.unwrap().unwrap();
        assert_eq!(reloaded.state, FolderState::Indexing);
    }

    #[tokio::test]
    async fn upsert_file_detects_insert_unchanged_and_version_bump() {
        let store = store().await;
        let user = store.create_user("alice", [1u8; 32]).await.unwrap();
        let folder = store.create_folder("/home/alice/docs", &user.user_id).await.unwrap();

        let (file, outcome) = store
            .upsert_file(folder.db_id, NewFile { relative_path: "a.txt".into(), size: 10, content_hash: [1u8; 32] })
            .await
            .unwrap();
        assert_eq!(outcome, UpsertOutcome::Inserted);
        assert_eq!(file.version, 1);

        let (file, outcome) = store
            .upsert_file(folder.db_id, NewFile { relative_path: "a.txt".into(), size: 10, content_hash: [1u8; 32] })
            .await
            .unwrap();
        assert_eq!(outcome, UpsertOutcome::Unchanged);
        assert_eq!(file.version, 1);

        let (file, outcome) = store
            .upsert_file(folder.db_id, NewFile { relative_path: "a.txt".into(), size: 11, content_hash: [2u8; 32] })
            .await
            .unwrap();
        assert_eq!(outcome, UpsertOutcome::VersionBumped);
        assert_eq!(file.version, 2);
    }

    #[tokio::test]
    async fn segments_round_trip_and_post_result_updates() {
        let store = store().await;
        let user = store.create_user("alice", [1u8; 32]).await.unwrap();
        let folder = store.create_folder("/home/alice/docs", &user.user_id).await.unwrap();
        let (file, _) = store
            .upsert_file(folder.db_id, NewFile { relative_path: "a.txt".into(), size: 10, content_hash: [1u8; 32] })
            .await
            .unwrap();

        store
            .insert_segment(SegmentRow {
                folder_db_id: folder.db_id,
                file_id: file.file_id,
                segment_index: 0,
                size: 10,
                plaintext_hash: [3u8; 32],
                ciphertext_hash: None,
                usenet_subject: "abcdefghijklmnopqrst".into(),
                message_id: None,
                redundancy_group: 0,
                packed_with: vec![],
            })
            .await
            .unwrap();

        store
            .update_segment_post_result(folder.db_id, file.file_id, 0, 0, "<abc@host>".into(), "refreshed-subject".into(), [4u8; 32])
            .await
            .unwrap();

        let segments = store.list_segments_for_file(folder.db_id, file.file_id).await.unwrap();
        assert_eq!(segments.len(), 1);
        assert_eq!(segments[0].message_id.as_deref(), Some("<abc@host>"));
    }

    #[tokio::test]
    async fn share_and_access_grant_round_trip() {
        let store = store().await;
        let user = store.create_user("alice", [1u8; 32]).await.unwrap();
        let folder = store.create_folder("/home/alice/docs", &user.user_id).await.unwrap();

        let share_id = usync_common::ShareId::from_bytes([9u8; 16]);
        store
            .create_share(ShareRow {
                share_id: share_id.clone(),
                folder_db_id: folder.db_id,
                share_type: ShareType::Private,
                encrypted_index: vec![1, 2, 3],
                owner_id: user.user_id.clone(),
                created_at: usync_common::now(),
                expires_at: None,
            })
            .await
            .unwrap();

        store
            .insert_access_grant(AccessGrantRow { share_id: share_id.clone(), commitment: [7u8; 32], wrapped_key: vec![1, 2, 3, 4] })
            .await
            .unwrap();

        let fetched = store.get_share(&share_id).await.unwrap().unwrap();
        assert_eq!(fetched.encrypted_index, vec![1, 2, 3]);

        let grants = store.list_access_grants(&share_id).await.unwrap();
        assert_eq!(grants.len(), 1);
        assert_eq!(grants[0].commitment, [7u8; 32]);
    }
}
