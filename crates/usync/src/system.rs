use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use usync_common::{Config, DbFolderId, FolderState, FolderUniqueId, Result, ShareId, ShareType, UserId, UsyncError};
use usync_download::{DownloadPolicy, DownloadResult};
use usync_nntp::{ConnectionPool, NntpConfig};
use usync_scanner::IndexResult;
use usync_segmenter::{SegmentPolicy, SegmentResult};
use usync_share::{PublishRequest, UnlockRequest};
use usync_store::{ContentStore, FolderRow, SqliteStore, UserRow};
use usync_upload::{UploadPolicy, UploadResult};

//--------------------------------------------------------------------------------------------------
// Type Definitions
//--------------------------------------------------------------------------------------------------

/// The single entry point wiring every component crate together. Holds the
/// store and the NNTP connection pool so a caller
/// (the CLI, a long-running daemon) only opens each once per process.
pub struct System {
    store: Arc<dyn ContentStore>,
    pool: ConnectionPool,
    staging_root: PathBuf,
    newsgroup: String,
}

//--------------------------------------------------------------------------------------------------
// Implementation
//--------------------------------------------------------------------------------------------------

impl System {
    /// Opens (creating if absent) the SQLite store at `config.database_path`
    /// and starts the NNTP pool's idle reaper. Staging blobs are written
    /// under a `staging/` directory next to the database file.
    pub fn open(config: &Config) -> Result<Self> {
        let store: Arc<dyn ContentStore> = Arc::new(SqliteStore::open(&config.database_path)?);
        let pool = ConnectionPool::new(NntpConfig {
            host: config.nntp_host.clone(),
            port: config.nntp_port,
            ssl: config.nntp_ssl,
            username: config.nntp_username.clone(),
            password: config.nntp_password.clone(),
            max_connections: config.max_connections,
            idle_max: Duration::from_secs(60),
            acquire_timeout: Duration::from_secs(30),
        });
        pool.spawn_idle_reaper();

        let staging_root = config.database_path.parent().map(Path::to_path_buf).unwrap_or_default().join("staging");

        Ok(Self { store, pool, staging_root, newsgroup: config.nntp_group.clone() })
    }

    /// Builds a `System` around an already-open store and pool, for tests
    /// and for embedding inside another process.
    pub fn with_store_and_pool(store: Arc<dyn ContentStore>, pool: ConnectionPool, staging_root: PathBuf, newsgroup: String) -> Self {
        Self { store, pool, staging_root, newsgroup }
    }

    pub async fn initialize_user(&self, display_name: &str, public_key: [u8; 32]) -> Result<UserRow> {
        Ok(self.store.create_user(display_name, public_key).await?)
    }

    pub async fn add_folder(&self, root_path: &str, owner_id: &UserId) -> Result<FolderRow> {
        Ok(self.store.create_folder(root_path, owner_id).await?)
    }

    /// Walks and diffs a folder's contents against the store.
    /// Valid from `ADDED` or, for a resync, from `PUBLISHED`.
    pub async fn index_folder(&self, folder: &FolderRow) -> Result<IndexResult> {
        Ok(usync_scanner::index_folder(self.store.as_ref(), folder).await?)
    }

    /// Re-enters the pipeline for a folder that has already been
    /// published once (resync, `PUBLISHED -> INDEXING`).
    pub async fn resync_folder(&self, folder: &FolderRow) -> Result<IndexResult> {
        if folder.state != FolderState::Published {
            return Err(UsyncError::Validation(format!("folder must be Published to resync, was {:?}", folder.state)));
        }
        self.index_folder(folder).await
    }

    pub async fn segment_folder(&self, folder: &FolderRow, policy: SegmentPolicy) -> Result<SegmentResult> {
        Ok(usync_segmenter::segment_folder(self.store.as_ref(), folder, policy, &self.staging_root).await?)
    }

    pub async fn upload_folder(&self, folder: FolderRow, policy: UploadPolicy, cancel: CancellationToken) -> Result<UploadResult> {
        Ok(usync_upload::upload_folder(self.store.clone(), self.pool.clone(), folder, &self.staging_root, policy, cancel).await?)
    }

    pub async fn publish_folder(
        &self,
        folder_db_id: DbFolderId,
        owner_id: &UserId,
        owner_signing_key: &[u8],
        share_type: ShareType,
        request: PublishRequest,
    ) -> Result<ShareId> {
        Ok(usync_share::publish_share(self.store.as_ref(), folder_db_id, owner_id, owner_signing_key, share_type, request).await?)
    }

    /// Resolves `share_id`'s encrypted index and reassembles every file it
    /// names under `destination`.
    pub async fn download_share(
        &self,
        share_id: &ShareId,
        folder_unique_id: &FolderUniqueId,
        unlock: UnlockRequest,
        destination: &Path,
        checkpoint_path: PathBuf,
        parallel_fetches: usize,
    ) -> Result<DownloadResult> {
        let share = self
            .store
            .get_share(share_id)
            .await?
            .ok_or_else(|| UsyncError::NotFound(format!("share {share_id}")))?;

        let policy = DownloadPolicy { parallel_fetches, newsgroup: self.newsgroup.clone(), checkpoint_path };
        Ok(usync_download::download_share(&share.encrypted_index, folder_unique_id, share_id, unlock, self.pool.clone(), destination, policy).await?)
    }

    pub async fn list_folders(&self) -> Result<Vec<FolderRow>> {
        Ok(self.store.list_folders().await?)
    }

    pub async fn get_folder(&self, db_id: DbFolderId) -> Result<Option<FolderRow>> {
        Ok(self.store.get_folder(db_id).await?)
    }

    pub async fn delete_folder(&self, db_id: DbFolderId) -> Result<()> {
        Ok(self.store.delete_folder(db_id).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use usync_nntp::NntpConfig;
    use usync_store::SqliteStore;

    fn test_system() -> System {
        let store: Arc<dyn ContentStore> = Arc::new(SqliteStore::open_in_memory().unwrap());
        let pool = ConnectionPool::new(NntpConfig { max_connections: 1, ..Default::default() });
        System::with_store_and_pool(store, pool, PathBuf::from("/tmp/usync-test-staging"), "alt.binaries.usync".into())
    }

    #[tokio::test]
    async fn add_folder_starts_in_added_state() {
        let system = test_system();
        let user = system.initialize_user("alice", [1u8; 32]).await.unwrap();
        let folder = system.add_folder("/home/alice/docs", &user.user_id).await.unwrap();
        assert_eq!(folder.state, FolderState::Added);
    }

    #[tokio::test]
    async fn resync_rejects_a_folder_that_was_never_published() {
        let system = test_system();
        let user = system.initialize_user("alice", [1u8; 32]).await.unwrap();
        let folder = system.add_folder("/home/alice/docs", &user.user_id).await.unwrap();
        assert!(system.resync_folder(&folder).await.is_err());
    }
}
