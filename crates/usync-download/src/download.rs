use std::path::{Path, PathBuf};
use std::sync::Arc;

use tokio::sync::{Mutex, Semaphore};
use usync_common::{BatchResult, FailedItem, FileId, FolderUniqueId, ShareId, UsyncError};
use usync_nntp::ConnectionPool;
use usync_share::{unlock_manifest, UnlockRequest};

use crate::checkpoint::Checkpoint;
use crate::error::Result;
use crate::reassemble::reassemble_file;

//--------------------------------------------------------------------------------------------------
// Type Definitions
//--------------------------------------------------------------------------------------------------

/// Runtime knobs for one `download_share` call.
#[derive(Debug, Clone)]
pub struct DownloadPolicy {
    /// Bounds how many files are fetched concurrently (`N_DOWNLOAD`).
    pub parallel_fetches: usize,
    pub newsgroup: String,
    pub checkpoint_path: PathBuf,
}

/// One file's identity in a [`DownloadResult`].
#[derive(Debug, Clone)]
pub struct DownloadedFile {
    pub file_id: FileId,
    pub relative_path: String,
}

pub type DownloadResult = BatchResult<DownloadedFile, DownloadedFile>;

//--------------------------------------------------------------------------------------------------
// Functions
//--------------------------------------------------------------------------------------------------

/// Unlocks a share's index, then fetches, verifies and reassembles every
/// file it names under `destination`, preserving `relative_path`.
/// Files are fetched with up to `policy.parallel_fetches` in flight at
/// once; writes within one file are always sequential. A file that fails
/// after exhausting every redundancy copy is recorded in
/// `DownloadResult::failed` rather than aborting the whole share.
pub async fn download_share(
    encrypted_index: &[u8],
    folder_unique_id: &FolderUniqueId,
    share_id: &ShareId,
    unlock: UnlockRequest,
    pool: ConnectionPool,
    destination: &Path,
    policy: DownloadPolicy,
) -> Result<DownloadResult> {
    let manifest = unlock_manifest(encrypted_index, folder_unique_id, share_id, unlock)?;
    let segment_key = usync_crypto::segment_content_key(folder_unique_id);
    let checkpoint = Arc::new(Mutex::new(Checkpoint::load(&policy.checkpoint_path).await));

    let semaphore = Arc::new(Semaphore::new(policy.parallel_fetches.max(1)));
    let folder_unique_id = *folder_unique_id;
    let mut handles = Vec::with_capacity(manifest.files.len());

    for file in manifest.files.clone() {
        let pool = pool.clone();
        let group = policy.newsgroup.clone();
        let destination = destination.to_path_buf();
        let checkpoint = checkpoint.clone();
        let checkpoint_path = policy.checkpoint_path.clone();
        let semaphore = semaphore.clone();
        let segment_key = segment_key;

        handles.push(tokio::spawn(async move {
            let _permit = semaphore.acquire_owned().await.expect("semaphore is never closed");
            let outcome =
                reassemble_file(&pool, &group, &folder_unique_id, &segment_key, &file, &destination, &checkpoint, &checkpoint_path)
                    .await;
            (file, outcome)
        }));
    }

    // Persist whatever progress was made even if some files ultimately fail.
    let mut result = DownloadResult::default();
    for handle in handles {
        let (file, outcome) = handle.await.expect("reassembly task never panics");
        let descriptor = DownloadedFile { file_id: file.file_id, relative_path: file.relative_path };
        match outcome {
            Ok(()) => result.completed.push(descriptor),
            Err(err) => {
                let usync_err: UsyncError = err.into();
                result.failed.push(FailedItem::new(descriptor, &usync_err));
            }
        }
    }

    checkpoint.lock().await.save(&policy.checkpoint_path).await?;
    Ok(result)
}
