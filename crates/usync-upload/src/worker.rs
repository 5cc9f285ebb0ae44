use std::collections::{HashMap, VecDeque};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use usync_common::{BatchResult, FailedItem, FileId, FolderState};
use usync_nntp::{Article, Backoff, ConnectionPool};
use usync_store::{ContentStore, FolderRow, SegmentRow};

use crate::error::UploadError;
use crate::ratelimit::TokenBucket;

//--------------------------------------------------------------------------------------------------
// Type Definitions
//--------------------------------------------------------------------------------------------------

/// Worker-pool tuning and posting identity.
#[derive(Debug, Clone)]
pub struct UploadPolicy {
    pub workers: usize,
    pub max_attempts: u32,
    pub upload_bps: u64,
    pub from: String,
    pub newsgroups: String,
}

impl Default for UploadPolicy {
    fn default() -> Self {
        Self { workers: 4, max_attempts: 5, upload_bps: 0, from: "usync@invalid".into(), newsgroups: "alt.binaries.usync".into() }
    }
}

/// One physical article worth of work: every constituent row shares a
/// ciphertext blob and `usenet_subject` (packed segments have more than
/// one sibling row).
#[derive(Debug, Clone)]
struct PostGroup {
    segment_index: u32,
    redundancy_group: u32,
    usenet_subject: String,
    members: Vec<SegmentRow>,
    attempt: u32,
}

/// Identifies a completed or failed post for the `{ completed, failed }`
/// result shape batch operations report.
#[derive(Debug, Clone)]
pub struct UploadedSegment {
    pub file_id: FileId,
    pub segment_index: u32,
    pub redundancy_group: u32,
}

pub type UploadResult = BatchResult<UploadedSegment, UploadedSegment>;

//--------------------------------------------------------------------------------------------------
// Functions
//--------------------------------------------------------------------------------------------------

/// The numerically smallest file id in a packed group's membership; a pure
/// function used both to write and to locate the staged ciphertext blob
/// (mirrors `usync_segmenter::segment::insert_packed_group`'s anchor rule).
fn anchor_file_id(row: &SegmentRow) -> FileId {
    row.packed_with.iter().copied().fold(row.file_id, |min, id| if id < min { id } else { min })
}

fn group_pending_segments(rows: Vec<SegmentRow>) -> VecDeque<PostGroup> {
    let mut groups: HashMap<String, PostGroup> = HashMap::new();
    let mut order: Vec<String> = Vec::new();

    for row in rows {
        if row.message_id.is_some() {
            continue;
        }
        match groups.get_mut(&row.usenet_subject) {
            Some(group) => group.members.push(row),
            None => {
                order.push(row.usenet_subject.clone());
                groups.insert(
                    row.usenet_subject.clone(),
                    PostGroup {
                        segment_index: row.segment_index,
                        redundancy_group: row.redundancy_group,
                        usenet_subject: row.usenet_subject.clone(),
                        members: vec![row],
                        attempt: 0,
                    },
                );
            }
        }
    }

    order.into_iter().filter_map(|subject| groups.remove(&subject)).collect()
}

fn staged_blob_path(staging_root: &Path, folder: &FolderRow, group: &PostGroup) -> PathBuf {
    let anchor = anchor_file_id(&group.members[0]);
    usync_segmenter::segment_blob_path(staging_root, &folder.folder_unique_id, anchor, group.segment_index, group.redundancy_group)
}

/// Drains `folder`'s pending segment queue into NNTP. Resumable: a
/// segment with a `message_id` already set is skipped, so re-running after
/// a crash only posts what is still outstanding. `store` is an `Arc` so
/// worker tasks can share it across the pool.
pub async fn upload_folder(
    store: Arc<dyn ContentStore>,
    pool: ConnectionPool,
    folder: FolderRow,
    staging_root: &Path,
    policy: UploadPolicy,
    cancel: CancellationToken,
) -> crate::error::Result<UploadResult> {
    match folder.state {
        FolderState::Segmented => store.transition_folder_state(folder.db_id, FolderState::Uploading).await?,
        FolderState::Uploading => {}
        other => return Err(UploadError::Validation(format!("folder must be SEGMENTED or UPLOADING to upload, was {other:?}"))),
    }

    let pending = store.list_segments_for_folder(folder.db_id).await?;
    let queue = Arc::new(Mutex::new(group_pending_segments(pending)));
    let bucket = Arc::new(TokenBucket::new(policy.upload_bps));
    let result = Arc::new(Mutex::new(UploadResult::default()));
    let error_seen = Arc::new(AtomicBool::new(false));

    let mut handles = Vec::with_capacity(policy.workers.max(1));
    for _ in 0..policy.workers.max(1) {
        let store = store.clone();
        let pool = pool.clone();
        let folder = folder.clone();
        let staging_root = staging_root.to_path_buf();
        let policy = policy.clone();
        let queue = queue.clone();
        let bucket = bucket.clone();
        let result = result.clone();
        let cancel = cancel.clone();
        let error_seen = error_seen.clone();

        handles.push(tokio::spawn(async move {
            run_worker(store, pool, folder, staging_root, policy, queue, bucket, result, cancel, error_seen).await;
        }));
    }

    for handle in handles {
        let _ = handle.await;
    }

    let final_result = Arc::try_unwrap(result).expect("all workers joined before this point").into_inner();
    if !error_seen.load(Ordering::SeqCst) && !cancel.is_cancelled() {
        let reloaded = store.get_folder(folder.db_id).await?.ok_or_else(|| UploadError::Validation("folder vanished mid-upload".into()))?;
        if reloaded.state == FolderState::Uploading {
            store.transition_folder_state(folder.db_id, FolderState::Uploaded).await?;
        }
    }
    Ok(final_result)
}

#[allow(clippy::too_many_arguments)]
async fn run_worker(
    store: Arc<dyn ContentStore>,
    pool: ConnectionPool,
    folder: FolderRow,
    staging_root: PathBuf,
    policy: UploadPolicy,
    queue: Arc<Mutex<VecDeque<PostGroup>>>,
    bucket: Arc<TokenBucket>,
    result: Arc<Mutex<UploadResult>>,
    cancel: CancellationToken,
    error_seen: Arc<AtomicBool>,
) {
    let backoff = Backoff::default();

    loop {
        if cancel.is_cancelled() {
            return;
        }
        let group = {
            let mut queue = queue.lock().await;
            queue.pop_front()
        };
        let Some(mut group) = group else { return };

        match post_group(&store, &pool, &folder, &staging_root, &policy, &bucket, &group).await {
            Ok(()) => {
                let mut result = result.lock().await;
                for member in &group.members {
                    result.completed.push(UploadedSegment { file_id: member.file_id, segment_index: member.segment_index, redundancy_group: member.redundancy_group });
                }
            }
            Err(err) if err.is_transient() && group.attempt + 1 < policy.max_attempts => {
                group.attempt += 1;
                tokio::time::sleep(backoff.delay_for(group.attempt - 1)).await;
                queue.lock().await.push_back(group);
            }
            Err(err) => {
                tracing::warn!(subject = %group.usenet_subject, error = %err, "segment permanently failed to upload");
                error_seen.store(true, Ordering::SeqCst);
                let _ = store.transition_folder_state(folder.db_id, FolderState::Error).await;
                let usync_err: usync_common::UsyncError = err.into();
                let mut result = result.lock().await;
                for member in &group.members {
                    result.failed.push(FailedItem::new(
                        UploadedSegment { file_id: member.file_id, segment_index: member.segment_index, redundancy_group: member.redundancy_group },
                        &usync_err,
                    ));
                }
                return;
            }
        }
    }
}

async fn post_group(
    store: &Arc<dyn ContentStore>,
    pool: &ConnectionPool,
    folder: &FolderRow,
    staging_root: &Path,
    policy: &UploadPolicy,
    bucket: &TokenBucket,
    group: &PostGroup,
) -> std::result::Result<(), PostError> {
    let blob_path = staged_blob_path(staging_root, folder, group);
    let ciphertext = tokio::fs::read(&blob_path).await.map_err(PostError::Io)?;
    bucket.consume(ciphertext.len() as u64).await;

    let body = usync_nntp::yenc::encode(&ciphertext);
    // A fresh subject is minted per POST attempt, not reused from
    // segmentation time, and persisted alongside the message id below.
    let subject = usync_crypto::obfuscated_subject();
    let message_id = format!("<{}@{}>", Uuid::new_v4(), folder.folder_unique_id.short_hex());
    let article = Article { from: policy.from.clone(), newsgroups: policy.newsgroups.clone(), subject: subject.clone(), message_id: message_id.clone(), body };

    let mut conn = pool.acquire().await.map_err(PostError::Nntp)?;
    match conn.post(&article).await {
        Ok(()) => {}
        Err(e) => {
            let transient = e.is_transient();
            conn.discard();
            return Err(if transient { PostError::Nntp(e) } else { PostError::Permanent(e) });
        }
    }

    let ciphertext_hash = usync_crypto::sha256(&ciphertext);
    for member in &group.members {
        store
            .update_segment_post_result(
                folder.db_id,
                member.file_id,
                member.segment_index,
                member.redundancy_group,
                message_id.clone(),
                subject.clone(),
                ciphertext_hash,
            )
            .await
            .map_err(PostError::Store)?;
    }
    let _ = tokio::fs::remove_file(&blob_path).await;
    Ok(())
}

/// Internal to `post_group`: distinguishes retryable failures from
/// permanent ones before `run_worker` decides whether to requeue.
#[derive(Debug, thiserror::Error)]
enum PostError {
    #[error("io error reading staged ciphertext: {0}")]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Nntp(usync_nntp::NntpError),
    #[error(transparent)]
    Permanent(usync_nntp::NntpError),
    #[error(transparent)]
    Store(usync_store::StoreError),
}

impl PostError {
    fn is_transient(&self) -> bool {
        matches!(self, PostError::Io(_) | PostError::Nntp(_))
    }
}

impl From<PostError> for usync_common::UsyncError {
    fn from(err: PostError) -> Self {
        match err {
            PostError::Io(e) => usync_common::UsyncError::Io(e),
            PostError::Nntp(e) => e.into(),
            PostError::Permanent(e) => e.into(),
            PostError::Store(e) => e.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
    use tokio::net::TcpListener;
    use usync_nntp::NntpConfig;
    use usync_segmenter::SegmentPolicy;
    use usync_store::{NewFile, SqliteStore};

    /// A minimal NNTP server: greets once per connection, accepts any
    /// number of `POST`s in sequence, confirms every one with `240`.
    async fn run_fake_server(listener: TcpListener) {
        loop {
            let Ok((socket, _)) = listener.accept().await else { return };
            tokio::spawn(async move {
                let (read_half, mut write_half) = tokio::io::split(socket);
                let mut reader = BufReader::new(read_half);
                if write_half.write_all(b"200 welcome\r\n").await.is_err() {
                    return;
                }
                let mut line = String::new();
                loop {
                    line.clear();
                    let Ok(n) = reader.read_line(&mut line).await else { return };
                    if n == 0 {
                        return;
                    }
                    if line.trim_end() == "POST" {
                        if write_half.write_all(b"340 send article\r\n").await.is_err() {
                            return;
                        }
                        loop {
                            line.clear();
                            let Ok(n) = reader.read_line(&mut line).await else { return };
                            if n == 0 {
                                return;
                            }
                            if line.trim_end() == "." {
                                break;
                            }
                        }
                        if write_half.write_all(b"240 posted ok\r\n").await.is_err() {
                            return;
                        }
                    }
                }
            });
        }
    }

    #[tokio::test]
    async fn uploads_every_pending_segment_and_marks_folder_uploaded() {
        let store = SqliteStore::open_in_memory().unwrap();
        let user = store.create_user("alice", [1u8; 32]).await.unwrap();
        let dir = tempfile::tempdir().unwrap();
        let content = vec![9u8; 10_000];
        std::fs::write(dir.path().join("a.bin"), &content).unwrap();
        let folder = store.create_folder(dir.path().to_str().unwrap(), &user.user_id).await.unwrap();
        store.transition_folder_state(folder.db_id, FolderState::Indexing).await.unwrap();
        store
            .upsert_file(folder.db_id, NewFile { relative_path: "a.bin".into(), size: content.len() as u64, content_hash: usync_crypto::sha256(&content) })
            .await
            .unwrap();
        store.transition_folder_state(folder.db_id, FolderState::Indexed).await.unwrap();
        let folder = store.get_folder(folder.db_id).await.unwrap().unwrap();

        let staging = tempfile::tempdir().unwrap();
        usync_segmenter::segment_folder(&store, &folder, SegmentPolicy::default(), staging.path()).await.unwrap();
        let folder = store.get_folder(folder.db_id).await.unwrap().unwrap();
        assert_eq!(folder.state, FolderState::Segmented);

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(run_fake_server(listener));

        let pool = ConnectionPool::new(NntpConfig {
            host: addr.ip().to_string(),
            port: addr.port(),
            ssl: false,
            username: String::new(),
            password: String::new(),
            max_connections: 2,
            idle_max: Duration::from_secs(60),
            acquire_timeout: Duration::from_secs(5),
        });

        let store: Arc<dyn ContentStore> = Arc::new(store);
        let result = upload_folder(
            store.clone(),
            pool,
            folder.clone(),
            staging.path(),
            UploadPolicy { workers: 1, ..Default::default() },
            CancellationToken::new(),
        )
        .await
        .unwrap();

        assert_eq!(result.completed.len(), 1);
        assert!(result.failed.is_empty());

        let reloaded = store.get_folder(folder.db_id).await.unwrap().unwrap();
        assert_eq!(reloaded.state, FolderState::Uploaded);

        let segments = store.list_segments_for_folder(folder.db_id).await.unwrap();
        assert!(segments[0].message_id.is_some());
    }
}
