use std::path::{Path, PathBuf};

use usync_common::{FileId, FolderState};
use usync_store::{ContentStore, FileRow, FolderRow, SegmentRow};

use crate::chunker::{packing_threshold, plan_chunks, PAYLOAD_MAX};
use crate::error::{Result, SegmenterError};
use crate::pack::{pack_small_files, PackCandidate, PackedGroup};
use crate::staging::segment_blob_path;

//--------------------------------------------------------------------------------------------------
// Type Definitions
//--------------------------------------------------------------------------------------------------

/// Per-folder segmentation policy: `payload_max`/`redundancy` map
/// directly onto `PAYLOAD_MAX`/`REDUNDANCY`; packing is opt-in.
#[derive(Debug, Clone, Copy)]
pub struct SegmentPolicy {
    pub payload_max: u64,
    pub redundancy: u32,
    pub packing_enabled: bool,
    pub max_packed_files: usize,
}

impl Default for SegmentPolicy {
    fn default() -> Self {
        Self { payload_max: PAYLOAD_MAX, redundancy: 0, packing_enabled: false, max_packed_files: 16 }
    }
}

/// Result of `segment_folder`.
#[derive(Debug, Clone, Copy, Default)]
pub struct SegmentResult {
    pub segments_created: usize,
}

//--------------------------------------------------------------------------------------------------
// Functions
//--------------------------------------------------------------------------------------------------

/// Splits every file of `folder` into fixed-size, encrypted segments, packs
/// qualifying small files together when `policy.packing_enabled`, and
/// generates `policy.redundancy` extra copies of each. Drives the
/// folder through `SEGMENTING -> SEGMENTED`.
pub async fn segment_folder(
    store: &dyn ContentStore,
    folder: &FolderRow,
    policy: SegmentPolicy,
    staging_root: &Path,
) -> Result<SegmentResult> {
    store.transition_folder_state(folder.db_id, FolderState::Segmenting).await?;

    let files = store.list_files(folder.db_id).await?;
    let threshold = packing_threshold(policy.payload_max);

    let mut packable = Vec::new();
    let mut normal = Vec::new();
    for file in files {
        if policy.packing_enabled && file.size <= threshold {
            packable.push(file);
        } else {
            normal.push(file);
        }
    }

    let mut segments_created = 0usize;

    for file in &normal {
        segments_created += segment_single_file(store, folder, file, policy, staging_root).await?;
    }

    if !packable.is_empty() {
        segments_created += segment_packed_files(store, folder, &packable, policy, staging_root).await?;
    }

    store.transition_folder_state(folder.db_id, FolderState::Segmented).await?;
    Ok(SegmentResult { segments_created })
}

async fn write_blob(path: &Path, data: &[u8]) -> Result<()> {
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent)
            .await
            .map_err(|e| SegmenterError::Read { path: parent.display().to_string(), source: e })?;
    }
    tokio::fs::write(path, data)
        .await
        .map_err(|e| SegmenterError::Read { path: path.display().to_string(), source: e })
}

async fn read_file(folder: &FolderRow, file: &FileRow) -> Result<Vec<u8>> {
    let path = Path::new(&folder.root_path).join(&file.relative_path);
    tokio::fs::read(&path).await.map_err(|e| SegmenterError::Read { path: path.display().to_string(), source: e })
}

async fn segment_single_file(
    store: &dyn ContentStore,
    folder: &FolderRow,
    file: &FileRow,
    policy: SegmentPolicy,
    staging_root: &Path,
) -> Result<usize> {
    let content = read_file(folder, file).await?;
    let plans = plan_chunks(file.size, policy.payload_max);
    let key = usync_crypto::segment_content_key(&folder.folder_unique_id);

    let mut created = 0usize;
    for plan in plans {
        let chunk = &content[plan.offset as usize..(plan.offset + plan.length) as usize];
        let plaintext_hash = usync_crypto::sha256(chunk);
        let ciphertext =
            usync_crypto::encrypt_segment(&key, &folder.folder_unique_id, file.file_id, usync_common::SegmentIndex(plan.segment_index), chunk);
        let ciphertext_hash = usync_crypto::sha256(&ciphertext);

        for redundancy_group in 0..=policy.redundancy {
            let blob_path = segment_blob_path(staging_root, &folder.folder_unique_id, file.file_id, plan.segment_index, redundancy_group);
            write_blob(&blob_path, &ciphertext).await?;

            store
                .insert_segment(SegmentRow {
                    folder_db_id: folder.db_id,
                    file_id: file.file_id,
                    segment_index: plan.segment_index,
                    size: plan.length,
                    plaintext_hash,
                    ciphertext_hash: Some(ciphertext_hash),
                    usenet_subject: usync_crypto::obfuscated_subject(),
                    message_id: None,
                    redundancy_group,
                    packed_with: vec![],
                })
                .await?;
            created += 1;
        }
    }
    Ok(created)
}

async fn segment_packed_files(
    store: &dyn ContentStore,
    folder: &FolderRow,
    files: &[FileRow],
    policy: SegmentPolicy,
    staging_root: &Path,
) -> Result<usize> {
    let mut candidates = Vec::with_capacity(files.len());
    for file in files {
        let plaintext = read_file(folder, file).await?;
        candidates.push(PackCandidate {
            file_id: file.file_id,
            relative_path: file.relative_path.clone(),
            content_hash: file.content_hash,
            plaintext,
        });
    }

    let groups = pack_small_files(candidates, policy.payload_max, policy.max_packed_files);
    let key = usync_crypto::segment_content_key(&folder.folder_unique_id);

    let mut created = 0usize;
    for group in &groups {
        for redundancy_group in 0..=policy.redundancy {
            created += insert_packed_group(store, folder, &key, group, redundancy_group, staging_root).await?;
        }
    }
    Ok(created)
}

async fn insert_packed_group(
    store: &dyn ContentStore,
    folder: &FolderRow,
    key: &[u8; 32],
    group: &PackedGroup,
    redundancy_group: u32,
    staging_root: &Path,
) -> Result<usize> {
    // The anchor is the numerically smallest file id in the group, a pure
    // function of its membership so the uploader can recompute it without
    // any extra bookkeeping.
    let anchor_file_id = group.entries.iter().map(|e| e.file_id).min().expect("a packed group is never empty");
    let plaintext_hash = usync_crypto::sha256(&group.plaintext);
    let ciphertext = usync_crypto::encrypt_segment(key, &folder.folder_unique_id, anchor_file_id, usync_common::SegmentIndex(0), &group.plaintext);
    let ciphertext_hash = usync_crypto::sha256(&ciphertext);
    let usenet_subject = usync_crypto::obfuscated_subject();

    let blob_path = segment_blob_path(staging_root, &folder.folder_unique_id, anchor_file_id, 0, redundancy_group);
    write_blob(&blob_path, &ciphertext).await?;

    let sibling_ids: Vec<FileId> = group.entries.iter().map(|e| e.file_id).collect();
    for entry in &group.entries {
        let packed_with: Vec<FileId> = sibling_ids.iter().copied().filter(|id| *id != entry.file_id).collect();
        store
            .insert_segment(SegmentRow {
                folder_db_id: folder.db_id,
                file_id: entry.file_id,
                segment_index: 0,
                size: group.plaintext.len() as u64,
                plaintext_hash,
                ciphertext_hash: Some(ciphertext_hash),
                usenet_subject: usenet_subject.clone(),
                message_id: None,
                redundancy_group,
                packed_with,
            })
            .await?;
    }
    Ok(group.entries.len())
}
