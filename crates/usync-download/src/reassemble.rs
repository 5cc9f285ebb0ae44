use std::path::Path;
use std::sync::Arc;

use tokio::io::{AsyncSeekExt, AsyncWriteExt};
use tokio::sync::Mutex;
use usync_common::{FileId, FolderUniqueId};
use usync_nntp::ConnectionPool;
use usync_share::{ManifestFile, ManifestSegment};

use crate::checkpoint::Checkpoint;
use crate::error::{DownloadError, Result};
use crate::fetch::fetch_segment_plaintext;

//--------------------------------------------------------------------------------------------------
// Type Definitions
//--------------------------------------------------------------------------------------------------

struct PlannedSegment<'a> {
    segment: &'a ManifestSegment,
    offset: u64,
    expected_len: u64,
}

//--------------------------------------------------------------------------------------------------
// Functions
//--------------------------------------------------------------------------------------------------

/// Works out each segment's byte offset within the reassembled file.
/// A file with exactly one segment may have been packed
/// alongside siblings, in which case its real length is `file.size`
/// rather than the manifest segment's own `size` (which, for a packed
/// entry, is the whole shared group's length), though since there is only
/// ever one such segment, its offset is always zero either way.
fn plan_segments(file: &ManifestFile) -> Vec<PlannedSegment<'_>> {
    let mut offset = 0u64;
    let mut plan = Vec::with_capacity(file.segments.len());
    for segment in &file.segments {
        let expected_len = if file.segment_count == 1 { file.size } else { segment.size };
        plan.push(PlannedSegment { segment, offset, expected_len });
        offset += expected_len;
    }
    plan
}

/// A segment whose decrypted plaintext is larger than the owning file's
/// declared size was packed with other files: unwrap the
/// header and slice out this file's own bytes.
fn extract_packed_slice(plaintext: &[u8], file_id: FileId) -> Result<Vec<u8>> {
    let (entries, data) = usync_segmenter::decode_pack_header(plaintext)?;
    let entry = entries
        .iter()
        .find(|e| e.file_id == file_id)
        .ok_or_else(|| DownloadError::Integrity(format!("packed segment carries no entry for file {file_id:?}")))?;
    Ok(data[entry.offset as usize..(entry.offset + entry.length) as usize].to_vec())
}

/// Fetches and writes every outstanding segment of `file` into its place
/// under `destination`, skipping segments already marked complete in
/// `checkpoint`, then verifies the full-file `content_hash`.
/// `checkpoint` is shared across concurrently-reassembling files, so
/// every mutation is scoped to a short lock hold.
pub async fn reassemble_file(
    pool: &ConnectionPool,
    group: &str,
    folder_unique_id: &FolderUniqueId,
    segment_key: &[u8; 32],
    file: &ManifestFile,
    destination: &Path,
    checkpoint: &Arc<Mutex<Checkpoint>>,
    checkpoint_path: &Path,
) -> Result<()> {
    let path = destination.join(&file.relative_path);
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }

    let mut handle = tokio::fs::OpenOptions::new().create(true).write(true).read(true).open(&path).await?;

    for planned in plan_segments(file) {
        let already_done = checkpoint.lock().await.is_complete(file.file_id, planned.segment.segment_index);
        if already_done {
            continue;
        }

        let plaintext =
            fetch_segment_plaintext(pool, group, folder_unique_id, segment_key, file.file_id, planned.segment).await?;
        let bytes = if file.segment_count == 1 && plaintext.len() as u64 != file.size {
            extract_packed_slice(&plaintext, file.file_id)?
        } else {
            plaintext
        };

        if bytes.len() as u64 != planned.expected_len {
            return Err(DownloadError::Integrity(format!(
                "file {:?} segment {} produced {} bytes, expected {}",
                file.file_id,
                planned.segment.segment_index,
                bytes.len(),
                planned.expected_len
            )));
        }

        handle.seek(std::io::SeekFrom::Start(planned.offset)).await?;
        handle.write_all(&bytes).await?;

        let should_flush = checkpoint.lock().await.mark_complete(file.file_id, planned.segment.segment_index);
        if should_flush {
            checkpoint.lock().await.save(checkpoint_path).await?;
        }
    }

    handle.flush().await?;
    drop(handle);

    let content = tokio::fs::read(&path).await?;
    if usync_crypto::sha256(&content) != file.content_hash {
        return Err(DownloadError::Integrity(format!("content_hash mismatch for {}", file.relative_path)));
    }

    Ok(())
}
