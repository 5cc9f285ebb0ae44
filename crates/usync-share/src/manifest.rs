use std::collections::BTreeMap;

use usync_common::{now, DbFolderId};
use usync_store::{ContentStore, FileRow, SegmentRow};

use crate::error::{Result, ShareError};
use crate::model::{Manifest, ManifestFile, ManifestSegment};

//--------------------------------------------------------------------------------------------------
// Functions
//--------------------------------------------------------------------------------------------------

/// Assembles the decrypted [`Manifest`] for an UPLOADED folder from the
/// store. Every segment must already carry
/// a `message_id`, since the publisher only calls this once the folder has
/// transitioned past `Uploaded`, so a missing one means the upload state
/// machine lied and is treated as a validation failure rather than silently
/// skipped.
pub async fn build_manifest(
    store: &dyn ContentStore,
    folder_db_id: DbFolderId,
    folder_unique_id: usync_common::FolderUniqueId,
) -> Result<Manifest> {
    let files = store.list_files(folder_db_id).await?;
    let mut manifest_files = Vec::with_capacity(files.len());

    for file in &files {
        let segments = store.list_segments_for_file(folder_db_id, file.file_id).await?;
        manifest_files.push(build_manifest_file(file, segments)?);
    }

    Ok(Manifest { version: 1, folder_unique_id, created_at: now(), files: manifest_files })
}

fn build_manifest_file(file: &FileRow, segments: Vec<SegmentRow>) -> Result<ManifestFile> {
    let mut by_index: BTreeMap<u32, Vec<SegmentRow>> = BTreeMap::new();
    for segment in segments {
        by_index.entry(segment.segment_index).or_default().push(segment);
    }

    let mut manifest_segments = Vec::with_capacity(by_index.len());
    for (segment_index, mut group) in by_index {
        group.sort_by_key(|s| s.redundancy_group);
        let primary = group.first().ok_or_else(|| {
            ShareError::Validation(format!("file {:?} segment {segment_index} has no rows", file.file_id))
        })?;
        if primary.redundancy_group != 0 {
            return Err(ShareError::Validation(format!(
                "file {:?} segment {segment_index} is missing its primary (redundancy_group 0) copy",
                file.file_id
            )));
        }

        let message_id = primary.message_id.clone().ok_or_else(|| {
            ShareError::Validation(format!(
                "file {:?} segment {segment_index} has no message_id; folder is not fully uploaded",
                file.file_id
            ))
        })?;

        let redundancy_message_ids = group[1..]
            .iter()
            .map(|s| {
                s.message_id.clone().ok_or_else(|| {
                    ShareError::Validation(format!(
                        "file {:?} segment {segment_index} redundancy copy {} has no message_id",
                        file.file_id, s.redundancy_group
                    ))
                })
            })
            .collect::<Result<Vec<_>>>()?;

        manifest_segments.push(ManifestSegment {
            segment_index,
            plaintext_hash: primary.plaintext_hash,
            size: primary.size,
            message_id,
            usenet_subject: primary.usenet_subject.clone(),
            redundancy_message_ids,
        });
    }

    Ok(ManifestFile {
        file_id: file.file_id,
        relative_path: file.relative_path.clone(),
        content_hash: file.content_hash,
        size: file.size,
        segment_count: file.segment_count,
        segments: manifest_segments,
    })
}
