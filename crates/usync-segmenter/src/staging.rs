use std::path::{Path, PathBuf};

use usync_common::{FileId, FolderUniqueId};

//--------------------------------------------------------------------------------------------------
// Functions
//--------------------------------------------------------------------------------------------------

/// Where a segment's encrypted payload is spooled between segmentation and
/// upload. The uploader reads the same deterministic
/// path, POSTs it, then deletes it; a crash between the two leaves behind
/// an orphaned blob rather than a lost one.
pub fn segment_blob_path(
    staging_root: &Path,
    folder_unique_id: &FolderUniqueId,
    file_id: FileId,
    segment_index: u32,
    redundancy_group: u32,
) -> PathBuf {
    staging_root
        .join(folder_unique_id.to_string())
        .join(format!("{}-{}-{}.ct", file_id.0, segment_index, redundancy_group))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn path_is_a_pure_function_of_its_coordinates() {
        let id = FolderUniqueId::from_bytes([1u8; 16]);
        let a = segment_blob_path(Path::new("/tmp/stage"), &id, FileId(3), 0, 0);
        let b = segment_blob_path(Path::new("/tmp/stage"), &id, FileId(3), 0, 0);
        assert_eq!(a, b);
        assert_ne!(a, segment_blob_path(Path::new("/tmp/stage"), &id, FileId(3), 1, 0));
    }
}
