use std::collections::{HashMap, HashSet};
use std::path::Path;

use serde::{Deserialize, Serialize};
use usync_common::FileId;

use crate::error::{DownloadError, Result};

/// How many newly-completed segments accumulate before the sidecar is
/// flushed to disk.
const CKPT_INTERVAL: u32 = 8;

/// Tracks which segments of which files have already been fetched,
/// decrypted, verified and written to their place in the destination file.
/// Stores only a completion bitmap, not bytes: the already-written bytes
/// live in the destination file itself at the byte offsets computed from
/// the manifest, so a resumed download can skip straight past them.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Checkpoint {
    completed: HashMap<FileId, HashSet<u32>>,

    #[serde(skip)]
    dirty_count: u32,
}

impl Checkpoint {
    /// Loads the sidecar at `path`, or an empty checkpoint if it does not
    /// exist or fails to parse (a missing checkpoint just means "start
    /// fresh", not an error).
    pub async fn load(path: &Path) -> Self {
        match tokio::fs::read(path).await {
            Ok(bytes) => bincode::deserialize(&bytes).unwrap_or_default(),
            Err(_) => Self::default(),
        }
    }

    pub async fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let bytes = bincode::serialize(self).map_err(|e| DownloadError::Validation(e.to_string()))?;
        tokio::fs::write(path, bytes).await?;
        Ok(())
    }

    pub fn is_complete(&self, file_id: FileId, segment_index: u32) -> bool {
        self.completed.get(&file_id).map(|s| s.contains(&segment_index)).unwrap_or(false)
    }

    /// Records a segment as done. Returns `true` once `CKPT_INTERVAL`
    /// segments have accumulated since the last save, as a hint to flush.
    pub fn mark_complete(&mut self, file_id: FileId, segment_index: u32) -> bool {
        self.completed.entry(file_id).or_default().insert(segment_index);
        self.dirty_count += 1;
        if self.dirty_count >= CKPT_INTERVAL {
            self.dirty_count = 0;
            true
        } else {
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn round_trips_through_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("checkpoint.bin");

        let mut checkpoint = Checkpoint::default();
        checkpoint.mark_complete(FileId(1), 0);
        checkpoint.mark_complete(FileId(1), 1);
        checkpoint.save(&path).await.unwrap();

        let loaded = Checkpoint::load(&path).await;
        assert!(loaded.is_complete(FileId(1), 0));
        assert!(loaded.is_complete(FileId(1), 1));
        assert!(!loaded.is_complete(FileId(1), 2));
    }

    #[tokio::test]
    async fn missing_file_loads_as_empty() {
        let dir = tempfile::tempdir().unwrap();
        let loaded = Checkpoint::load(&dir.path().join("absent.bin")).await;
        assert!(!loaded.is_complete(FileId(1), 0));
    }
}
