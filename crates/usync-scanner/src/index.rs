use std::path::Path;

use usync_common::FolderState;
use usync_store::{ContentStore, NewFile, UpsertOutcome};

use crate::error::{Result, ScannerError};
use crate::walk::walk_folder;

/// Result of `index_folder`.
#[derive(Debug, Clone, Copy, Default)]
pub struct IndexResult {
    pub files_indexed: usize,
    pub files_changed: usize,
    pub total_size: u64,
}

/// Walks `folder.root_path`, diffs every observed file against the store,
/// and drives the folder through `INDEXING -> INDEXED`. Only
/// `ADDED` or `PUBLISHED` (resync) folders may be indexed; any other
/// starting state is a `ValidationError` surfaced by the state-machine
/// check inside `transition_folder_state`.
pub async fn index_folder(
    store: &dyn ContentStore,
    folder: &usync_store::FolderRow,
) -> Result<IndexResult> {
    store.transition_folder_state(folder.db_id, FolderState::Indexing).await?;

    let root = Path::new(&folder.root_path);
    let scanned = match walk_folder(root).await {
        Ok(files) => files,
        Err(e) => {
            store.transition_folder_state(folder.db_id, FolderState::Error).await.ok();
            return Err(e);
        }
    };

    let mut result = IndexResult::default();
    for file in &scanned {
        let (row, outcome) = store
            .upsert_file(
                folder.db_id,
                NewFile {
                    relative_path: file.relative_path.clone(),
                    size: file.size,
                    content_hash: file.content_hash,
                },
            )
            .await?;

        result.files_indexed += 1;
        result.total_size += row.size;
        if outcome != UpsertOutcome::Unchanged {
            result.files_changed += 1;
        }
        tracing::debug!(path = %file.relative_path, ?outcome, "indexed file");
    }

    store
        .transition_folder_state(folder.db_id, FolderState::Indexed)
        .await
        .map_err(ScannerError::from)?;

    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;
    use usync_store::SqliteStore;

    #[tokio::test]
    async fn indexing_an_added_folder_reaches_indexed() {
        let store = SqliteStore::open_in_memory().unwrap();
        let user = store.create_user("alice", [1u8; 32]).await.unwrap();
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("a.txt"), b"hello").unwrap();
        let folder = store.create_folder(dir.path().to_str().unwrap(), &user.user_id).await.unwrap();

        let result = index_folder(&store, &folder).await.unwrap();
        assert_eq!(result.files_indexed, 1);
        assert_eq!(result.total_size, 5);

        let reloaded = store.get_folder(folder.db_id).await.unwrap().unwrap();
        assert_eq!(reloaded.state, usync_common::FolderState::Indexed);
    }

    #[tokio::test]
    async fn reindexing_unchanged_files_reports_no_changes() {
        let store = SqliteStore::open_in_memory().unwrap();
        let user = store.create_user("alice", [1u8; 32]).await.unwrap();
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("a.txt"), b"hello").unwrap();
        let folder = store.create_folder(dir.path().to_str().unwrap(), &user.user_id).await.unwrap();

        index_folder(&store, &folder).await.unwrap();
        store.transition_folder_state(folder.db_id, usync_common::FolderState::Segmenting).await.unwrap();
        store.transition_folder_state(folder.db_id, usync_common::FolderState::Segmented).await.unwrap();
        store.transition_folder_state(folder.db_id, usync_common::FolderState::Uploading).await.unwrap();
        store.transition_folder_state(folder.db_id, usync_common::FolderState::Uploaded).await.unwrap();
        store.transition_folder_state(folder.db_id, usync_common::FolderState::Publishing).await.unwrap();
        store.transition_folder_state(folder.db_id, usync_common::FolderState::Published).await.unwrap();

        let folder = store.get_folder(folder.db_id).await.unwrap().unwrap();
        let result = index_folder(&store, &folder).await.unwrap();
        assert_eq!(result.files_changed, 0);
    }
}
