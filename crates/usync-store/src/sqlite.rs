use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use usync_common::{DbFolderId, FileId, FolderState, FolderUniqueId, ShareId, ShareType, Timestamp, UserId};

use crate::error::{classify, Result, StoreError};
use crate::model::{
    AccessGrantRow, FileRow, FolderRow, NewFile, SegmentRow, ShareRow, UpsertOutcome, UserRow,
};
use crate::retry::with_retry;
use crate::ContentStore;

//--------------------------------------------------------------------------------------------------
// Type Definitions
//--------------------------------------------------------------------------------------------------

/// A `ContentStore` backed by a single SQLite database file. The
/// connection lives behind a blocking `Mutex` and every operation runs
/// inside `spawn_blocking`, since `rusqlite::Connection` talks to the OS
/// file descriptor synchronously and must never be held across an
/// `.await` point.
pub struct SqliteStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteStore {
    pub fn open(path: impl AsRef<std::path::Path>) -> Result<Self> {
        let mut conn = Connection::open(path).map_err(classify)?;
        conn.pragma_update(None, "journal_mode", "WAL").map_err(classify)?;
        conn.pragma_update(None, "foreign_keys", true).map_err(classify)?;
        crate::schema::run_migrations(&mut conn)?;
        Ok(Self { conn: Arc::new(Mutex::new(conn)) })
    }

    pub fn open_in_memory() -> Result<Self> {
        let mut conn = Connection::open_in_memory().map_err(classify)?;
        crate::schema::run_migrations(&mut conn)?;
        Ok(Self { conn: Arc::new(Mutex::new(conn)) })
    }

    /// Runs `f` with a locked connection on a blocking thread, wrapped in
    /// the busy-retry policy.
    async fn with_conn<T, F>(&self, f: F) -> Result<T>
    where
        F: Fn(&Connection) -> Result<T> + Send + Sync + 'static,
        T: Send + 'static,
    {
        let conn = self.conn.clone();
        let f = Arc::new(f);
        with_retry(move || {
            let conn = conn.clone();
            let f = f.clone();
            async move {
                tokio::task::spawn_blocking(move || {
                    let guard = conn.lock().expect("store mutex poisoned");
                    f(&guard)
                })
                .await?
            }
        })
        .await
    }
}

//--------------------------------------------------------------------------------------------------
// Wire helpers
//--------------------------------------------------------------------------------------------------

fn state_to_text(state: FolderState) -> &'static str {
    match state {
        FolderState::Added => "ADDED",
        FolderState::Indexing => "INDEXING",
        FolderState::Indexed => "INDEXED",
        FolderState::Segmenting => "SEGMENTING",
        FolderState::Segmented => "SEGMENTED",
        FolderState::Uploading => "UPLOADING",
        FolderState::Uploaded => "UPLOADED",
        FolderState::Publishing => "PUBLISHING",
        FolderState::Published => "PUBLISHED",
        FolderState::Error => "ERROR",
    }
}

fn text_to_state(text: &str) -> Result<FolderState> {
    Ok(match text {
        "ADDED" => FolderState::Added,
        "INDEXING" => FolderState::Indexing,
        "INDEXED" => FolderState::Indexed,
        "SEGMENTING" => FolderState::Segmenting,
        "SEGMENTED" => FolderState::Segmented,
        "UPLOADING" => FolderState::Uploading,
        "UPLOADED" => FolderState::Uploaded,
        "PUBLISHING" => FolderState::Publishing,
        "PUBLISHED" => FolderState::Published,
        "ERROR" => FolderState::Error,
        other => return Err(StoreError::Conflict(format!("unknown folder state {other}"))),
    })
}

fn share_type_to_text(share_type: ShareType) -> &'static str {
    match share_type {
        ShareType::Public => "PUBLIC",
        ShareType::Private => "PRIVATE",
        ShareType::Protected => "PROTECTED",
    }
}

fn text_to_share_type(text: &str) -> Result<ShareType> {
    Ok(match text {
        "PUBLIC" => ShareType::Public,
        "PRIVATE" => ShareType::Private,
        "PROTECTED" => ShareType::Protected,
        other => return Err(StoreError::Conflict(format!("unknown share type {other}"))),
    })
}

fn timestamp_to_text(ts: Timestamp) -> String {
    ts.to_rfc3339()
}

fn text_to_timestamp(text: &str) -> Result<Timestamp> {
    DateTime::parse_from_rfc3339(text)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| StoreError::Conflict(format!("malformed timestamp: {e}")))
}

fn row_to_folder(row: &rusqlite::Row) -> rusqlite::Result<(i64, Vec<u8>, Vec<u8>, String, String, String)> {
    Ok((
        row.get(0)?,
        row.get(1)?,
        row.get(2)?,
        row.get(3)?,
        row.get(4)?,
        row.get(5)?,
    ))
}

fn build_folder_row(
    db_id: i64,
    folder_unique_id: Vec<u8>,
    owner_id: Vec<u8>,
    root_path: String,
    state: String,
    created_at: String,
) -> Result<FolderRow> {
    let mut fid = [0u8; 16];
    fid.copy_from_slice(&folder_unique_id);
    let mut uid = [0u8; 32];
    uid.copy_from_slice(&owner_id);
    Ok(FolderRow {
        db_id: DbFolderId(db_id),
        folder_unique_id: FolderUniqueId::from_bytes(fid),
        owner_id: UserId::from_bytes(uid),
        root_path,
        state: text_to_state(&state)?,
        created_at: text_to_timestamp(&created_at)?,
    })
}

//--------------------------------------------------------------------------------------------------
// Trait Implementation
//--------------------------------------------------------------------------------------------------

#[async_trait]
impl ContentStore for SqliteStore {
    async fn create_user(&self, display_name: &str, public_key: [u8; 32]) -> Result<UserRow> {
        let display_name = display_name.to_string();
        self.with_conn(move |conn| {
            let user_id = crate::ids::derive_user_id(&public_key);
            let created_at = usync_common::now();
            conn.execute(
                "INSERT INTO users (user_id, display_name, public_key, created_at) VALUES (?1, ?2, ?3, ?4)",
                params![user_id.as_bytes().to_vec(), display_name, public_key.to_vec(), timestamp_to_text(created_at)],
            )
            .map_err(classify)?;
            Ok(UserRow { user_id, display_name: display_name.clone(), public_key, created_at })
        })
        .await
    }

    async fn get_user(&self, user_id: &UserId) -> Result<Option<UserRow>> {
        let user_id = user_id.clone();
        self.with_conn(move |conn| {
            conn.query_row(
                "SELECT user_id, display_name, public_key, created_at FROM users WHERE user_id = ?1",
                params![user_id.as_bytes().to_vec()],
                |row| {
                    let user_id: Vec<u8> = row.get(0)?;
                    let display_name: String = row.get(1)?;
                    let public_key: Vec<u8> = row.get(2)?;
                    let created_at: String = row.get(3)?;
                    Ok((user_id, display_name, public_key, created_at))
                },
            )
            .optional()
            .map_err(classify)?
            .map(|(user_id, display_name, public_key, created_at)| {
                let mut uid = [0u8; 32];
                uid.copy_from_slice(&user_id);
                let mut pk = [0u8; 32];
                pk.copy_from_slice(&public_key);
                Ok(UserRow {
                    user_id: UserId::from_bytes(uid),
                    display_name,
                    public_key: pk,
                    created_at: text_to_timestamp(&created_at)?,
                })
            })
            .transpose()
        })
        .await
    }

    async fn create_folder(&self, root_path: &str, owner_id: &UserId) -> Result<FolderRow> {
        let root_path = root_path.to_string();
        let owner_id = owner_id.clone();
        self.with_conn(move |conn| {
            let folder_unique_id = crate::ids::random_folder_unique_id();
            let created_at = usync_common::now();
            conn.execute(
                "INSERT INTO folders (folder_unique_id, owner_id, root_path, state, created_at) VALUES (?1, ?2, ?3, ?4, ?5)",
                params![
                    folder_unique_id.as_bytes().to_vec(),
                    owner_id.as_bytes().to_vec(),
                    root_path,
                    state_to_text(FolderState::Added),
                    timestamp_to_text(created_at),
                ],
            )
            .map_err(classify)?;
            let db_id = conn.last_insert_rowid();
            Ok(FolderRow {
                db_id: DbFolderId(db_id),
                folder_unique_id,
                owner_id: owner_id.clone(),
                root_path: root_path.clone(),
                state: FolderState::Added,
                created_at,
            })
        })
        .await
    }

    async fn get_folder(&self, db_id: DbFolderId) -> Result<Option<FolderRow>> {
        self.with_conn(move |conn| {
            conn.query_row(
                "SELECT db_id, folder_unique_id, owner_id, root_path, state, created_at FROM folders WHERE db_id = ?1",
                params![db_id.0],
                row_to_folder,
            )
            .optional()
            .map_err(classify)?
            .map(|(db_id, fid, oid, rp, st, ca)| build_folder_row(db_id, fid, oid, rp, st, ca))
            .transpose()
        })
        .await
    }

    async fn get_folder_by_unique_id(&self, id: &FolderUniqueId) -> Result<Option<FolderRow>> {
        let id = *id;
        self.with_conn(move |conn| {
            conn.query_row(
                "SELECT db_id, folder_unique_id, owner_id, root_path, state, created_at FROM folders WHERE folder_unique_id = ?1",
                params![id.as_bytes().to_vec()],
                row_to_folder,
            )
            .optional()
            .map_err(classify)?
            .map(|(db_id, fid, oid, rp, st, ca)| build_folder_row(db_id, fid, oid, rp, st, ca))
            .transpose()
        })
        .await
    }

    async fn list_folders(&self) -> Result<Vec<FolderRow>> {
        self.with_conn(move |conn| {
            let mut stmt = conn
                .prepare("SELECT db_id, folder_unique_id, owner_id, root_path, state, created_at FROM folders ORDER BY db_id")
                .map_err(classify)?;
            let rows = stmt
                .query_map([], row_to_folder)
                .map_err(classify)?
                .collect::<std::result::Result<Vec<_>, _>>()
                .map_err(classify)?;
            rows.into_iter()
                .map(|(db_id, fid, oid, rp, st, ca)| build_folder_row(db_id, fid, oid, rp, st, ca))
                .collect()
        })
        .await
    }

    async fn transition_folder_state(&self, db_id: DbFolderId, next: FolderState) -> Result<()> {
        self.with_conn(move |conn| {
            let current: String = conn
                .query_row("SELECT state FROM folders WHERE db_id = ?1", params![db_id.0], |row| row.get(0))
                .map_err(classify)?;
            let current = text_to_state(&current)?;
            if !current.can_transition_to(next) {
                return Err(StoreError::Conflict(format!(
                    "illegal folder state transition {current:?} -> {next:?}"
                )));
            }
            conn.execute(
                "UPDATE folders SET state = ?1 WHERE db_id = ?2",
                params![state_to_text(next), db_id.0],
            )
            .map_err(classify)?;
            Ok(())
        })
        .await
    }

    async fn delete_folder(&self, db_id: DbFolderId) -> Result<()> {
        self.with_conn(move |conn| {
            conn.execute("DELETE FROM segments WHERE folder_db_id = ?1", params![db_id.0]).map_err(classify)?;
            conn.execute("DELETE FROM files WHERE folder_db_id = ?1", params![db_id.0]).map_err(classify)?;
            conn.execute("DELETE FROM folders WHERE db_id = ?1", params![db_id.0]).map_err(classify)?;
            Ok(())
        })
        .await
    }

    async fn upsert_file(&self, folder_db_id: DbFolderId, new_file: NewFile) -> Result<(FileRow, UpsertOutcome)> {
        self.with_conn(move |conn| {
            let existing = conn
                .query_row(
                    "SELECT file_id, size, content_hash, segment_count, version FROM files WHERE folder_db_id = ?1 AND relative_path = ?2",
                    params![folder_db_id.0, new_file.relative_path],
                    |row| {
                        let file_id: i64 = row.get(0)?;
                        let size: i64 = row.get(1)?;
                        let content_hash: Vec<u8> = row.get(2)?;
                        let segment_count: i64 = row.get(3)?;
                        let version: i64 = row.get(4)?;
                        Ok((file_id, size, content_hash, segment_count, version))
                    },
                )
                .optional()
                .map_err(classify)?;

            match existing {
                None => {
                    let file_id = next_file_id(conn, folder_db_id)?;
                    conn.execute(
                        "INSERT INTO files (file_id, folder_db_id, relative_path, size, content_hash, segment_count, version) VALUES (?1, ?2, ?3, ?4, ?5, 0, 1)",
                        params![file_id, folder_db_id.0, new_file.relative_path, new_file.size as i64, new_file.content_hash.to_vec()],
                    )
                    .map_err(classify)?;
                    Ok((
                        FileRow {
                            file_id: FileId(file_id),
                            folder_db_id,
                            relative_path: new_file.relative_path.clone(),
                            size: new_file.size,
                            content_hash: new_file.content_hash,
                            segment_count: 0,
                            version: 1,
                        },
                        UpsertOutcome::Inserted,
                    ))
                }
                Some((file_id, size, content_hash, segment_count, version)) => {
                    let unchanged = size as u64 == new_file.size && content_hash.as_slice() == new_file.content_hash;
                    if unchanged {
                        return Ok((
                            FileRow {
                                file_id: FileId(file_id),
                                folder_db_id,
                                relative_path: new_file.relative_path.clone(),
                                size: new_file.size,
                                content_hash: new_file.content_hash,
                                segment_count: segment_count as u32,
                                version: version as u32,
                            },
                            UpsertOutcome::Unchanged,
                        ));
                    }
                    let new_version = version + 1;
                    conn.execute(
                        "UPDATE files SET size = ?1, content_hash = ?2, version = ?3 WHERE folder_db_id = ?4 AND file_id = ?5",
                        params![new_file.size as i64, new_file.content_hash.to_vec(), new_version, folder_db_id.0, file_id],
                    )
                    .map_err(classify)?;
                    conn.execute(
                        "DELETE FROM segments WHERE folder_db_id = ?1 AND file_id = ?2",
                        params![folder_db_id.0, file_id],
                    )
                    .map_err(classify)?;
                    Ok((
                        FileRow {
                            file_id: FileId(file_id),
                            folder_db_id,
                            relative_path: new_file.relative_path.clone(),
                            size: new_file.size,
                            content_hash: new_file.content_hash,
                            segment_count: segment_count as u32,
                            version: new_version as u32,
                        },
                        UpsertOutcome::VersionBumped,
                    ))
                }
            }
        })
        .await
    }

    async fn list_files(&self, folder_db_id: DbFolderId) -> Result<Vec<FileRow>> {
        self.with_conn(move |conn| {
            let mut stmt = conn
                .prepare("SELECT file_id, relative_path, size, content_hash, segment_count, version FROM files WHERE folder_db_id = ?1 ORDER BY relative_path")
                .map_err(classify)?;
            let rows = stmt
                .query_map(params![folder_db_id.0], |row| {
                    let file_id: i64 = row.get(0)?;
                    let relative_path: String = row.get(1)?;
                    let size: i64 = row.get(2)?;
                    let content_hash: Vec<u8> = row.get(3)?;
                    let segment_count: i64 = row.get(4)?;
                    let version: i64 = row.get(5)?;
                    Ok((file_id, relative_path, size, content_hash, segment_count, version))
                })
                .map_err(classify)?
                .collect::<std::result::Result<Vec<_>, _>>()
                .map_err(classify)?;

            rows.into_iter()
                .map(|(file_id, relative_path, size, content_hash, segment_count, version)| {
                    let mut hash = [0u8; 32];
                    hash.copy_from_slice(&content_hash);
                    Ok(FileRow {
                        file_id: FileId(file_id),
                        folder_db_id,
                        relative_path,
                        size: size as u64,
                        content_hash: hash,
                        segment_count: segment_count as u32,
                        version: version as u32,
                    })
                })
                .collect()
        })
        .await
    }

    async fn get_file(&self, folder_db_id: DbFolderId, file_id: FileId) -> Result<Option<FileRow>> {
        let files = self.list_files(folder_db_id).await?;
        Ok(files.into_iter().find(|f| f.file_id == file_id))
    }

    async fn insert_segment(&self, segment: SegmentRow) -> Result<()> {
        self.with_conn(move |conn| {
            let packed_with = serde_json::to_string(&segment.packed_with.iter().map(|f| f.0).collect::<Vec<_>>())
                .expect("Vec<i64> always serializes");
            conn.execute(
                "INSERT INTO segments (folder_db_id, file_id, segment_index, redundancy_group, size, plaintext_hash, ciphertext_hash, usenet_subject, message_id, packed_with)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
                params![
                    segment.folder_db_id.0,
                    segment.file_id.0,
                    segment.segment_index,
                    segment.redundancy_group,
                    segment.size as i64,
                    segment.plaintext_hash.to_vec(),
                    segment.ciphertext_hash.map(|h| h.to_vec()),
                    segment.usenet_subject,
                    segment.message_id,
                    packed_with,
                ],
            )
            .map_err(classify)?;
            conn.execute(
                "UPDATE files SET segment_count = segment_count + 1 WHERE folder_db_id = ?1 AND file_id = ?2",
                params![segment.folder_db_id.0, segment.file_id.0],
            )
            .map_err(classify)?;
            Ok(())
        })
        .await
    }

    async fn update_segment_post_result(
        &self,
        folder_db_id: DbFolderId,
        file_id: FileId,
        segment_index: u32,
        redundancy_group: u32,
        message_id: String,
        usenet_subject: String,
        ciphertext_hash: [u8; 32],
    ) -> Result<()> {
        self.with_conn(move |conn| {
            conn.execute(
                "UPDATE segments SET message_id = ?1, usenet_subject = ?2, ciphertext_hash = ?3
                 WHERE folder_db_id = ?4 AND file_id = ?5 AND segment_index = ?6 AND redundancy_group = ?7",
                params![message_id, usenet_subject, ciphertext_hash.to_vec(), folder_db_id.0, file_id.0, segment_index, redundancy_group],
            )
            .map_err(classify)?;
            Ok(())
        })
        .await
    }

    async fn list_segments_for_file(&self, folder_db_id: DbFolderId, file_id: FileId) -> Result<Vec<SegmentRow>> {
        self.with_conn(move |conn| {
            query_segments(conn, "WHERE folder_db_id = ?1 AND file_id = ?2", params![folder_db_id.0, file_id.0])
        })
        .await
    }

    async fn list_segments_for_folder(&self, folder_db_id: DbFolderId) -> Result<Vec<SegmentRow>> {
        self.with_conn(move |conn| query_segments(conn, "WHERE folder_db_id = ?1", params![folder_db_id.0])).await
    }

    async fn create_share(&self, share: ShareRow) -> Result<()> {
        self.with_conn(move |conn| {
            conn.execute(
                "INSERT INTO shares (share_id, folder_db_id, share_type, encrypted_index, owner_id, created_at, expires_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                params![
                    share.share_id.as_bytes().to_vec(),
                    share.folder_db_id.0,
                    share_type_to_text(share.share_type),
                    share.encrypted_index,
                    share.owner_id.as_bytes().to_vec(),
                    timestamp_to_text(share.created_at),
                    share.expires_at.map(timestamp_to_text),
                ],
            )
            .map_err(classify)?;
            Ok(())
        })
        .await
    }

    async fn get_share(&self, share_id: &ShareId) -> Result<Option<ShareRow>> {
        let share_id = share_id.clone();
        self.with_conn(move |conn| {
            conn.query_row(
                "SELECT share_id, folder_db_id, share_type, encrypted_index, owner_id, created_at, expires_at FROM shares WHERE share_id = ?1",
                params![share_id.as_bytes().to_vec()],
                |row| {
                    let share_id: Vec<u8> = row.get(0)?;
                    let folder_db_id: i64 = row.get(1)?;
                    let share_type: String = row.get(2)?;
                    let encrypted_index: Vec<u8> = row.get(3)?;
                    let owner_id: Vec<u8> = row.get(4)?;
                    let created_at: String = row.get(5)?;
                    let expires_at: Option<String> = row.get(6)?;
                    Ok((share_id, folder_db_id, share_type, encrypted_index, owner_id, created_at, expires_at))
                },
            )
            .optional()
            .map_err(classify)?
            .map(|(share_id, folder_db_id, share_type, encrypted_index, owner_id, created_at, expires_at)| {
                let mut sid = [0u8; 16];
                sid.copy_from_slice(&share_id);
                let mut oid = [0u8; 32];
                oid.copy_from_slice(&owner_id);
                Ok(ShareRow {
                    share_id: ShareId::from_bytes(sid),
                    folder_db_id: DbFolderId(folder_db_id),
                    share_type: text_to_share_type(&share_type)?,
                    encrypted_index,
                    owner_id: UserId::from_bytes(oid),
                    created_at: text_to_timestamp(&created_at)?,
                    expires_at: expires_at.map(|s| text_to_timestamp(&s)).transpose()?,
                })
            })
            .transpose()
        })
        .await
    }

    async fn insert_access_grant(&self, grant: AccessGrantRow) -> Result<()> {
        self.with_conn(move |conn| {
            conn.execute(
                "INSERT INTO access_grants (share_id, commitment, wrapped_key) VALUES (?1, ?2, ?3)",
                params![grant.share_id.as_bytes().to_vec(), grant.commitment.to_vec(), grant.wrapped_key],
            )
            .map_err(classify)?;
            Ok(())
        })
        .await
    }

    async fn list_access_grants(&self, share_id: &ShareId) -> Result<Vec<AccessGrantRow>> {
        let share_id = share_id.clone();
        self.with_conn(move |conn| {
            let mut stmt = conn
                .prepare("SELECT share_id, commitment, wrapped_key FROM access_grants WHERE share_id = ?1")
                .map_err(classify)?;
            let rows = stmt
                .query_map(params![share_id.as_bytes().to_vec()], |row| {
                    let sid: Vec<u8> = row.get(0)?;
                    let commitment: Vec<u8> = row.get(1)?;
                    let wrapped_key: Vec<u8> = row.get(2)?;
                    Ok((sid, commitment, wrapped_key))
                })
                .map_err(classify)?
                .collect::<std::result::Result<Vec<_>, _>>()
                .map_err(classify)?;
            rows.into_iter()
                .map(|(sid, commitment, wrapped_key)| {
                    let mut sid_arr = [0u8; 16];
                    sid_arr.copy_from_slice(&sid);
                    let mut commitment_arr = [0u8; 32];
                    commitment_arr.copy_from_slice(&commitment);
                    Ok(AccessGrantRow { share_id: ShareId::from_bytes(sid_arr), commitment: commitment_arr, wrapped_key })
                })
                .collect()
        })
        .await
    }
}

fn next_file_id(conn: &Connection, folder_db_id: DbFolderId) -> Result<i64> {
    let max: Option<i64> = conn
        .query_row(
            "SELECT MAX(file_id) FROM files WHERE folder_db_id = ?1",
            params![folder_db_id.0],
            |row| row.get(0),
        )
        .map_err(classify)?;
    Ok(max.unwrap_or(0) + 1)
}

fn query_segments(conn: &Connection, where_clause: &str, query_params: impl rusqlite::Params) -> Result<Vec<SegmentRow>> {
    let sql = format!(
        "SELECT folder_db_id, file_id, segment_index, redundancy_group, size, plaintext_hash, ciphertext_hash, usenet_subject, message_id, packed_with
         FROM segments {where_clause} ORDER BY file_id, segment_index, redundancy_group"
    );
    let mut stmt = conn.prepare(&sql).map_err(classify)?;
    let rows = stmt
        .query_map(query_params, |row| {
            let folder_db_id: i64 = row.get(0)?;
            let file_id: i64 = row.get(1)?;
            let segment_index: i64 = row.get(2)?;
            let redundancy_group: i64 = row.get(3)?;
            let size: i64 = row.get(4)?;
            let plaintext_hash: Vec<u8> = row.get(5)?;
            let ciphertext_hash: Option<Vec<u8>> = row.get(6)?;
            let usenet_subject: String = row.get(7)?;
            let message_id: Option<String> = row.get(8)?;
            let packed_with: String = row.get(9)?;
            Ok((
                folder_db_id,
                file_id,
                segment_index,
                redundancy_group,
                size,
                plaintext_hash,
                ciphertext_hash,
                usenet_subject,
                message_id,
                packed_with,
            ))
        })
        .map_err(classify)?
        .collect::<std::result::Result<Vec<_>, _>>()
        .map_err(classify)?;

    rows.into_iter()
        .map(
            |(folder_db_id, file_id, segment_index, redundancy_group, size, plaintext_hash, ciphertext_hash, usenet_subject, message_id, packed_with)| {
                let mut pt_hash = [0u8; 32];
                pt_hash.copy_from_slice(&plaintext_hash);
                let ct_hash = ciphertext_hash.map(|h| {
                    let mut arr = [0u8; 32];
                    arr.copy_from_slice(&h);
                    arr
                });
                let packed_with: Vec<i64> = serde_json::from_str(&packed_with)
                    .map_err(|e| StoreError::Conflict(format!("malformed packed_with: {e}")))?;
                Ok(SegmentRow {
                    folder_db_id: DbFolderId(folder_db_id),
                    file_id: FileId(file_id),
                    segment_index: segment_index as u32,
                    size: size as u64,
                    plaintext_hash: pt_hash,
                    ciphertext_hash: ct_hash,
                    usenet_subject,
                    message_id,
                    redundancy_group: redundancy_group as u32,
                    packed_with: packed_with.into_iter().map(FileId).collect(),
                })
            },
        )
        .collect()
}
