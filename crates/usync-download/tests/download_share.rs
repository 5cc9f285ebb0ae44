use std::sync::Arc;
use std::time::Duration;

use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpListener;

use usync_common::{FolderState, SegmentIndex};
use usync_download::{download_share, DownloadPolicy};
use usync_nntp::{ConnectionPool, NntpConfig};
use usync_share::{publish_share, PublishRequest, UnlockRequest};
use usync_store::{ContentStore, NewFile, SegmentRow, SqliteStore};

/// One canned article the fake server can serve, keyed by `Message-ID`.
struct FakeArticle {
    message_id: String,
    subject: String,
    body: Vec<u8>,
}

/// A minimal NNTP server: greets once, serves `ARTICLE <id>` from a fixed
/// table (430 otherwise), and answers `GROUP`/`XOVER` well enough for the
/// subject-fallback path to find a match by `Subject`.
async fn run_fake_server(listener: TcpListener, articles: Arc<Vec<FakeArticle>>) {
    loop {
        let Ok((socket, _)) = listener.accept().await else { return };
        let articles = articles.clone();
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
                let trimmed = line.trim_end();

                if let Some(id) = trimmed.strip_prefix("ARTICLE ") {
                    match articles.iter().find(|a| a.message_id == id) {
                        Some(article) => {
                            let mut resp = format!("220 0 {}\r\nSubject: {}\r\nMessage-ID: {}\r\n\r\n", article.message_id, article.subject, article.message_id).into_bytes();
                            for chunk in article.body.split(|&b| b == b'\n') {
                                resp.extend_from_slice(chunk);
                                resp.extend_from_slice(b"\r\n");
                            }
                            resp.extend_from_slice(b".\r\n");
                            if write_half.write_all(&resp).await.is_err() {
                                return;
                            }
                        }
                        None => {
                            if write_half.write_all(b"430 no such article\r\n").await.is_err() {
                                return;
                            }
                        }
                    }
                } else if trimmed.starts_with("GROUP ") {
                    if write_half.write_all(b"211 0 0 0 group\r\n").await.is_err() {
                        return;
                    }
                } else if trimmed.starts_with("XOVER") {
                    let mut resp = b"224 overview\r\n".to_vec();
                    for (n, article) in articles.iter().enumerate() {
                        resp.extend_from_slice(format!("{}\t{}\tsomeone\tdate\t{}\t\t0\t0\r\n", n + 1, article.subject, article.message_id).as_bytes());
                    }
                    resp.extend_from_slice(b".\r\n");
                    if write_half.write_all(&resp).await.is_err() {
                        return;
                    }
                } else {
                    let _ = write_half.write_all(b"500 unknown command\r\n").await;
                }
            }
        });
    }
}

async fn start_pool(articles: Vec<FakeArticle>) -> ConnectionPool {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(run_fake_server(listener, Arc::new(articles)));

    ConnectionPool::new(NntpConfig {
        host: addr.ip().to_string(),
        port: addr.port(),
        ssl: false,
        username: String::new(),
        password: String::new(),
        max_connections: 4,
        idle_max: Duration::from_secs(60),
        acquire_timeout: Duration::from_secs(5),
    })
}

/// Publishes a one-file, one-segment public share backed by real segment
/// crypto, returning everything a test needs to drive `download_share`.
async fn published_single_segment_share(plaintext: &[u8], message_id: &str, subject: &str) -> (SqliteStore, usync_common::ShareId, Vec<u8>, FakeArticle) {
    let store = SqliteStore::open_in_memory().unwrap();
    let user = store.create_user("alice", [1u8; 32]).await.unwrap();
    let folder = store.create_folder("/home/alice/docs", &user.user_id).await.unwrap();

    let content_hash = usync_crypto::sha256(plaintext);
    let (file, _) = store
        .upsert_file(folder.db_id, NewFile { relative_path: "hello.txt".into(), size: plaintext.len() as u64, content_hash })
        .await
        .unwrap();

    let segment_key = usync_crypto::segment_content_key(&folder.folder_unique_id);
    let ciphertext = usync_crypto::encrypt_segment(&segment_key, &folder.folder_unique_id, file.file_id, SegmentIndex(0), plaintext);

    store
        .insert_segment(SegmentRow {
            folder_db_id: folder.db_id,
            file_id: file.file_id,
            segment_index: 0,
            size: plaintext.len() as u64,
            plaintext_hash: usync_crypto::sha256(plaintext),
            ciphertext_hash: Some(usync_crypto::sha256(&ciphertext)),
            usenet_subject: subject.into(),
            message_id: Some(message_id.into()),
            redundancy_group: 0,
            packed_with: vec![],
        })
        .await
        .unwrap();

    for state in [
        FolderState::Indexing,
        FolderState::Indexed,
        FolderState::Segmenting,
        FolderState::Segmented,
        FolderState::Uploading,
        FolderState::Uploaded,
    ] {
        store.transition_folder_state(folder.db_id, state).await.unwrap();
    }

    let share_id = publish_share(&store, folder.db_id, &user.user_id, b"owner-seed-bytes", usync_common::ShareType::Public, PublishRequest::Public)
        .await
        .unwrap();

    let body = usync_nntp::yenc::encode(&ciphertext);
    let article = FakeArticle { message_id: message_id.to_string(), subject: subject.to_string(), body };

    let share = store.get_share(&share_id).await.unwrap().unwrap();
    (store, share_id, share.encrypted_index, article)
}

#[tokio::test]
async fn downloads_and_verifies_a_single_segment_file_by_message_id() {
    let plaintext = b"hello usenet download world, this is the file content".to_vec();
    let (store, share_id, encrypted_index, article) = published_single_segment_share(&plaintext, "<seg0@test>", "obfuscated-subject-1").await;
    let folder = store.list_folders().await.unwrap().remove(0);

    let pool = start_pool(vec![article]).await;
    let destination = tempfile::tempdir().unwrap();
    let policy = DownloadPolicy {
        parallel_fetches: 2,
        newsgroup: "alt.binaries.usync".into(),
        checkpoint_path: destination.path().join("checkpoint.bin"),
    };

    let result = download_share(&encrypted_index, &folder.folder_unique_id, &share_id, UnlockRequest::Public, pool, destination.path(), policy)
        .await
        .unwrap();

    assert_eq!(result.completed.len(), 1);
    assert!(result.failed.is_empty());

    let written = tokio::fs::read(destination.path().join("hello.txt")).await.unwrap();
    assert_eq!(written, plaintext);
}

#[tokio::test]
async fn falls_back_to_subject_search_when_message_id_is_gone() {
    let plaintext = b"content recovered only through the subject fallback path".to_vec();
    // The article table only knows the article under a *different*
    // id than the manifest's `message_id`, forcing the subject search.
    let (store, share_id, encrypted_index, mut article) = published_single_segment_share(&plaintext, "<stale@test>", "obfuscated-subject-2").await;
    let folder = store.list_folders().await.unwrap().remove(0);
    article.message_id = "<fresh@test>".to_string();

    let pool = start_pool(vec![article]).await;
    let destination = tempfile::tempdir().unwrap();
    let policy = DownloadPolicy {
        parallel_fetches: 2,
        newsgroup: "alt.binaries.usync".into(),
        checkpoint_path: destination.path().join("checkpoint.bin"),
    };

    let result = download_share(&encrypted_index, &folder.folder_unique_id, &share_id, UnlockRequest::Public, pool, destination.path(), policy)
        .await
        .unwrap();

    assert_eq!(result.completed.len(), 1);
    assert!(result.failed.is_empty());
    let written = tokio::fs::read(destination.path().join("hello.txt")).await.unwrap();
    assert_eq!(written, plaintext);
}

#[tokio::test]
async fn records_unrecoverable_files_as_failed_instead_of_aborting() {
    let plaintext = b"this article will never be found anywhere".to_vec();
    let (store, share_id, encrypted_index, _unreachable_article) = published_single_segment_share(&plaintext, "<missing@test>", "obfuscated-subject-3").await;
    let folder = store.list_folders().await.unwrap().remove(0);

    let pool = start_pool(vec![]).await;
    let destination = tempfile::tempdir().unwrap();
    let policy = DownloadPolicy {
        parallel_fetches: 2,
        newsgroup: "alt.binaries.usync".into(),
        checkpoint_path: destination.path().join("checkpoint.bin"),
    };

    let result = download_share(&encrypted_index, &folder.folder_unique_id, &share_id, UnlockRequest::Public, pool, destination.path(), policy)
        .await
        .unwrap();

    assert!(result.completed.is_empty());
    assert_eq!(result.failed.len(), 1);
    assert_eq!(result.failed[0].kind, "UnrecoverableSegmentError");
}
