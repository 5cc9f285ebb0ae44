//! Walks a folder through scan -> segment -> publish -> download entirely
//! in-process, against an in-memory store and a loopback NNTP stub, to show
//! the shape of the `System` API without a real news server.

use std::sync::Arc;
use std::time::Duration;

use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;

use usync::{PublishRequest, System, UnlockRequest};
use usync_nntp::{ConnectionPool, NntpConfig};
use usync_segmenter::SegmentPolicy;
use usync_store::{ContentStore, SqliteStore};
use usync_upload::UploadPolicy;

/// Accepts one connection, greets it, then echoes POST/ARTICLE well enough
/// for a single small folder to upload and download successfully.
async fn run_loopback_server(listener: TcpListener) {
    let Ok((socket, _)) = listener.accept().await else { return };
    let (read_half, mut write_half) = tokio::io::split(socket);
    let mut reader = BufReader::new(read_half);
    let mut articles: Vec<(String, Vec<u8>)> = Vec::new();

    let _ = write_half.write_all(b"200 welcome\r\n").await;
    let mut line = String::new();
    loop {
        line.clear();
        let Ok(n) = reader.read_line(&mut line).await else { return };
        if n == 0 {
            return;
        }
        let trimmed = line.trim_end().to_string();

        if trimmed == "POST" {
            let _ = write_half.write_all(b"340 send article\r\n").await;
            let mut headers = Vec::new();
            let mut message_id = String::new();
            let mut body = Vec::new();
            let mut in_body = false;
            loop {
                line.clear();
                let Ok(n) = reader.read_line(&mut line).await else { return };
                if n == 0 {
                    return;
                }
                let raw = line.trim_end().to_string();
                if raw == "." {
                    break;
                }
                if !in_body {
                    if raw.is_empty() {
                        in_body = true;
                        continue;
                    }
                    if let Some(id) = raw.strip_prefix("Message-ID: ") {
                        message_id = id.to_string();
                    }
                    headers.push(raw);
                } else {
                    body.extend_from_slice(raw.as_bytes());
                    body.push(b'\n');
                }
            }
            articles.push((message_id, body));
            let _ = write_half.write_all(b"240 posted ok\r\n").await;
        } else if let Some(id) = trimmed.strip_prefix("ARTICLE ") {
            match articles.iter().find(|(mid, _)| mid == id) {
                Some((mid, body)) => {
                    let mut resp = format!("220 0 {mid}\r\nSubject: x\r\nMessage-ID: {mid}\r\n\r\n").into_bytes();
                    resp.extend_from_slice(body);
                    resp.extend_from_slice(b".\r\n");
                    let _ = write_half.write_all(&resp).await;
                }
                None => {
                    let _ = write_half.write_all(b"430 no such article\r\n").await;
                }
            }
        } else {
            let _ = write_half.write_all(b"500 unknown command\r\n").await;
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let listener = TcpListener::bind("127.0.0.1:0").await?;
    let addr = listener.local_addr()?;
    tokio::spawn(run_loopback_server(listener));

    let store: Arc<dyn ContentStore> = Arc::new(SqliteStore::open_in_memory()?);
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

    let staging = tempfile::tempdir()?;
    let system = System::with_store_and_pool(store.clone(), pool, staging.path().to_path_buf(), "alt.binaries.usync".into());

    let source = tempfile::tempdir()?;
    std::fs::write(source.path().join("notes.txt"), b"content synced over usenet")?;

    let user = system.initialize_user("demo-user", [7u8; 32]).await?;
    let folder = system.add_folder(source.path().to_str().unwrap(), &user.user_id).await?;
    system.index_folder(&folder).await?;
    let folder = system.get_folder(folder.db_id).await?.unwrap();

    system.segment_folder(&folder, SegmentPolicy::default()).await?;
    let folder = system.get_folder(folder.db_id).await?.unwrap();

    system.upload_folder(folder.clone(), UploadPolicy { workers: 1, ..Default::default() }, CancellationToken::new()).await?;
    let folder = system.get_folder(folder.db_id).await?.unwrap();

    let share_id = system
        .publish_folder(folder.db_id, &user.user_id, b"demo-owner-seed", usync_common::ShareType::Public, PublishRequest::Public)
        .await?;

    let destination = tempfile::tempdir()?;
    let result = system
        .download_share(&share_id, &folder.folder_unique_id, UnlockRequest::Public, destination.path(), destination.path().join("checkpoint.bin"), 2)
        .await?;

    println!("downloaded {} file(s), {} failed", result.completed.len(), result.failed.len());
    let roundtripped = std::fs::read_to_string(destination.path().join("notes.txt"))?;
    println!("notes.txt: {roundtripped:?}");

    Ok(())
}
