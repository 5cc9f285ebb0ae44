//! Command-line front end for [`usync`]: a thin `clap` dispatcher over
//! [`usync::System`]'s local store API. Each subcommand loads the
//! process-wide `Config`, opens a `System`, runs one operation, and prints
//! a short human-readable summary.

use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use data_encoding::{BASE32_NOPAD, HEXLOWER_PERMISSIVE};
use tokio_util::sync::CancellationToken;

use usync::{DbFolderId, FolderUniqueId, ShareId, ShareType, System};
use usync_common::{Config, UserId};
use usync_segmenter::SegmentPolicy;
use usync_share::{PublishRequest, UnlockRequest};
use usync_upload::UploadPolicy;

#[derive(Debug, Parser)]
#[command(name = "usync", about = "Content-addressed, end-to-end-encrypted folder sync over NNTP")]
struct Cli {
    /// Path to a config file understood by the `config` crate (TOML/YAML/JSON).
    /// Falls back to built-in defaults overridable by `USYNC_*` env vars.
    #[arg(long)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Registers a local user identity.
    InitUser {
        #[arg(long)]
        display_name: String,
        /// Hex-encoded 32-byte public key.
        #[arg(long)]
        public_key: String,
    },
    /// Adds a folder to track, in the `Added` state.
    AddFolder {
        #[arg(long)]
        path: String,
        /// Hex-encoded owner `UserId`.
        #[arg(long)]
        owner: String,
    },
    /// Walks a folder's contents and records what changed (`Added`/`Published` -> `Indexed`).
    Index {
        #[arg(long)]
        folder: i64,
    },
    /// Re-enters the pipeline for a folder that was already published.
    Resync {
        #[arg(long)]
        folder: i64,
    },
    /// Splits an indexed folder's files into fixed-size segments.
    Segment {
        #[arg(long)]
        folder: i64,
    },
    /// Posts a segmented folder's segments as NNTP articles.
    Upload {
        #[arg(long)]
        folder: i64,
        #[arg(long, default_value_t = 4)]
        workers: usize,
    },
    /// Builds and stores an encrypted share index for a folder.
    Publish {
        #[arg(long)]
        folder: i64,
        /// Hex-encoded owner `UserId`.
        #[arg(long)]
        owner: String,
        /// Hex-encoded Ed25519 signing key seed.
        #[arg(long)]
        signing_key: String,
        #[arg(value_enum, long)]
        share_type: CliShareType,
        /// Password, required when `--share-type protected`.
        #[arg(long)]
        password: Option<String>,
    },
    /// Downloads and reassembles every file named by a share's index.
    Download {
        /// Base32 `ShareId`, as printed by `publish`.
        #[arg(long)]
        share: String,
        /// Hex-encoded `FolderUniqueId` the share was published for.
        #[arg(long)]
        folder_unique_id: String,
        #[arg(value_enum, long)]
        share_type: CliShareType,
        /// Password, required when `--share-type protected`.
        #[arg(long)]
        password: Option<String>,
        #[arg(long)]
        destination: PathBuf,
        #[arg(long, default_value_t = 4)]
        parallel_fetches: usize,
    },
    /// Lists tracked folders.
    ListFolders,
    /// Removes a folder and every row derived from it.
    DeleteFolder {
        #[arg(long)]
        folder: i64,
    },
}

#[derive(Debug, Clone, Copy, clap::ValueEnum)]
enum CliShareType {
    Public,
    Protected,
}

fn decode_hex<const N: usize>(label: &str, s: &str) -> Result<[u8; N]> {
    let bytes = HEXLOWER_PERMISSIVE.decode(s.as_bytes()).with_context(|| format!("{label} is not valid hex"))?;
    bytes.try_into().map_err(|v: Vec<u8>| anyhow::anyhow!("{label} must be {N} bytes, got {}", v.len()))
}

fn decode_share_id(s: &str) -> Result<ShareId> {
    let bytes = BASE32_NOPAD
        .decode(s.to_ascii_uppercase().as_bytes())
        .with_context(|| "share id is not valid base32")?;
    let array: [u8; 16] = bytes.try_into().map_err(|v: Vec<u8>| anyhow::anyhow!("share id must be 16 bytes, got {}", v.len()))?;
    Ok(ShareId::from_bytes(array))
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt().with_env_filter(tracing_subscriber::EnvFilter::from_default_env()).init();

    let cli = Cli::parse();
    let config = match &cli.config {
        Some(path) => Config::load(path)?,
        None => Config::default(),
    };
    let system = System::open(&config)?;

    match cli.command {
        Command::InitUser { display_name, public_key } => {
            let public_key = decode_hex::<32>("public key", &public_key)?;
            let user = system.initialize_user(&display_name, public_key).await?;
            println!("user {} ({})", user.user_id, user.display_name);
        }
        Command::AddFolder { path, owner } => {
            let owner = UserId::from_bytes(decode_hex::<32>("owner", &owner)?);
            let folder = system.add_folder(&path, &owner).await?;
            println!("folder {} added, unique id {}", folder.db_id.0, folder.folder_unique_id);
        }
        Command::Index { folder } => {
            let folder = require_folder(&system, folder).await?;
            let result = system.index_folder(&folder).await?;
            println!("{} file(s) indexed, {} changed, {} bytes total", result.files_indexed, result.files_changed, result.total_size);
        }
        Command::Resync { folder } => {
            let folder = require_folder(&system, folder).await?;
            let result = system.resync_folder(&folder).await?;
            println!("{} file(s) indexed, {} changed, {} bytes total", result.files_indexed, result.files_changed, result.total_size);
        }
        Command::Segment { folder } => {
            let folder = require_folder(&system, folder).await?;
            let result = system.segment_folder(&folder, SegmentPolicy::default()).await?;
            println!("{} segment(s) created", result.segments_created);
        }
        Command::Upload { folder, workers } => {
            let folder = require_folder(&system, folder).await?;
            let policy = UploadPolicy { workers, ..Default::default() };
            let result = system.upload_folder(folder, policy, CancellationToken::new()).await?;
            println!("{} segment(s) posted, {} failed", result.completed.len(), result.failed.len());
        }
        Command::Publish { folder, owner, signing_key, share_type, password } => {
            let folder_id = DbFolderId(folder);
            let owner = UserId::from_bytes(decode_hex::<32>("owner", &owner)?);
            let signing_key = decode_hex::<32>("signing key", &signing_key)?;
            let (share_type, request) = match (share_type, password) {
                (CliShareType::Public, _) => (ShareType::Public, PublishRequest::Public),
                (CliShareType::Protected, Some(password)) => (ShareType::Protected, PublishRequest::Protected { password }),
                (CliShareType::Protected, None) => bail!("--password is required for a protected share"),
            };
            let share_id = system.publish_folder(folder_id, &owner, &signing_key, share_type, request).await?;
            println!("share {share_id}");
        }
        Command::Download { share, folder_unique_id, share_type, password, destination, parallel_fetches } => {
            let share_id = decode_share_id(&share)?;
            let folder_unique_id = FolderUniqueId::from_bytes(decode_hex::<16>("folder unique id", &folder_unique_id)?);
            let unlock = match (share_type, password) {
                (CliShareType::Public, _) => UnlockRequest::Public,
                (CliShareType::Protected, Some(password)) => UnlockRequest::Protected { password },
                (CliShareType::Protected, None) => bail!("--password is required for a protected share"),
            };
            std::fs::create_dir_all(&destination).with_context(|| format!("creating destination {}", destination.display()))?;
            let checkpoint_path = destination.join(".usync-checkpoint.bin");
            let result = system
                .download_share(&share_id, &folder_unique_id, unlock, &destination, checkpoint_path, parallel_fetches)
                .await?;
            println!("{} file(s) downloaded, {} failed", result.completed.len(), result.failed.len());
            for failure in &result.failed {
                println!("  failed: {} ({}: {})", failure.item.relative_path, failure.kind, failure.detail);
            }
        }
        Command::ListFolders => {
            for folder in system.list_folders().await? {
                println!("{}\t{}\t{}\t{:?}", folder.db_id.0, folder.folder_unique_id, folder.root_path, folder.state);
            }
        }
        Command::DeleteFolder { folder } => {
            system.delete_folder(DbFolderId(folder)).await?;
            println!("folder {folder} deleted");
        }
    }

    Ok(())
}

async fn require_folder(system: &System, db_id: i64) -> Result<usync::FolderRow> {
    system
        .get_folder(DbFolderId(db_id))
        .await?
        .with_context(|| format!("no folder with id {db_id}"))
}
