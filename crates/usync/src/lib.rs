//! Content-addressed, end-to-end-encrypted folder sync over NNTP.
//!
//! [`System`] is the one entry point an embedder needs: it wires the scan,
//! segment, upload, share and download crates
//! together behind one local store API.

mod system;

pub use system::System;

pub use usync_common::{Config, DbFolderId, FolderState, FolderUniqueId, ShareId, ShareType, UsyncError};
pub use usync_download::{DownloadPolicy, DownloadResult, DownloadedFile};
pub use usync_scanner::IndexResult;
pub use usync_segmenter::SegmentPolicy;
pub use usync_share::{PrivateMember, PublishRequest, UnlockRequest};
pub use usync_store::FolderRow;
pub use usync_upload::{UploadPolicy, UploadResult};
