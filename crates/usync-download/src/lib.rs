//! Share resolution, segment retrieval, verification and reassembly.

mod checkpoint;
mod download;
mod error;
mod fetch;
mod reassemble;

pub use checkpoint::Checkpoint;
pub use download::{download_share, DownloadPolicy, DownloadResult, DownloadedFile};
pub use error::{DownloadError, Result};
pub use fetch::fetch_segment_plaintext;
pub use reassemble::reassemble_file;
