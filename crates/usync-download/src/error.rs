use thiserror::Error;
use usync_common::{FileId, UsyncError};

//--------------------------------------------------------------------------------------------------
// Type Definitions
//--------------------------------------------------------------------------------------------------

/// Downloader errors.
#[derive(Debug, Error)]
pub enum DownloadError {
    #[error(transparent)]
    Share(#[from] usync_share::ShareError),

    #[error(transparent)]
    Crypto(#[from] usync_crypto::CryptoError),

    #[error(transparent)]
    Nntp(#[from] usync_nntp::NntpError),

    #[error(transparent)]
    Segmenter(#[from] usync_segmenter::SegmenterError),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("{0}")]
    Integrity(String),

    #[error("segment {segment_index} of file {file_id:?} could not be recovered from any copy")]
    Unrecoverable { file_id: FileId, segment_index: u32 },

    #[error("{0}")]
    Validation(String),
}

impl From<DownloadError> for UsyncError {
    fn from(err: DownloadError) -> Self {
        match err {
            DownloadError::Share(e) => e.into(),
            DownloadError::Crypto(e) => e.into(),
            DownloadError::Nntp(e) => e.into(),
            DownloadError::Segmenter(e) => e.into(),
            DownloadError::Io(e) => UsyncError::Io(e),
            DownloadError::Integrity(detail) => UsyncError::Integrity(detail),
            DownloadError::Unrecoverable { file_id, segment_index } => {
                UsyncError::UnrecoverableSegment(format!("segment {segment_index} of file {file_id:?}"))
            }
            DownloadError::Validation(detail) => UsyncError::Validation(detail),
        }
    }
}

pub type Result<T> = std::result::Result<T, DownloadError>;
