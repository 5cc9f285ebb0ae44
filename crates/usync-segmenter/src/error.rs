use thiserror::Error;
use usync_common::UsyncError;

#[derive(Debug, Error)]
pub enum SegmenterError {
    #[error("io error at {path}: {source}")]
    Read { path: String, source: std::io::Error },

    #[error(transparent)]
    Store(#[from] usync_store::StoreError),

    #[error("{0}")]
    Validation(String),
}

impl From<SegmenterError> for UsyncError {
    fn from(err: SegmenterError) -> Self {
        match err {
            SegmenterError::Read { path, source } => {
                UsyncError::Io(std::io::Error::new(source.kind(), format!("{path}: {source}")))
            }
            SegmenterError::Store(e) => e.into(),
            SegmenterError::Validation(detail) => UsyncError::Validation(detail),
        }
    }
}

pub type Result<T> = std::result::Result<T, SegmenterError>;
