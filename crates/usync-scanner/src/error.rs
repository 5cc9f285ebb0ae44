use thiserror::Error;
use usync_common::UsyncError;

#[derive(Debug, Error)]
pub enum ScannerError {
    #[error("io error walking {path}: {source}")]
    Walk { path: String, source: std::io::Error },

    #[error(transparent)]
    Store(#[from] usync_store::StoreError),

    #[error("{0}")]
    Validation(String),
}

impl From<ScannerError> for UsyncError {
    fn from(err: ScannerError) -> Self {
        match err {
            ScannerError::Walk { path, source } => {
                UsyncError::Io(std::io::Error::new(source.kind(), format!("{path}: {source}")))
            }
            ScannerError::Store(e) => e.into(),
            ScannerError::Validation(detail) => UsyncError::Validation(detail),
        }
    }
}

pub type Result<T> = std::result::Result<T, ScannerError>;
