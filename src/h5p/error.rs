use thiserror::Error;

use crate::model::DatabaseError;

pub type H5pResult<T> = std::result::Result<T, H5pError>;

#[derive(Debug, Error)]
pub enum H5pError {
    #[error("invalid H5P package: {0}")]
    InvalidPackage(String),
    #[error("file too large: {size} bytes, limit is {max} bytes")]
    TooLarge { size: usize, max: usize },
    #[error("zip error: {0}")]
    Zip(#[from] zip::result::ZipError),
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("directory walk error: {0}")]
    Walk(#[from] walkdir::Error),
    #[error("blocking task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
    #[error("database error: {0}")]
    Database(#[from] DatabaseError),
}

impl H5pError {
    /// True when the uploaded data is at fault rather than the server.
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            Self::InvalidPackage(_) | Self::TooLarge { .. } | Self::Zip(_) | Self::Json(_)
        )
    }
}
