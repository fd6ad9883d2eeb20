use thiserror::Error;

pub type Result<T> = std::result::Result<T, FsutilError>;

#[derive(Error, Debug)]
pub enum FsutilError {
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("read error: {0}")]
    ReadError(String),

    #[error("invalid path: {0}")]
    InvalidPath(String),

    #[error("lock acquisition timed out")]
    LockTimeout,
}
