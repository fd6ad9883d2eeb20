use thiserror::Error;

pub type Result<T> = std::result::Result<T, IndexerError>;

#[derive(Error, Debug)]
pub enum IndexerError {
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("fsutil error: {0}")]
    Fsutil(#[from] context_fsutil::FsutilError),

    #[error("chunker error: {0}")]
    Chunker(#[from] context_code_chunker::ChunkerError),

    #[error("vector store error: {0}")]
    VectorStore(#[from] context_vector_store::VectorStoreError),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("invalid project path: {0}")]
    InvalidPath(String),

    #[error("system time error: {0}")]
    SystemTime(#[from] std::time::SystemTimeError),

    #[error("indexing already in progress for {0}")]
    IndexingInProgress(String),

    #[error("project has too many candidate files ({found} > {max})")]
    ProjectTooLarge { found: usize, max: usize },

    #[error("not a git repository: {0}")]
    NotAGitRepository(String),

    #[error("read error: {0}")]
    ReadError(String),

    #[error("{0}")]
    Other(String),
}
