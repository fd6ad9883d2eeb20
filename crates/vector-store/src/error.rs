use thiserror::Error;

pub type Result<T> = std::result::Result<T, VectorStoreError>;

#[derive(Error, Debug)]
pub enum VectorStoreError {
    #[error("lancedb error: {0}")]
    LanceDb(#[from] lancedb::Error),

    #[error("arrow error: {0}")]
    Arrow(#[from] arrow_schema::ArrowError),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("embedding template error: {0}")]
    EmbeddingError(String),

    #[error("dimension mismatch: query has {query}, table has {table}")]
    DimensionMismatch { query: usize, table: usize },

    #[error("invalid glob pattern: {0}")]
    InvalidPattern(String),

    #[error("table not open")]
    NotOpen,
}
