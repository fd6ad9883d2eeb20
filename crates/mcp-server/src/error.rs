//! Error taxonomy for the tool surface. Every public tool maps whatever it
//! fails with down to one of these kinds before it reaches a caller; the
//! envelope shape (`{code, message, details?}`) is the only error
//! representation a client ever sees.

use serde::Serialize;
use serde_json::Value;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, McpError>;

#[derive(Error, Debug)]
pub enum McpError {
    #[error("index not found: {0}")]
    IndexNotFound(String),

    #[error("docs index not found: {0}")]
    DocsIndexNotFound(String),

    #[error("index already exists: {0}")]
    IndexExists(String),

    #[error("index corrupt: {0}")]
    IndexCorrupt(String),

    #[error("indexing already in progress for {0}")]
    IndexingInProgress(String),

    #[error("invalid query: {0}")]
    InvalidQuery(String),

    #[error("invalid pattern: {0}")]
    InvalidPattern(String),

    #[error("file not found: {0}")]
    FileNotFound(String),

    #[error("file excluded by policy: {0}")]
    FileExcluded(String),

    #[error("path escapes project root: {0}")]
    PathTraversal(String),

    #[error("embedding model failed to load: {0}")]
    ModelLoadFailed(String),

    #[error("disk full: {0}")]
    DiskFull(String),

    #[error("dimension mismatch: query has {query}, table has {table}")]
    DimensionMismatch { query: usize, table: usize },

    #[error("operation timed out: {0}")]
    Timeout(String),

    #[error("read error: {0}")]
    ReadError(String),

    #[error("internal error: {0}")]
    Internal(String),
}

impl McpError {
    #[must_use]
    pub const fn code(&self) -> &'static str {
        match self {
            Self::IndexNotFound(_) => "index-not-found",
            Self::DocsIndexNotFound(_) => "docs-index-not-found",
            Self::IndexExists(_) => "index-exists",
            Self::IndexCorrupt(_) => "index-corrupt",
            Self::IndexingInProgress(_) => "indexing-in-progress",
            Self::InvalidQuery(_) => "invalid-query",
            Self::InvalidPattern(_) => "invalid-pattern",
            Self::FileNotFound(_) => "file-not-found",
            Self::FileExcluded(_) => "file-excluded",
            Self::PathTraversal(_) => "path-traversal",
            Self::ModelLoadFailed(_) => "model-load-failed",
            Self::DiskFull(_) => "disk-full",
            Self::DimensionMismatch { .. } => "dimension-mismatch",
            Self::Timeout(_) => "timeout",
            Self::ReadError(_) => "read-error",
            Self::Internal(_) => "internal",
        }
    }

    #[must_use]
    pub fn envelope(&self) -> ErrorEnvelope {
        ErrorEnvelope {
            code: self.code(),
            message: self.to_string(),
            details: None,
        }
    }

    #[must_use]
    pub fn envelope_json(&self) -> String {
        serde_json::to_string_pretty(&self.envelope()).unwrap_or_else(|_| self.to_string())
    }
}

#[derive(Debug, Serialize)]
pub struct ErrorEnvelope {
    pub code: &'static str,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<Value>,
}

impl From<context_indexer::IndexerError> for McpError {
    fn from(err: context_indexer::IndexerError) -> Self {
        use context_indexer::IndexerError;
        match err {
            IndexerError::IndexingInProgress(project) => Self::IndexingInProgress(project),
            IndexerError::VectorStore(inner) => inner.into(),
            IndexerError::Fsutil(inner) => inner.into(),
            IndexerError::Chunker(inner) => Self::ReadError(inner.to_string()),
            IndexerError::ReadError(msg) => Self::ReadError(msg),
            IndexerError::InvalidPath(msg) => Self::PathTraversal(msg),
            IndexerError::ProjectTooLarge { found, max } => {
                Self::Internal(format!("project too large: {found} candidate files exceeds {max}"))
            }
            IndexerError::NotAGitRepository(path) => {
                Self::Internal(format!("not a git repository: {path}"))
            }
            other => Self::Internal(other.to_string()),
        }
    }
}

impl From<context_vector_store::VectorStoreError> for McpError {
    fn from(err: context_vector_store::VectorStoreError) -> Self {
        use context_vector_store::VectorStoreError;
        match err {
            VectorStoreError::DimensionMismatch { query, table } => Self::DimensionMismatch { query, table },
            VectorStoreError::InvalidPattern(msg) => Self::InvalidPattern(msg),
            VectorStoreError::EmbeddingError(msg) => Self::ModelLoadFailed(msg),
            VectorStoreError::IoError(err) if err.kind() == std::io::ErrorKind::Other => {
                Self::DiskFull(err.to_string())
            }
            other => Self::Internal(other.to_string()),
        }
    }
}

impl From<context_fsutil::FsutilError> for McpError {
    fn from(err: context_fsutil::FsutilError) -> Self {
        use context_fsutil::FsutilError;
        match err {
            FsutilError::ReadError(msg) => Self::ReadError(msg),
            FsutilError::InvalidPath(msg) => Self::PathTraversal(msg),
            FsutilError::LockTimeout => Self::Timeout("lock acquisition timed out".into()),
            other => Self::Internal(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn code_matches_taxonomy_name() {
        assert_eq!(McpError::IndexNotFound("x".into()).code(), "index-not-found");
        assert_eq!(
            McpError::DimensionMismatch { query: 384, table: 768 }.code(),
            "dimension-mismatch"
        );
    }

    #[test]
    fn envelope_omits_details_when_absent() {
        let err = McpError::InvalidQuery("empty".into());
        let json = err.envelope_json();
        assert!(!json.contains("details"));
        assert!(json.contains("invalid-query"));
    }

    #[test]
    fn indexing_in_progress_round_trips_through_indexer_error() {
        let inner = context_indexer::IndexerError::IndexingInProgress("/proj".into());
        let mapped: McpError = inner.into();
        assert_eq!(mapped.code(), "indexing-in-progress");
    }
}
