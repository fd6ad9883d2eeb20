use thiserror::Error;

pub type Result<T> = std::result::Result<T, ChunkerError>;

#[derive(Error, Debug)]
pub enum ChunkerError {
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("unsupported language: {0}")]
    UnsupportedLanguage(String),

    #[error("empty content")]
    EmptyContent,
}

impl ChunkerError {
    pub fn unsupported_language(lang: impl Into<String>) -> Self {
        Self::UnsupportedLanguage(lang.into())
    }
}
