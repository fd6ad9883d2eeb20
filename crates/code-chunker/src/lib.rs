//! # Context Code Chunker
//!
//! Splits source files into embedding-sized, boundary-aware chunks
//! ([`Chunker`]) and Markdown/prose documents into heading- or
//! paragraph-aware chunks ([`DocsChunker`]). [`Language`] backs both the
//! chunker's language tag and the indexing policy's extension sniffing.

mod chunker;
mod contextual_imports;
mod docs_chunker;
mod error;
mod language;

pub use chunker::{Chunker, ChunkerConfig, ChunkType, CodeChunk, OVERLAP_CHARS, STREAMING_THRESHOLD_BYTES, TARGET_CHUNK_CHARS};
pub use contextual_imports::{extract_identifiers_from_import, extract_imports_from_lines, filter_relevant_imports};
pub use docs_chunker::DocsChunker;
pub use error::{ChunkerError, Result};
pub use language::{Language, LanguageSizeLimits};
