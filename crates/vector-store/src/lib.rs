//! # Context Vector Store
//!
//! LanceDB-backed vector tables. Each project has two independent tables —
//! one for code chunks (384-dim), one for docs chunks (768-dim) — each
//! wrapped by a [`VectorTable`]. [`EmbeddingTemplates`] selects the prompt
//! text handed to the embedder before a vector is computed.

mod embedder;
mod error;
mod table;
mod templates;

pub use embedder::{Domain, Embedder};
pub use error::{Result, VectorStoreError};
pub use table::{SearchHit, StoredChunk, VectorTable};
pub use templates::{classify_document_kind, DocumentKind, EmbeddingTemplates, QueryKind};
