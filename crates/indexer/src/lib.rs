//! # Context Indexer
//!
//! Turns a project directory into the two on-disk vector tables a search
//! query reads from.
//!
//! ## Pipeline
//!
//! ```text
//! Directory
//!     │
//!     ├──> IndexingPolicy (gitignore, size cap, binary sniff)
//!     │      └─> admitted source/doc files
//!     │
//!     ├──> FingerprintStore::delta (added/modified/removed/unchanged)
//!     │
//!     ├──> Chunker / DocsChunker
//!     │      └─> chunks
//!     │
//!     └──> Embedder::embed -> VectorTable::insert_chunks
//! ```
//!
//! [`IndexManager`] owns one table (code or docs) for one project and
//! drives that pipeline. [`IntegrityEngine`] watches for drift between what
//! is on disk and what the manager believes is indexed. [`StrategyOrchestrator`]
//! picks how aggressively to react to filesystem change.

mod error;
mod fingerprint;
mod index_state;
mod integrity;
mod manager;
mod policy;
mod strategy;
mod watermark_io;

pub use error::{IndexerError, Result};
pub use fingerprint::{FingerprintDelta, FingerprintStore, FINGERPRINT_SCHEMA_VERSION};
pub use index_state::{
    assess_staleness, IndexSnapshot, IndexState, ReindexAttempt, ReindexResult, StaleAssessment,
    StaleReason, ToolMeta, Watermark, INDEX_STATE_SCHEMA_VERSION,
};
pub use integrity::{DriftReport, IntegrityEngine};
pub use manager::{IndexManager, IndexProgress, IndexStats, TableKind};
pub use policy::{IndexingPolicy, PolicyConfig, RejectReason, Table};
pub use strategy::{
    GitStrategy, IndexingStrategy, LazyStrategy, RealtimeStrategy, StrategyKind, StrategyOrchestrator,
    StrategyStats,
};
pub use watermark_io::{
    compute_project_watermark, index_watermark_path_for_store, read_index_watermark,
    try_compute_git_watermark, write_index_watermark, PersistedIndexWatermark,
};
