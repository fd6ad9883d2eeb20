//! # Context Search
//!
//! Pure, storage-agnostic helpers applied to the raw hits a
//! `context-vector-store` table query returns: [`RrfFusion`] blends a
//! table's vector-similarity ranking with an optional path-glob match
//! ranking, and [`dedupe_same_file_hits`] merges adjacent or overlapping
//! chunks from the same file into one result.

mod dedupe;
mod fusion;

pub use dedupe::dedupe_same_file_hits;
pub use fusion::RrfFusion;
