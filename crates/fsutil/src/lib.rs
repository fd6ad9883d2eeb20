//! # Context Fsutil
//!
//! Path and hash utilities, atomic persistence, and mutex primitives shared
//! by every other crate in the indexing stack. Factored out of the indexer
//! so each piece (path normalization, content hashing, write-temp-then-
//! rename persistence, the indexing lock) is independently testable.

mod atomic;
mod error;
mod hash;
mod mutex;
mod path;

pub use atomic::{atomic_write, atomic_write_json_pretty};
pub use error::{FsutilError, Result};
pub use hash::{hash_file, hash_project_path};
pub use mutex::{AsyncMutex, AsyncMutexGuard, IndexingLock, IndexingLockGuard};
pub use path::{normalize, safe_join, to_relative};
