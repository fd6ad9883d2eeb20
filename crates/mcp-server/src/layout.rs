//! On-disk layout for one project's index: path derivation, configuration,
//! and the metadata record, all rooted at
//! `~/.mcp/search/indexes/<hash64>/`.

use crate::error::{McpError, Result};
use context_fsutil::{atomic_write_json_pretty, hash_project_path};
use rmcp::schemars;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

pub const METADATA_SCHEMA_VERSION: &str = "1.0.0";

fn major_version(version: &str) -> &str {
    version.split('.').next().unwrap_or(version)
}

/// Paths for one project's index root and the files/directories under it.
#[derive(Debug, Clone)]
pub struct IndexLayout {
    root: PathBuf,
}

impl IndexLayout {
    /// Derive the layout for `project_root` under `indexes_root` (normally
    /// `$HOME/.mcp/search/indexes`).
    #[must_use]
    pub fn new(indexes_root: &Path, project_root: &Path) -> Self {
        let hash = hash_project_path(project_root);
        Self {
            root: indexes_root.join(hash),
        }
    }

    /// Derive the layout using the user's home directory as the indexes
    /// root. Fails if the home directory can't be resolved.
    pub fn for_project(project_root: &Path) -> Result<Self> {
        let home = dirs::home_dir()
            .ok_or_else(|| McpError::Internal("could not resolve home directory".into()))?;
        Ok(Self::new(&home.join(".mcp").join("search").join("indexes"), project_root))
    }

    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    #[must_use]
    pub fn config_path(&self) -> PathBuf {
        self.root.join("config.json")
    }

    #[must_use]
    pub fn metadata_path(&self) -> PathBuf {
        self.root.join("metadata.json")
    }

    #[must_use]
    pub fn fingerprints_path(&self) -> PathBuf {
        self.root.join("fingerprints.json")
    }

    #[must_use]
    pub fn docs_fingerprints_path(&self) -> PathBuf {
        self.root.join("docs-fingerprints.json")
    }

    #[must_use]
    pub fn dirty_files_path(&self) -> PathBuf {
        self.root.join("dirty-files.json")
    }

    #[must_use]
    pub fn code_table_dir(&self) -> PathBuf {
        self.root.join("index.lancedb")
    }

    #[must_use]
    pub fn docs_table_dir(&self) -> PathBuf {
        self.root.join("docs.lancedb")
    }

    #[must_use]
    pub fn exists(&self) -> bool {
        self.metadata_path().is_file()
    }
}

/// Parse a human-readable file size such as `"1MB"`, `"512KB"`, or a bare
/// number of bytes (`"1048576"`). Case-insensitive, optional whitespace
/// between the number and the unit. Recognizes `B`, `KB`, `MB`, `GB` as
/// decimal (1000-based) multiples, matching how humans write these.
#[must_use]
pub fn parse_human_size(input: &str) -> Option<u64> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return None;
    }
    let upper = trimmed.to_ascii_uppercase();
    let (digits, multiplier) = if let Some(prefix) = upper.strip_suffix("GB") {
        (prefix, 1_000_000_000u64)
    } else if let Some(prefix) = upper.strip_suffix("MB") {
        (prefix, 1_000_000u64)
    } else if let Some(prefix) = upper.strip_suffix("KB") {
        (prefix, 1_000u64)
    } else if let Some(prefix) = upper.strip_suffix('B') {
        (prefix, 1u64)
    } else {
        (upper.as_str(), 1u64)
    };
    let number: f64 = digits.trim().parse().ok()?;
    if number < 0.0 {
        return None;
    }
    Some((number * multiplier as f64) as u64)
}

fn default_max_file_size_bytes() -> u64 {
    1024 * 1024
}

fn default_doc_patterns() -> Vec<String> {
    vec!["**/*.md".to_string(), "**/*.mdx".to_string()]
}

fn default_strategy() -> String {
    "lazy".to_string()
}

fn default_lazy_idle_threshold_secs() -> u64 {
    30
}

fn default_true() -> bool {
    true
}

/// The persisted per-project configuration record (`config.json`).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IndexConfig {
    #[serde(default)]
    pub include_globs: Vec<String>,
    #[serde(default)]
    pub exclude_globs: Vec<String>,
    #[serde(default = "default_true")]
    pub respect_gitignore: bool,
    #[serde(default = "default_max_file_size_bytes")]
    pub max_file_size_bytes: u64,
    #[serde(default)]
    pub max_files: Option<usize>,
    #[serde(default = "default_doc_patterns")]
    pub doc_patterns: Vec<String>,
    #[serde(default = "default_true")]
    pub index_docs: bool,
    #[serde(default = "default_strategy")]
    pub strategy: String,
    #[serde(default = "default_lazy_idle_threshold_secs")]
    pub lazy_idle_threshold_secs: u64,
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            include_globs: Vec::new(),
            exclude_globs: Vec::new(),
            respect_gitignore: true,
            max_file_size_bytes: default_max_file_size_bytes(),
            max_files: None,
            doc_patterns: default_doc_patterns(),
            index_docs: true,
            strategy: default_strategy(),
            lazy_idle_threshold_secs: default_lazy_idle_threshold_secs(),
        }
    }
}

impl IndexConfig {
    pub async fn load(path: &Path) -> Self {
        let Ok(bytes) = tokio::fs::read(path).await else {
            return Self::default();
        };
        match serde_json::from_slice(&bytes) {
            Ok(config) => config,
            Err(err) => {
                log::warn!("config at {} is corrupt ({err}), using defaults", path.display());
                Self::default()
            }
        }
    }

    pub async fn save(&self, path: &Path) -> Result<()> {
        atomic_write_json_pretty(path, self).await?;
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, schemars::JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum IndexingState {
    Complete,
    InProgress,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq, schemars::JsonSchema)]
pub struct TableStats {
    pub total_files: usize,
    pub total_chunks: usize,
    pub storage_size_bytes: u64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq, schemars::JsonSchema)]
pub struct DocsStats {
    pub total_docs: usize,
    pub total_doc_chunks: usize,
    pub docs_storage_size_bytes: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, schemars::JsonSchema)]
pub struct EmbeddingModelInfo {
    pub name: String,
    pub dim: usize,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq, schemars::JsonSchema)]
pub struct EmbeddingModels {
    pub code: Option<EmbeddingModelInfo>,
    pub docs: Option<EmbeddingModelInfo>,
}

/// The persisted per-project metadata record (`metadata.json`).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IndexMetadata {
    pub version: String,
    pub project_path: String,
    pub created_at: String,
    pub last_full_index: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_incremental_update: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_docs_index: Option<String>,
    pub stats: TableStats,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub docs_stats: Option<DocsStats>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub embedding_models: Option<EmbeddingModels>,
    pub indexing_state: IndexingState,
}

impl IndexMetadata {
    #[must_use]
    pub fn new(project_path: String, created_at: String) -> Self {
        Self {
            version: METADATA_SCHEMA_VERSION.to_string(),
            project_path,
            created_at,
            last_full_index: None,
            last_incremental_update: None,
            last_docs_index: None,
            stats: TableStats::default(),
            docs_stats: None,
            embedding_models: None,
            indexing_state: IndexingState::InProgress,
        }
    }

    /// Load from `path`. Returns `None` on a semver-major mismatch or
    /// corruption — the caller should then treat the index as absent and
    /// rebuild.
    pub async fn load(path: &Path) -> Option<Self> {
        let bytes = tokio::fs::read(path).await.ok()?;
        match serde_json::from_slice::<Self>(&bytes) {
            Ok(meta) if major_version(&meta.version) == major_version(METADATA_SCHEMA_VERSION) => {
                Some(meta)
            }
            Ok(meta) => {
                log::warn!(
                    "metadata at {} has incompatible version {}, treating index as absent",
                    path.display(),
                    meta.version
                );
                None
            }
            Err(err) => {
                log::warn!("metadata at {} is corrupt ({err}), treating index as absent", path.display());
                None
            }
        }
    }

    pub async fn save(&self, path: &Path) -> Result<()> {
        atomic_write_json_pretty(path, self).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn layout_roots_under_hashed_project_path() {
        let indexes_root = PathBuf::from("/home/user/.mcp/search/indexes");
        let layout = IndexLayout::new(&indexes_root, Path::new("/home/user/proj"));
        assert!(layout.root().starts_with(&indexes_root));
        assert_eq!(layout.config_path(), layout.root().join("config.json"));
        assert_eq!(layout.code_table_dir(), layout.root().join("index.lancedb"));
        assert_eq!(layout.docs_table_dir(), layout.root().join("docs.lancedb"));
    }

    #[test]
    fn layout_is_stable_for_same_project() {
        let indexes_root = PathBuf::from("/x");
        let a = IndexLayout::new(&indexes_root, Path::new("/home/user/proj"));
        let b = IndexLayout::new(&indexes_root, Path::new("/home/user/proj"));
        assert_eq!(a.root(), b.root());
    }

    #[test]
    fn parses_plain_bytes() {
        assert_eq!(parse_human_size("1024"), Some(1024));
    }

    #[test]
    fn parses_human_readable_units() {
        assert_eq!(parse_human_size("1MB"), Some(1_000_000));
        assert_eq!(parse_human_size("512KB"), Some(512_000));
        assert_eq!(parse_human_size("2GB"), Some(2_000_000_000));
        assert_eq!(parse_human_size("10b"), Some(10));
        assert_eq!(parse_human_size("1 MB"), Some(1_000_000));
    }

    #[test]
    fn rejects_garbage() {
        assert_eq!(parse_human_size(""), None);
        assert_eq!(parse_human_size("not-a-size"), None);
    }

    #[tokio::test]
    async fn metadata_round_trips() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("metadata.json");
        let meta = IndexMetadata::new("/home/user/proj".to_string(), "2026-01-01T00:00:00Z".to_string());
        meta.save(&path).await.unwrap();

        let loaded = IndexMetadata::load(&path).await.unwrap();
        assert_eq!(loaded.project_path, "/home/user/proj");
        assert_eq!(loaded.indexing_state, IndexingState::InProgress);
    }

    #[tokio::test]
    async fn metadata_version_mismatch_treated_as_absent() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("metadata.json");
        tokio::fs::write(&path, br#"{"version":"99.0.0","projectPath":"/x","createdAt":"now","lastFullIndex":null,"stats":{"totalFiles":0,"totalChunks":0,"storageSizeBytes":0},"indexingState":"complete"}"#)
            .await
            .unwrap();
        assert!(IndexMetadata::load(&path).await.is_none());
    }

    #[tokio::test]
    async fn config_defaults_when_missing() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.json");
        let config = IndexConfig::load(&path).await;
        assert!(config.respect_gitignore);
        assert_eq!(config.max_file_size_bytes, 1024 * 1024);
    }
}
