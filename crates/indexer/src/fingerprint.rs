use crate::error::Result;
use context_fsutil::{atomic_write_json_pretty, hash_file};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

pub const FINGERPRINT_SCHEMA_VERSION: &str = "1.0.0";

#[derive(Debug, Clone, Serialize, Deserialize)]
struct FingerprintFile {
    version: String,
    fingerprints: BTreeMap<String, String>,
}

/// `path -> content_hash` map for one table (code or docs), persisted as a
/// single JSON file via atomic write-temp-then-rename.
#[derive(Debug, Clone, Default)]
pub struct FingerprintStore {
    fingerprints: BTreeMap<String, String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FingerprintDelta {
    pub added: Vec<String>,
    pub modified: Vec<String>,
    pub removed: Vec<String>,
    pub unchanged: Vec<String>,
}

impl FingerprintStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Load from `path`. On version mismatch or corruption, logs and
    /// returns an empty store rather than failing the caller.
    pub async fn load(path: &Path) -> Self {
        let Ok(bytes) = tokio::fs::read(path).await else {
            return Self::default();
        };
        match serde_json::from_slice::<FingerprintFile>(&bytes) {
            Ok(file) if major_version(&file.version) == major_version(FINGERPRINT_SCHEMA_VERSION) => {
                Self {
                    fingerprints: file.fingerprints,
                }
            }
            Ok(file) => {
                log::warn!(
                    "fingerprint store at {} has incompatible version {}, starting empty",
                    path.display(),
                    file.version
                );
                Self::default()
            }
            Err(err) => {
                log::warn!(
                    "fingerprint store at {} is corrupt ({err}), starting empty",
                    path.display()
                );
                Self::default()
            }
        }
    }

    pub async fn save(&self, path: &Path) -> Result<()> {
        let file = FingerprintFile {
            version: FINGERPRINT_SCHEMA_VERSION.to_string(),
            fingerprints: self.fingerprints.clone(),
        };
        atomic_write_json_pretty(path, &file).await?;
        Ok(())
    }

    #[must_use]
    pub fn get(&self, relative_path: &str) -> Option<&str> {
        self.fingerprints.get(relative_path).map(String::as_str)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.fingerprints.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.fingerprints.is_empty()
    }

    /// Compute `{added, modified, removed, unchanged}` against `current_files`
    /// (project-relative paths believed to exist on disk right now). A file
    /// that fails to hash (can't be read) is treated as added — its absence
    /// will be corrected by the next reconciliation pass.
    pub async fn delta(&self, current_files: &[String], project_root: &Path) -> FingerprintDelta {
        let mut delta = FingerprintDelta::default();
        let mut seen = std::collections::HashSet::new();

        for relative_path in current_files {
            seen.insert(relative_path.clone());
            let absolute = project_root.join(relative_path);
            match hash_file(&absolute).await {
                Ok(hash) => match self.fingerprints.get(relative_path) {
                    None => delta.added.push(relative_path.clone()),
                    Some(existing) if existing == &hash => delta.unchanged.push(relative_path.clone()),
                    Some(_) => delta.modified.push(relative_path.clone()),
                },
                Err(_) => delta.added.push(relative_path.clone()),
            }
        }

        for stored_path in self.fingerprints.keys() {
            if !seen.contains(stored_path) {
                delta.removed.push(stored_path.clone());
            }
        }

        delta
    }

    /// Apply a delta's removals/additions/modifications atomically in
    /// memory, given the freshly computed hashes for added/modified paths.
    /// Does not persist; call `save` afterward.
    pub fn update_from_delta(&mut self, delta: &FingerprintDelta, new_hashes: &BTreeMap<String, String>) {
        for path in &delta.removed {
            self.fingerprints.remove(path);
        }
        for path in delta.added.iter().chain(delta.modified.iter()) {
            if let Some(hash) = new_hashes.get(path) {
                self.fingerprints.insert(path.clone(), hash.clone());
            }
        }
    }

    /// Insert or overwrite a single path's hash (used by `update_file`).
    pub fn set(&mut self, relative_path: &str, content_hash: &str) {
        self.fingerprints
            .insert(relative_path.to_string(), content_hash.to_string());
    }

    /// Remove a single path's entry (used by `remove_file`).
    pub fn remove(&mut self, relative_path: &str) {
        self.fingerprints.remove(relative_path);
    }

    /// All currently tracked paths.
    #[must_use]
    pub fn paths(&self) -> Vec<String> {
        self.fingerprints.keys().cloned().collect()
    }
}

fn major_version(version: &str) -> &str {
    version.split('.').next().unwrap_or(version)
}
