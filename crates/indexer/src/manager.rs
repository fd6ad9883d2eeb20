use crate::error::{IndexerError, Result};
use crate::fingerprint::FingerprintStore;
use crate::policy::{IndexingPolicy, Table as PolicyTable};
use context_code_chunker::{Chunker, ChunkerConfig, DocsChunker, STREAMING_THRESHOLD_BYTES};
use context_fsutil::{hash_file, to_relative, IndexingLock};
use context_vector_store::{
    classify_document_kind, Domain, Embedder, EmbeddingTemplates, SearchHit, StoredChunk, VectorTable,
};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Files indexed per insert batch, per spec §4.8 step 4 ("batches of ~50
/// files' worth of chunks").
const FILES_PER_INSERT_BATCH: usize = 50;

/// Default texts-per-embed-call batch size (spec §4.8: "default 32-64").
const DEFAULT_EMBED_BATCH_SIZE: usize = 48;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TableKind {
    Code,
    Docs,
}

impl TableKind {
    const fn domain(self) -> Domain {
        match self {
            Self::Code => Domain::Code,
            Self::Docs => Domain::Docs,
        }
    }

    const fn policy_table(self) -> PolicyTable {
        match self {
            Self::Code => PolicyTable::Code,
            Self::Docs => PolicyTable::Docs,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct IndexProgress {
    pub files_processed: usize,
    pub files_total: usize,
    pub chunks_inserted: usize,
}

#[derive(Debug, Clone, Default)]
pub struct IndexStats {
    pub total_files: usize,
    pub total_chunks: usize,
    pub storage_size_bytes: u64,
}

/// Orchestrates scan → delta → chunk → embed → write for one table (code or
/// docs) of one project. `create_full_index`/`update_file`/`remove_file` are
/// the three write paths spec §4.8 names; all mutating operations run under
/// the shared, process-wide `indexing_lock`.
pub struct IndexManager {
    project_root: PathBuf,
    kind: TableKind,
    policy: Arc<IndexingPolicy>,
    vector_table: VectorTable,
    fingerprint_path: PathBuf,
    fingerprints: tokio::sync::RwLock<FingerprintStore>,
    embedder: Arc<dyn Embedder>,
    templates: EmbeddingTemplates,
    indexing_lock: Arc<IndexingLock>,
    max_files: usize,
}

impl IndexManager {
    pub async fn open(
        project_root: PathBuf,
        kind: TableKind,
        policy: Arc<IndexingPolicy>,
        vector_table: VectorTable,
        fingerprint_path: PathBuf,
        embedder: Arc<dyn Embedder>,
        templates: EmbeddingTemplates,
        indexing_lock: Arc<IndexingLock>,
        max_files: usize,
    ) -> Self {
        let fingerprints = FingerprintStore::load(&fingerprint_path).await;
        Self {
            project_root,
            kind,
            policy,
            vector_table,
            fingerprint_path,
            fingerprints: tokio::sync::RwLock::new(fingerprints),
            embedder,
            templates,
            indexing_lock,
            max_files,
        }
    }

    /// Full scan-and-rebuild. Reports progress via `on_progress` after each
    /// insert batch.
    pub async fn create_full_index(
        &self,
        mut on_progress: impl FnMut(IndexProgress),
    ) -> Result<()> {
        let project_path = self.project_root.to_string_lossy().to_string();
        let _guard = self
            .indexing_lock
            .try_acquire(&project_path)
            .ok_or_else(|| IndexerError::IndexingInProgress(project_path.clone()))?;

        let mut candidates = self.enumerate_candidates().await?;
        if candidates.len() > self.max_files {
            log::warn!(
                "project-too-large: {} candidate files exceeds max_files {}, truncating",
                candidates.len(),
                self.max_files
            );
            candidates.truncate(self.max_files);
        }

        let total = candidates.len();
        let mut fingerprints = FingerprintStore::new();
        let mut chunks_inserted = 0usize;

        for (batch_index, batch) in candidates.chunks(FILES_PER_INSERT_BATCH).enumerate() {
            let mut stored_chunks = Vec::new();
            let mut new_hashes = BTreeMap::new();

            for relative_path in batch {
                let absolute = self.project_root.join(relative_path);
                let Ok(hash) = hash_file(&absolute).await else {
                    log::warn!("skipping unreadable file during full index: {relative_path}");
                    continue;
                };
                new_hashes.insert(relative_path.clone(), hash.clone());

                match self.chunk_and_embed(relative_path, &absolute, &hash).await {
                    Ok(chunks) => stored_chunks.extend(chunks),
                    Err(err) => {
                        log::warn!("skipping {relative_path} after chunk/embed failure: {err}");
                    }
                }
            }

            self.vector_table.insert_chunks(&stored_chunks).await?;
            chunks_inserted += stored_chunks.len();
            for (path, hash) in &new_hashes {
                fingerprints.set(path, hash);
            }

            on_progress(IndexProgress {
                files_processed: ((batch_index + 1) * FILES_PER_INSERT_BATCH).min(total),
                files_total: total,
                chunks_inserted,
            });
        }

        fingerprints.save(&self.fingerprint_path).await?;
        *self.fingerprints.write().await = fingerprints;
        Ok(())
    }

    /// Apply the policy to a single file and reindex (or remove) it.
    pub async fn update_file(&self, relative_path: &str) -> Result<()> {
        let project_path = self.project_root.to_string_lossy().to_string();
        let _guard = self
            .indexing_lock
            .try_acquire(&project_path)
            .ok_or_else(|| IndexerError::IndexingInProgress(project_path.clone()))?;

        let absolute = self.project_root.join(relative_path);
        if !self.policy_allows(relative_path, &absolute) {
            self.vector_table.delete_by_path(relative_path).await?;
            self.fingerprints.write().await.remove(relative_path);
            return Ok(());
        }

        let hash = hash_file(&absolute).await?;
        let chunks = self.chunk_and_embed(relative_path, &absolute, &hash).await?;

        self.vector_table.delete_by_path(relative_path).await?;
        self.vector_table.insert_chunks(&chunks).await?;

        let mut fingerprints = self.fingerprints.write().await;
        fingerprints.set(relative_path, &hash);
        fingerprints.save(&self.fingerprint_path).await?;
        Ok(())
    }

    /// Remove a single file's chunks and fingerprint entry.
    pub async fn remove_file(&self, relative_path: &str) -> Result<()> {
        let project_path = self.project_root.to_string_lossy().to_string();
        let _guard = self
            .indexing_lock
            .try_acquire(&project_path)
            .ok_or_else(|| IndexerError::IndexingInProgress(project_path.clone()))?;

        self.vector_table.delete_by_path(relative_path).await?;
        let mut fingerprints = self.fingerprints.write().await;
        fingerprints.remove(relative_path);
        fingerprints.save(&self.fingerprint_path).await?;
        Ok(())
    }

    pub async fn stats(&self) -> Result<IndexStats> {
        Ok(IndexStats {
            total_files: self.vector_table.count_files().await?,
            total_chunks: self.vector_table.count_chunks().await?,
            storage_size_bytes: self.vector_table.get_storage_size().await?,
        })
    }

    pub async fn current_files(&self) -> Vec<String> {
        self.fingerprints.read().await.paths()
    }

    /// Flush in-memory fingerprint state to disk and close the vector
    /// table's backing connection. Part of the shutdown sequence.
    pub async fn close(&self) -> Result<()> {
        self.fingerprints.read().await.save(&self.fingerprint_path).await?;
        self.vector_table.close().await;
        Ok(())
    }

    /// Vector-similarity search against this table. The caller is
    /// responsible for embedding `query_vector` in the same domain as this
    /// table (`Domain::Code` for the code table, `Domain::Docs` for docs).
    pub async fn search(&self, query_vector: &[f32], top_k: usize) -> Result<Vec<SearchHit>> {
        Ok(self.vector_table.search(query_vector, top_k).await?)
    }

    /// Path-glob match against this table's `path` column. Per spec this is
    /// only ever called against the code table.
    pub async fn search_by_path(&self, glob_pattern: &str, limit: usize) -> Result<Vec<String>> {
        Ok(self.vector_table.search_by_path(glob_pattern, limit).await?)
    }

    /// The dimension of vectors already stored in this table, if any have
    /// been inserted yet.
    pub async fn table_dimension(&self) -> Option<usize> {
        self.vector_table.dimension().await
    }

    /// Diff `candidate_files` (paths the policy currently admits) against
    /// this manager's fingerprint store. Used by the integrity engine's
    /// drift-detection pass.
    pub async fn fingerprint_delta_against_disk(
        &self,
        candidate_files: &[String],
        project_root: &Path,
    ) -> crate::fingerprint::FingerprintDelta {
        self.fingerprints
            .read()
            .await
            .delta(candidate_files, project_root)
            .await
    }

    fn policy_allows(&self, relative_path: &str, absolute: &Path) -> bool {
        match self.kind.policy_table() {
            PolicyTable::Code => self.policy.should_index(relative_path, absolute),
            PolicyTable::Docs => self.policy.should_index_docs(relative_path, absolute),
        }
    }

    /// Walk the project and return every path the policy currently admits
    /// for this table. Used both by `create_full_index` and by the
    /// integrity engine's drift scan.
    pub async fn enumerate_candidates(&self) -> Result<Vec<String>> {
        let root = self.project_root.clone();
        let policy_table = self.kind.policy_table();
        let policy = Arc::clone(&self.policy);
        tokio::task::spawn_blocking(move || {
            let mut out = Vec::new();
            let walker = ignore::WalkBuilder::new(&root).hidden(false).git_ignore(true).build();
            for entry in walker.flatten() {
                if !entry.file_type().map(|t| t.is_file()).unwrap_or(false) {
                    continue;
                }
                let absolute = entry.path();
                let relative = to_relative(&root, absolute);
                let allowed = match policy_table {
                    PolicyTable::Code => policy.should_index(&relative, absolute),
                    PolicyTable::Docs => policy.should_index_docs(&relative, absolute),
                };
                if allowed {
                    out.push(relative);
                }
            }
            out
        })
        .await
        .map_err(|e| IndexerError::Other(format!("candidate enumeration panicked: {e}")))
    }

    async fn chunk_and_embed(
        &self,
        relative_path: &str,
        absolute: &Path,
        content_hash: &str,
    ) -> Result<Vec<StoredChunk>> {
        let file_len = tokio::fs::metadata(absolute)
            .await
            .map_err(|e| IndexerError::ReadError(format!("{relative_path}: {e}")))?
            .len();

        let raw_chunks = match self.kind {
            TableKind::Code if file_len >= STREAMING_THRESHOLD_BYTES => {
                Chunker::new(ChunkerConfig::for_embeddings()).chunk_file(absolute).await?
            }
            TableKind::Code => {
                let content = tokio::fs::read_to_string(absolute)
                    .await
                    .map_err(|e| IndexerError::ReadError(format!("{relative_path}: {e}")))?;
                Chunker::new(ChunkerConfig::for_embeddings()).chunk_str(&content, None)?
            }
            TableKind::Docs => {
                let content = tokio::fs::read_to_string(absolute)
                    .await
                    .map_err(|e| IndexerError::ReadError(format!("{relative_path}: {e}")))?;
                let is_markdown = relative_path.to_ascii_lowercase().ends_with(".md")
                    || relative_path.to_ascii_lowercase().ends_with(".mdx");
                DocsChunker::new().chunk_str(&content, is_markdown)?
            }
        };
        if raw_chunks.is_empty() {
            return Ok(Vec::new());
        }

        let doc_kind = classify_document_kind(relative_path);
        let mut texts = Vec::with_capacity(raw_chunks.len());
        for chunk in &raw_chunks {
            texts.push(
                self.templates
                    .render_doc_chunk(chunk, relative_path, doc_kind)
                    .map_err(|e| IndexerError::Other(e.to_string()))?,
            );
        }

        let mut vectors = Vec::with_capacity(texts.len());
        for batch in texts.chunks(DEFAULT_EMBED_BATCH_SIZE) {
            let embedded = self
                .embedder
                .embed(&batch.to_vec(), self.kind.domain())
                .await
                .map_err(|e| IndexerError::Other(format!("embedding failed: {e}")))?;
            vectors.extend(embedded);
        }
        if vectors.len() != raw_chunks.len() {
            return Err(IndexerError::Other(
                "embedder returned a different number of vectors than chunks".to_string(),
            ));
        }

        Ok(raw_chunks
            .into_iter()
            .zip(vectors)
            .map(|(chunk, vector)| StoredChunk {
                path: relative_path.to_string(),
                text: chunk.text,
                vector,
                start_line: chunk.start_line as i64,
                end_line: chunk.end_line as i64,
                content_hash: content_hash.to_string(),
            })
            .collect())
    }
}
