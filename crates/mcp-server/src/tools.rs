//! The eight-operation tool surface: `create_index`, `reindex_project`,
//! `reindex_file`, `delete_index`, `search_code`, `search_docs`,
//! `search_by_path`, `get_index_status`.

use crate::embedding::HashEmbedder;
use crate::error::{McpError, Result};
use crate::layout::{DocsStats, IndexConfig, IndexLayout, IndexMetadata, IndexingState, TableStats};
use crate::shutdown::ShutdownRegistry;
use context_fsutil::{safe_join, IndexingLock};
use context_indexer::{
    GitStrategy, IndexManager, IndexingPolicy, IndexingStrategy, IntegrityEngine, LazyStrategy,
    PolicyConfig, RealtimeStrategy, StrategyKind, StrategyOrchestrator, StrategyStats, TableKind,
};
use context_search::dedupe_same_file_hits;
use context_vector_store::{Domain, Embedder, EmbeddingTemplates, VectorTable};
use rmcp::handler::server::tool::ToolRouter;
use rmcp::handler::server::wrapper::Parameters;
use rmcp::model::{CallToolResult, Content, Implementation, ServerCapabilities, ServerInfo};
use rmcp::schemars;
use rmcp::{tool, tool_handler, tool_router, ErrorData as RmcpError, ServerHandler};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::RwLock;

const MAX_QUERY_CHARS: usize = 1024;
const MIN_TOP_K: usize = 1;
const MAX_TOP_K: usize = 50;
const MIN_PATH_LIMIT: usize = 1;
const MAX_PATH_LIMIT: usize = 100;
const CODE_TABLE_NAME: &str = "chunks";
const DOCS_TABLE_NAME: &str = "chunks";

fn now_rfc3339() -> String {
    chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Secs, true)
}

fn project_key(project_root: &Path) -> String {
    project_root.to_string_lossy().to_string()
}

async fn canonicalize_project(path: &str) -> Result<PathBuf> {
    tokio::fs::canonicalize(path)
        .await
        .map_err(|e| McpError::FileNotFound(format!("{path}: {e}")))
}

fn validate_query(query: &str) -> Result<()> {
    if query.is_empty() || query.chars().count() > MAX_QUERY_CHARS {
        return Err(McpError::InvalidQuery(format!(
            "query must be non-empty and at most {MAX_QUERY_CHARS} characters"
        )));
    }
    Ok(())
}

fn validate_top_k(top_k: usize) -> Result<usize> {
    if !(MIN_TOP_K..=MAX_TOP_K).contains(&top_k) {
        return Err(McpError::InvalidQuery(format!(
            "top_k must be between {MIN_TOP_K} and {MAX_TOP_K}"
        )));
    }
    Ok(top_k)
}

fn validate_path_limit(limit: usize) -> Result<usize> {
    if !(MIN_PATH_LIMIT..=MAX_PATH_LIMIT).contains(&limit) {
        return Err(McpError::InvalidPattern(format!(
            "limit must be between {MIN_PATH_LIMIT} and {MAX_PATH_LIMIT}"
        )));
    }
    Ok(limit)
}

fn validate_relative_path(project_root: &Path, relative_path: &str) -> Result<()> {
    safe_join(project_root, relative_path)
        .map(|_| ())
        .ok_or_else(|| McpError::PathTraversal(relative_path.to_string()))
}

/// One project's live state: managers, strategies, and the paths it was
/// opened with. Every mutating/searching tool goes through one of these.
struct ProjectHandle {
    project_root: PathBuf,
    layout: IndexLayout,
    config: IndexConfig,
    code_manager: Arc<IndexManager>,
    docs_manager: Option<Arc<IndexManager>>,
    code_orchestrator: Arc<StrategyOrchestrator>,
    docs_orchestrator: Option<Arc<StrategyOrchestrator>>,
}

impl ProjectHandle {
    /// Open (and optionally build) a project's index. `bootstrap` controls
    /// whether a fresh full index is built now (`create_index`) or whether
    /// this just attaches to whatever is already on disk.
    async fn open(
        project_root: PathBuf,
        layout: IndexLayout,
        config: IndexConfig,
        embedder: Arc<dyn Embedder>,
        indexing_lock: Arc<IndexingLock>,
        bootstrap: bool,
    ) -> Result<Self> {
        let policy_config = PolicyConfig {
            include_globs: config.include_globs.clone(),
            exclude_globs: config.exclude_globs.clone(),
            respect_gitignore: config.respect_gitignore,
            max_file_size_bytes: config.max_file_size_bytes,
            doc_patterns: config.doc_patterns.clone(),
            index_docs: config.index_docs,
        };
        let policy = Arc::new(IndexingPolicy::new(&project_root, policy_config));
        let templates = EmbeddingTemplates::default();
        let max_files = config.max_files.unwrap_or(usize::MAX);

        let code_table = VectorTable::open(&layout.code_table_dir(), CODE_TABLE_NAME).await?;
        let code_manager = Arc::new(
            IndexManager::open(
                project_root.clone(),
                TableKind::Code,
                Arc::clone(&policy),
                code_table,
                layout.fingerprints_path(),
                Arc::clone(&embedder),
                templates.clone(),
                Arc::clone(&indexing_lock),
                max_files,
            )
            .await,
        );

        let docs_manager = if config.index_docs {
            let docs_table = VectorTable::open(&layout.docs_table_dir(), DOCS_TABLE_NAME).await?;
            Some(Arc::new(
                IndexManager::open(
                    project_root.clone(),
                    TableKind::Docs,
                    Arc::clone(&policy),
                    docs_table,
                    layout.docs_fingerprints_path(),
                    Arc::clone(&embedder),
                    templates.clone(),
                    Arc::clone(&indexing_lock),
                    max_files,
                )
                .await,
            ))
        } else {
            None
        };

        if bootstrap {
            code_manager.create_full_index(|_progress| {}).await?;
            if let Some(docs_manager) = &docs_manager {
                docs_manager.create_full_index(|_progress| {}).await?;
            }
        }

        let code_orchestrator = Arc::new(StrategyOrchestrator::new());
        let strategy = start_strategy(
            &config.strategy,
            Arc::clone(&code_manager),
            project_root.clone(),
            &layout,
            config.lazy_idle_threshold_secs,
            true,
        )
        .await?;
        code_orchestrator.set_strategy(strategy).await;

        let docs_orchestrator = if let Some(docs_manager) = &docs_manager {
            let orchestrator = Arc::new(StrategyOrchestrator::new());
            let strategy = start_strategy(
                &config.strategy,
                Arc::clone(docs_manager),
                project_root.clone(),
                &layout,
                config.lazy_idle_threshold_secs,
                false,
            )
            .await?;
            orchestrator.set_strategy(strategy).await;
            Some(orchestrator)
        } else {
            None
        };

        spawn_startup_integrity_check(project_root.clone(), Arc::clone(&code_manager));
        if let Some(docs_manager) = &docs_manager {
            spawn_startup_integrity_check(project_root.clone(), Arc::clone(docs_manager));
        }

        Ok(Self {
            project_root,
            layout,
            config,
            code_manager,
            docs_manager,
            code_orchestrator,
            docs_orchestrator,
        })
    }

    /// LIFO teardown for one project: strategies stop first, then each
    /// table's manager flushes fingerprints and closes its connection.
    async fn close(&self) {
        self.stop_strategies().await;
        if let Err(err) = self.code_manager.close().await {
            log::warn!("failed to close code index for {}: {err}", self.project_root.display());
        }
        if let Some(docs_manager) = &self.docs_manager {
            if let Err(err) = docs_manager.close().await {
                log::warn!("failed to close docs index for {}: {err}", self.project_root.display());
            }
        }
    }

    async fn stop_strategies(&self) {
        self.code_orchestrator.stop().await;
        if let Some(orchestrator) = &self.docs_orchestrator {
            orchestrator.stop().await;
        }
    }

    async fn flush_if_lazy(&self, orchestrator: &Arc<StrategyOrchestrator>) -> Result<()> {
        if orchestrator.kind().await == Some(StrategyKind::Lazy) {
            orchestrator.flush().await?;
        }
        Ok(())
    }

    async fn combined_stats(&self) -> Result<(TableStats, Option<DocsStats>)> {
        let code = self.code_manager.stats().await?;
        let stats = TableStats {
            total_files: code.total_files,
            total_chunks: code.total_chunks,
            storage_size_bytes: code.storage_size_bytes,
        };
        let docs_stats = match &self.docs_manager {
            Some(manager) => {
                let docs = manager.stats().await?;
                Some(DocsStats {
                    total_docs: docs.total_files,
                    total_doc_chunks: docs.total_chunks,
                    docs_storage_size_bytes: docs.storage_size_bytes,
                })
            }
            None => None,
        };
        Ok((stats, docs_stats))
    }
}

/// Reconcile one table against disk in the background. Runs regardless of
/// the active strategy: an interrupted build or out-of-band disk edits made
/// while the process wasn't running are only ever healed here, since `git`
/// is the only strategy that otherwise re-checks drift on its own, and only
/// in response to commits.
fn spawn_startup_integrity_check(project_root: PathBuf, manager: Arc<IndexManager>) {
    tokio::spawn(async move {
        let integrity = IntegrityEngine::new(project_root.clone(), manager);
        let drift = match integrity.detect_drift().await {
            Ok(drift) => drift,
            Err(err) => {
                log::warn!("startup integrity check failed for {}: {err}", project_root.display());
                return;
            }
        };
        if drift.is_empty() {
            return;
        }
        log::info!(
            "startup integrity check found {} drifted file(s) in {}, reconciling",
            drift.event_count(),
            project_root.display()
        );
        if let Err(err) = integrity.reconcile(&drift).await {
            log::warn!("startup integrity reconcile failed for {}: {err}", project_root.display());
        }
    });
}

/// Build the strategy named by `strategy_name` ("realtime" | "lazy" | "git"),
/// falling back to `lazy` for an unrecognized name or a `git` request in a
/// non-git project.
async fn start_strategy(
    strategy_name: &str,
    manager: Arc<IndexManager>,
    project_root: PathBuf,
    layout: &IndexLayout,
    lazy_idle_threshold_secs: u64,
    persist_dirty_files: bool,
) -> Result<Arc<dyn IndexingStrategy>> {
    let idle = std::time::Duration::from_secs(lazy_idle_threshold_secs);
    match strategy_name {
        "realtime" => {
            let strategy = RealtimeStrategy::start(manager, project_root)?;
            Ok(strategy as Arc<dyn IndexingStrategy>)
        }
        "git" => {
            let integrity = Arc::new(IntegrityEngine::new(project_root.clone(), manager));
            match GitStrategy::start(project_root.clone(), integrity) {
                Ok(strategy) => Ok(strategy as Arc<dyn IndexingStrategy>),
                Err(err) => {
                    log::warn!("git strategy unavailable ({err}), falling back to lazy");
                    let dirty_path = persist_dirty_files.then(|| layout.dirty_files_path());
                    let strategy = LazyStrategy::start(manager, project_root, Some(idle), dirty_path).await?;
                    Ok(strategy as Arc<dyn IndexingStrategy>)
                }
            }
        }
        _ => {
            let dirty_path = persist_dirty_files.then(|| layout.dirty_files_path());
            let strategy = LazyStrategy::start(manager, project_root, Some(idle), dirty_path).await?;
            Ok(strategy as Arc<dyn IndexingStrategy>)
        }
    }
}

#[derive(Clone)]
pub struct ContextFinderService {
    projects: Arc<RwLock<HashMap<String, Arc<ProjectHandle>>>>,
    indexing_lock: Arc<IndexingLock>,
    embedder: Arc<dyn Embedder>,
    shutdown: Arc<ShutdownRegistry>,
    tool_router: ToolRouter<Self>,
}

impl ContextFinderService {
    #[must_use]
    pub fn new() -> Self {
        Self {
            projects: Arc::new(RwLock::new(HashMap::new())),
            indexing_lock: Arc::new(IndexingLock::new()),
            embedder: Arc::new(HashEmbedder::new()),
            shutdown: Arc::new(ShutdownRegistry::new()),
            tool_router: Self::tool_router(),
        }
    }

    #[must_use]
    pub fn shutdown_registry(&self) -> Arc<ShutdownRegistry> {
        Arc::clone(&self.shutdown)
    }

    /// Register the LIFO cleanup step that tears down every attached
    /// project on shutdown. Call once after construction.
    pub async fn install_shutdown_hook(&self) {
        let projects = Arc::clone(&self.projects);
        self.shutdown
            .register(move || async move {
                let mut projects = projects.write().await;
                for (_, handle) in projects.drain() {
                    handle.close().await;
                }
            })
            .await;
    }

    /// Find an already-attached project, or attach to one that already has
    /// an on-disk index but hasn't been opened by this process yet.
    async fn attach(&self, project_root: &Path) -> Result<Arc<ProjectHandle>> {
        let key = project_key(project_root);
        if let Some(handle) = self.projects.read().await.get(&key) {
            return Ok(Arc::clone(handle));
        }

        let layout = IndexLayout::for_project(project_root)?;
        if !layout.exists() {
            return Err(McpError::IndexNotFound(key));
        }
        let config = IndexConfig::load(&layout.config_path()).await;
        let handle = Arc::new(
            ProjectHandle::open(
                project_root.to_path_buf(),
                layout,
                config,
                Arc::clone(&self.embedder),
                Arc::clone(&self.indexing_lock),
                false,
            )
            .await?,
        );
        self.projects.write().await.insert(key, Arc::clone(&handle));
        Ok(handle)
    }

    async fn create_index_inner(&self, request: CreateIndexRequest) -> Result<IndexStatusResponse> {
        let project_root = canonicalize_project(&request.project_path).await?;
        let layout = IndexLayout::for_project(&project_root)?;
        if layout.exists() {
            return Err(McpError::IndexExists(project_key(&project_root)));
        }

        let max_file_size_bytes = match &request.max_file_size {
            Some(raw) => crate::layout::parse_human_size(raw)
                .ok_or_else(|| McpError::InvalidQuery(format!("invalid max_file_size: {raw}")))?,
            None => IndexConfig::default().max_file_size_bytes,
        };
        let config = IndexConfig {
            include_globs: request.include_globs.unwrap_or_default(),
            exclude_globs: request.exclude_globs.unwrap_or_default(),
            respect_gitignore: request.respect_gitignore.unwrap_or(true),
            max_file_size_bytes,
            max_files: request.max_files,
            doc_patterns: request.doc_patterns.unwrap_or_else(|| IndexConfig::default().doc_patterns),
            index_docs: request.index_docs.unwrap_or(true),
            strategy: request.strategy.unwrap_or_else(|| "lazy".to_string()),
            lazy_idle_threshold_secs: request.lazy_idle_threshold_secs.unwrap_or(30),
        };
        config.save(&layout.config_path()).await?;

        // Recorded before the build starts: if the process dies mid-build, the
        // on-disk metadata still says `in_progress` so a restart can tell the
        // index is incomplete rather than treating a half-built table as done.
        let key = project_key(&project_root);
        let mut metadata = IndexMetadata::new(key.clone(), now_rfc3339());
        metadata.indexing_state = IndexingState::InProgress;
        metadata.save(&layout.metadata_path()).await?;

        let handle = ProjectHandle::open(
            project_root.clone(),
            layout.clone(),
            config.clone(),
            Arc::clone(&self.embedder),
            Arc::clone(&self.indexing_lock),
            true,
        )
        .await?;

        let (stats, docs_stats) = handle.combined_stats().await?;
        metadata.last_full_index = Some(now_rfc3339());
        metadata.stats = stats.clone();
        metadata.docs_stats = docs_stats.clone();
        metadata.indexing_state = IndexingState::Complete;
        metadata.save(&layout.metadata_path()).await?;

        self.projects
            .write()
            .await
            .insert(project_key(&project_root), Arc::new(handle));

        Ok(IndexStatusResponse {
            project_path: project_key(&project_root),
            indexing_state: metadata.indexing_state,
            stats,
            docs_stats,
            strategy: config.strategy,
            strategy_stats: None,
        })
    }

    async fn reindex_project_inner(&self, request: ProjectPathRequest) -> Result<IndexStatusResponse> {
        let project_root = canonicalize_project(&request.project_path).await?;
        let key = project_key(&project_root);
        let layout = IndexLayout::for_project(&project_root)?;
        if !layout.exists() {
            return Err(McpError::IndexNotFound(key));
        }
        let config = IndexConfig::load(&layout.config_path()).await;

        if let Some(old) = self.projects.write().await.remove(&key) {
            old.stop_strategies().await;
        }

        let code_table = VectorTable::open(&layout.code_table_dir(), CODE_TABLE_NAME).await?;
        code_table.delete().await?;
        if config.index_docs {
            let docs_table = VectorTable::open(&layout.docs_table_dir(), DOCS_TABLE_NAME).await?;
            docs_table.delete().await?;
        }

        let mut metadata = IndexMetadata::load(&layout.metadata_path())
            .await
            .unwrap_or_else(|| IndexMetadata::new(key.clone(), now_rfc3339()));
        metadata.indexing_state = IndexingState::InProgress;
        metadata.save(&layout.metadata_path()).await?;

        let handle = ProjectHandle::open(
            project_root.clone(),
            layout.clone(),
            config.clone(),
            Arc::clone(&self.embedder),
            Arc::clone(&self.indexing_lock),
            true,
        )
        .await?;

        let (stats, docs_stats) = handle.combined_stats().await?;
        metadata.last_full_index = Some(now_rfc3339());
        metadata.stats = stats.clone();
        metadata.docs_stats = docs_stats.clone();
        metadata.indexing_state = IndexingState::Complete;
        metadata.save(&layout.metadata_path()).await?;

        self.projects.write().await.insert(key.clone(), Arc::new(handle));

        Ok(IndexStatusResponse {
            project_path: key,
            indexing_state: metadata.indexing_state,
            stats,
            docs_stats,
            strategy: config.strategy,
            strategy_stats: None,
        })
    }

    async fn reindex_file_inner(&self, request: ReindexFileRequest) -> Result<FileOpResponse> {
        let project_root = canonicalize_project(&request.project_path).await?;
        validate_relative_path(&project_root, &request.relative_path)?;
        let handle = self.attach(&project_root).await?;

        handle.code_manager.update_file(&request.relative_path).await?;
        if let Some(docs_manager) = &handle.docs_manager {
            docs_manager.update_file(&request.relative_path).await?;
        }

        let layout = IndexLayout::for_project(&project_root)?;
        if let Some(mut metadata) = IndexMetadata::load(&layout.metadata_path()).await {
            metadata.last_incremental_update = Some(now_rfc3339());
            let (stats, docs_stats) = handle.combined_stats().await?;
            metadata.stats = stats;
            metadata.docs_stats = docs_stats;
            metadata.save(&layout.metadata_path()).await?;
        }

        Ok(FileOpResponse {
            project_path: project_key(&project_root),
            relative_path: request.relative_path,
        })
    }

    async fn delete_index_inner(&self, request: ProjectPathRequest) -> Result<DeleteIndexResponse> {
        let project_root = canonicalize_project(&request.project_path).await?;
        let key = project_key(&project_root);
        let layout = IndexLayout::for_project(&project_root)?;
        if !layout.exists() {
            return Err(McpError::IndexNotFound(key));
        }

        if let Some(handle) = self.projects.write().await.remove(&key) {
            handle.stop_strategies().await;
        }

        if tokio::fs::try_exists(layout.root()).await.unwrap_or(false) {
            tokio::fs::remove_dir_all(layout.root()).await.map_err(|e| {
                McpError::Internal(format!("failed to remove index at {}: {e}", layout.root().display()))
            })?;
        }

        Ok(DeleteIndexResponse { project_path: key, deleted: true })
    }

    async fn search_code_inner(&self, request: SearchRequest) -> Result<SearchResponse> {
        validate_query(&request.query)?;
        let top_k = validate_top_k(request.top_k.unwrap_or(10))?;
        let project_root = canonicalize_project(&request.project_path).await?;
        let handle = self.attach(&project_root).await?;

        handle.flush_if_lazy(&handle.code_orchestrator).await?;

        let query_vector = self
            .embedder
            .embed(&[request.query.clone()], Domain::Code)
            .await
            .map_err(McpError::from)?;
        let query_vector = query_vector
            .into_iter()
            .next()
            .ok_or_else(|| McpError::Internal("embedder returned no vectors".into()))?;

        if let Some(table_dim) = handle.code_manager.table_dimension().await {
            if table_dim != query_vector.len() {
                return Err(McpError::DimensionMismatch { query: query_vector.len(), table: table_dim });
            }
        }

        let hits = handle.code_manager.search(&query_vector, top_k).await?;
        let hits = dedupe_same_file_hits(hits);
        Ok(SearchResponse { results: hits.into_iter().map(SearchResultItem::from).collect() })
    }

    async fn search_docs_inner(&self, request: SearchRequest) -> Result<SearchResponse> {
        validate_query(&request.query)?;
        let top_k = validate_top_k(request.top_k.unwrap_or(10))?;
        let project_root = canonicalize_project(&request.project_path).await?;
        let handle = self.attach(&project_root).await?;

        let docs_manager = handle
            .docs_manager
            .as_ref()
            .ok_or_else(|| McpError::DocsIndexNotFound(project_key(&project_root)))?;
        if let Some(orchestrator) = &handle.docs_orchestrator {
            handle.flush_if_lazy(orchestrator).await?;
        }

        let query_vector = self
            .embedder
            .embed(&[request.query.clone()], Domain::Docs)
            .await
            .map_err(McpError::from)?;
        let query_vector = query_vector
            .into_iter()
            .next()
            .ok_or_else(|| McpError::Internal("embedder returned no vectors".into()))?;

        if let Some(table_dim) = docs_manager.table_dimension().await {
            if table_dim != query_vector.len() {
                return Err(McpError::DimensionMismatch { query: query_vector.len(), table: table_dim });
            }
        }

        let hits = docs_manager.search(&query_vector, top_k).await?;
        let hits = dedupe_same_file_hits(hits);
        Ok(SearchResponse { results: hits.into_iter().map(SearchResultItem::from).collect() })
    }

    async fn search_by_path_inner(&self, request: SearchByPathRequest) -> Result<PathSearchResponse> {
        let limit = validate_path_limit(request.limit.unwrap_or(20))?;
        let project_root = canonicalize_project(&request.project_path).await?;
        let handle = self.attach(&project_root).await?;
        let paths = handle.code_manager.search_by_path(&request.pattern, limit).await?;
        Ok(PathSearchResponse { paths })
    }

    async fn get_index_status_inner(&self, request: ProjectPathRequest) -> Result<IndexStatusResponse> {
        let project_root = canonicalize_project(&request.project_path).await?;
        let key = project_key(&project_root);
        let layout = IndexLayout::for_project(&project_root)?;
        let metadata = IndexMetadata::load(&layout.metadata_path())
            .await
            .ok_or_else(|| McpError::IndexNotFound(key.clone()))?;

        let handle = self.projects.read().await.get(&key).cloned();
        let (stats, docs_stats, strategy, strategy_stats) = match &handle {
            Some(handle) => {
                let (stats, docs_stats) = handle.combined_stats().await?;
                let strategy_stats = handle.code_orchestrator.stats().await;
                (stats, docs_stats, handle.config.strategy.clone(), strategy_stats)
            }
            None => (metadata.stats.clone(), metadata.docs_stats.clone(), "unknown".to_string(), None),
        };

        Ok(IndexStatusResponse {
            project_path: key,
            indexing_state: metadata.indexing_state,
            stats,
            docs_stats,
            strategy,
            strategy_stats: strategy_stats.map(StrategyStatsView::from),
        })
    }
}

impl Default for ContextFinderService {
    fn default() -> Self {
        Self::new()
    }
}

fn to_call_result<T: Serialize>(result: Result<T>) -> CallToolResult {
    match result {
        Ok(value) => CallToolResult::success(vec![Content::text(
            serde_json::to_string_pretty(&value).unwrap_or_default(),
        )]),
        Err(err) => {
            log::warn!("tool call failed: {err}");
            CallToolResult::error(vec![Content::text(err.envelope_json())])
        }
    }
}

#[tool_handler]
impl ServerHandler for ContextFinderService {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            instructions: Some(
                "Local-first semantic code search. Create an index for a project, then search it \
                 with natural-language queries against code or docs, or glob-match file paths."
                    .into(),
            ),
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            server_info: Implementation::from_build_env(),
            ..Default::default()
        }
    }
}

#[derive(Debug, Deserialize, schemars::JsonSchema)]
pub struct CreateIndexRequest {
    #[schemars(description = "Absolute or relative path to the project root")]
    pub project_path: String,
    #[schemars(description = "Glob patterns to additionally include")]
    pub include_globs: Option<Vec<String>>,
    #[schemars(description = "Glob patterns to exclude")]
    pub exclude_globs: Option<Vec<String>>,
    #[schemars(description = "Respect .gitignore (default true)")]
    pub respect_gitignore: Option<bool>,
    #[schemars(description = "Maximum indexed file size, e.g. \"1MB\" or a byte count")]
    pub max_file_size: Option<String>,
    #[schemars(description = "Soft cap on the number of candidate files")]
    pub max_files: Option<usize>,
    #[schemars(description = "Glob patterns identifying documentation files")]
    pub doc_patterns: Option<Vec<String>>,
    #[schemars(description = "Whether to build a separate documentation index (default true)")]
    pub index_docs: Option<bool>,
    #[schemars(description = "Indexing strategy: \"realtime\", \"lazy\", or \"git\" (default \"lazy\")")]
    pub strategy: Option<String>,
    #[schemars(description = "Idle seconds before the lazy strategy flushes (default 30)")]
    pub lazy_idle_threshold_secs: Option<u64>,
}

#[derive(Debug, Deserialize, schemars::JsonSchema)]
pub struct ProjectPathRequest {
    #[schemars(description = "Absolute or relative path to the project root")]
    pub project_path: String,
}

#[derive(Debug, Deserialize, schemars::JsonSchema)]
pub struct ReindexFileRequest {
    #[schemars(description = "Absolute or relative path to the project root")]
    pub project_path: String,
    #[schemars(description = "Path to the file, relative to the project root")]
    pub relative_path: String,
}

#[derive(Debug, Deserialize, schemars::JsonSchema)]
pub struct SearchRequest {
    #[schemars(description = "Absolute or relative path to the project root")]
    pub project_path: String,
    #[schemars(description = "Natural-language query, 1-1024 characters")]
    pub query: String,
    #[schemars(description = "Maximum results to return, 1-50 (default 10)")]
    pub top_k: Option<usize>,
}

#[derive(Debug, Deserialize, schemars::JsonSchema)]
pub struct SearchByPathRequest {
    #[schemars(description = "Absolute or relative path to the project root")]
    pub project_path: String,
    #[schemars(description = "Glob pattern to match indexed file paths against")]
    pub pattern: String,
    #[schemars(description = "Maximum paths to return, 1-100 (default 20)")]
    pub limit: Option<usize>,
}

#[derive(Debug, Serialize, schemars::JsonSchema)]
pub struct FileOpResponse {
    pub project_path: String,
    pub relative_path: String,
}

#[derive(Debug, Serialize, schemars::JsonSchema)]
pub struct DeleteIndexResponse {
    pub project_path: String,
    pub deleted: bool,
}

#[derive(Debug, Serialize, schemars::JsonSchema)]
pub struct SearchResultItem {
    pub path: String,
    pub text: String,
    pub score: f32,
    pub start_line: i64,
    pub end_line: i64,
}

impl From<context_vector_store::SearchHit> for SearchResultItem {
    fn from(hit: context_vector_store::SearchHit) -> Self {
        Self {
            path: hit.path,
            text: hit.text,
            score: hit.score,
            start_line: hit.start_line,
            end_line: hit.end_line,
        }
    }
}

#[derive(Debug, Serialize, schemars::JsonSchema)]
pub struct SearchResponse {
    pub results: Vec<SearchResultItem>,
}

#[derive(Debug, Serialize, schemars::JsonSchema)]
pub struct PathSearchResponse {
    pub paths: Vec<String>,
}

#[derive(Debug, Serialize, schemars::JsonSchema)]
pub struct StrategyStatsView {
    pub events_observed: u64,
    pub files_reindexed: u64,
    pub errors: u64,
}

impl From<StrategyStats> for StrategyStatsView {
    fn from(stats: StrategyStats) -> Self {
        Self {
            events_observed: stats.events_observed,
            files_reindexed: stats.files_reindexed,
            errors: stats.errors,
        }
    }
}

#[derive(Debug, Serialize, schemars::JsonSchema)]
pub struct IndexStatusResponse {
    pub project_path: String,
    pub indexing_state: IndexingState,
    pub stats: TableStats,
    pub docs_stats: Option<DocsStats>,
    pub strategy: String,
    pub strategy_stats: Option<StrategyStatsView>,
}

#[tool_router]
impl ContextFinderService {
    #[tool(description = "Build a new semantic index for a project. Fails if an index already exists.")]
    pub async fn create_index(
        &self,
        Parameters(request): Parameters<CreateIndexRequest>,
    ) -> std::result::Result<CallToolResult, RmcpError> {
        Ok(to_call_result(self.create_index_inner(request).await))
    }

    #[tool(description = "Delete and rebuild a project's index from scratch.")]
    pub async fn reindex_project(
        &self,
        Parameters(request): Parameters<ProjectPathRequest>,
    ) -> std::result::Result<CallToolResult, RmcpError> {
        Ok(to_call_result(self.reindex_project_inner(request).await))
    }

    #[tool(description = "Reindex a single file within an already-indexed project.")]
    pub async fn reindex_file(
        &self,
        Parameters(request): Parameters<ReindexFileRequest>,
    ) -> std::result::Result<CallToolResult, RmcpError> {
        Ok(to_call_result(self.reindex_file_inner(request).await))
    }

    #[tool(description = "Stop the active strategy and remove a project's index from disk.")]
    pub async fn delete_index(
        &self,
        Parameters(request): Parameters<ProjectPathRequest>,
    ) -> std::result::Result<CallToolResult, RmcpError> {
        Ok(to_call_result(self.delete_index_inner(request).await))
    }

    #[tool(description = "Search indexed source code with a natural-language query.")]
    pub async fn search_code(
        &self,
        Parameters(request): Parameters<SearchRequest>,
    ) -> std::result::Result<CallToolResult, RmcpError> {
        Ok(to_call_result(self.search_code_inner(request).await))
    }

    #[tool(description = "Search indexed documentation with a natural-language query.")]
    pub async fn search_docs(
        &self,
        Parameters(request): Parameters<SearchRequest>,
    ) -> std::result::Result<CallToolResult, RmcpError> {
        Ok(to_call_result(self.search_docs_inner(request).await))
    }

    #[tool(description = "Glob-match indexed file paths in the code table.")]
    pub async fn search_by_path(
        &self,
        Parameters(request): Parameters<SearchByPathRequest>,
    ) -> std::result::Result<CallToolResult, RmcpError> {
        Ok(to_call_result(self.search_by_path_inner(request).await))
    }

    #[tool(description = "Return a project's index metadata and active strategy stats.")]
    pub async fn get_index_status(
        &self,
        Parameters(request): Parameters<ProjectPathRequest>,
    ) -> std::result::Result<CallToolResult, RmcpError> {
        Ok(to_call_result(self.get_index_status_inner(request).await))
    }
}
