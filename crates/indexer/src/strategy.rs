use crate::error::Result;
use crate::integrity::IntegrityEngine;
use crate::manager::IndexManager;
use async_trait::async_trait;
use context_fsutil::to_relative;
use log::{info, warn};
use notify::{Config as NotifyConfig, Event, RecommendedWatcher, RecursiveMode, Watcher};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, Mutex};
use tokio::time::Instant;

/// Quiet interval a realtime watcher waits after the last event on a path
/// before reindexing it.
const REALTIME_DEBOUNCE_MIN: Duration = Duration::from_millis(300);
const REALTIME_DEBOUNCE_MAX: Duration = Duration::from_millis(500);

/// Default idle flush interval for the lazy strategy.
const DEFAULT_LAZY_IDLE: Duration = Duration::from_secs(30);

/// Debounce for git ref-log watches; a rebase or merge touches the log
/// several times in quick succession.
const GIT_DEBOUNCE: Duration = Duration::from_secs(2);

#[derive(Clone, Copy, PartialEq, Eq)]
pub enum StrategyKind {
    Realtime,
    Lazy,
    Git,
}

#[derive(Debug, Clone, Default)]
pub struct StrategyStats {
    pub events_observed: u64,
    pub files_reindexed: u64,
    pub errors: u64,
}

/// Common surface every indexing strategy implements. `flush` forces any
/// buffered work to run now; `stop` tears the strategy down (stopping file
/// watchers, cancelling timers) and must be safe to call more than once.
#[async_trait]
pub trait IndexingStrategy: Send + Sync {
    async fn flush(&self) -> Result<()>;
    async fn stop(&self);
    fn stats(&self) -> StrategyStats;
    fn kind(&self) -> StrategyKind;
}

/// Per-path debounced watcher: a filesystem event on a path resets that
/// path's timer; the file is reindexed only once `REALTIME_DEBOUNCE_MIN`..
/// `REALTIME_DEBOUNCE_MAX` has passed with no further events on it.
pub struct RealtimeStrategy {
    manager: Arc<IndexManager>,
    project_root: PathBuf,
    _watcher: std::sync::Mutex<Option<RecommendedWatcher>>,
    shutdown_tx: mpsc::Sender<()>,
    events_observed: AtomicU64,
    files_reindexed: AtomicU64,
    errors: AtomicU64,
}

impl RealtimeStrategy {
    pub fn start(manager: Arc<IndexManager>, project_root: PathBuf) -> Result<Arc<Self>> {
        let (event_tx, mut event_rx) = mpsc::channel::<notify::Result<Event>>(1024);
        let (shutdown_tx, mut shutdown_rx) = mpsc::channel::<()>(1);

        let watcher_manager = Arc::clone(&manager);
        let watcher_root = project_root.clone();
        let mut watcher: RecommendedWatcher = RecommendedWatcher::new(
            move |res| {
                let _ = event_tx.blocking_send(res);
            },
            NotifyConfig::default(),
        )
        .map_err(|e| crate::error::IndexerError::Other(format!("failed to start watcher: {e}")))?;
        watcher
            .watch(&project_root, RecursiveMode::Recursive)
            .map_err(|e| crate::error::IndexerError::Other(format!("failed to watch {}: {e}", project_root.display())))?;

        let strategy = Arc::new(Self {
            manager: watcher_manager,
            project_root: watcher_root,
            _watcher: std::sync::Mutex::new(Some(watcher)),
            shutdown_tx,
            events_observed: AtomicU64::new(0),
            files_reindexed: AtomicU64::new(0),
            errors: AtomicU64::new(0),
        });

        let loop_strategy = Arc::clone(&strategy);
        tokio::spawn(async move {
            let mut pending: std::collections::HashMap<String, Instant> = std::collections::HashMap::new();
            loop {
                tokio::select! {
                    _ = shutdown_rx.recv() => break,
                    maybe_event = event_rx.recv() => {
                        let Some(event) = maybe_event else { break };
                        loop_strategy.absorb_event(event, &mut pending);
                    }
                    () = tokio::time::sleep(REALTIME_DEBOUNCE_MIN) => {
                        loop_strategy.drain_ready(&mut pending).await;
                    }
                }
            }
        });

        Ok(strategy)
    }

    fn absorb_event(&self, event: notify::Result<Event>, pending: &mut std::collections::HashMap<String, Instant>) {
        self.events_observed.fetch_add(1, Ordering::Relaxed);
        let event = match event {
            Ok(e) => e,
            Err(err) => {
                warn!("filesystem watcher error: {err}");
                self.errors.fetch_add(1, Ordering::Relaxed);
                return;
            }
        };
        for path in event.paths {
            if !is_relevant_path(&self.project_root, &path) {
                continue;
            }
            let relative = to_relative(&self.project_root, &path);
            pending.insert(relative, Instant::now() + REALTIME_DEBOUNCE_MAX);
        }
    }

    async fn drain_ready(&self, pending: &mut std::collections::HashMap<String, Instant>) {
        let now = Instant::now();
        let ready: Vec<String> = pending
            .iter()
            .filter(|(_, deadline)| **deadline <= now)
            .map(|(path, _)| path.clone())
            .collect();
        for relative in ready {
            pending.remove(&relative);
            self.reindex_one(&relative).await;
        }
    }

    async fn reindex_one(&self, relative_path: &str) {
        let absolute = self.project_root.join(relative_path);
        let result = if absolute.exists() {
            self.manager.update_file(relative_path).await
        } else {
            self.manager.remove_file(relative_path).await
        };
        match result {
            Ok(()) => {
                self.files_reindexed.fetch_add(1, Ordering::Relaxed);
            }
            Err(err) => {
                warn!("realtime reindex of {relative_path} failed: {err}");
                self.errors.fetch_add(1, Ordering::Relaxed);
            }
        }
    }
}

#[async_trait]
impl IndexingStrategy for RealtimeStrategy {
    async fn flush(&self) -> Result<()> {
        Ok(())
    }

    async fn stop(&self) {
        let _ = self.shutdown_tx.send(()).await;
    }

    fn stats(&self) -> StrategyStats {
        StrategyStats {
            events_observed: self.events_observed.load(Ordering::Relaxed),
            files_reindexed: self.files_reindexed.load(Ordering::Relaxed),
            errors: self.errors.load(Ordering::Relaxed),
        }
    }

    fn kind(&self) -> StrategyKind {
        StrategyKind::Realtime
    }
}

struct DirtySet {
    changed: HashSet<String>,
    removed: HashSet<String>,
}

const DIRTY_FILES_SCHEMA_VERSION: &str = "1.0.0";

/// Marker prefix used for a removed path inside `dirty-files.json`, per
/// spec §6's `path | "__deleted__:path"` union.
const DELETED_PREFIX: &str = "__deleted__:";

#[derive(serde::Serialize, serde::Deserialize, Default)]
struct DirtyFilesFile {
    version: String,
    dirty_files: Vec<String>,
}

fn encode_dirty_set(dirty: &DirtySet) -> Vec<String> {
    let mut out: Vec<String> = dirty.changed.iter().cloned().collect();
    out.extend(dirty.removed.iter().map(|p| format!("{DELETED_PREFIX}{p}")));
    out.sort();
    out
}

fn decode_dirty_set(entries: Vec<String>) -> DirtySet {
    let mut changed = HashSet::new();
    let mut removed = HashSet::new();
    for entry in entries {
        match entry.strip_prefix(DELETED_PREFIX) {
            Some(path) => {
                removed.insert(path.to_string());
            }
            None => {
                changed.insert(entry);
            }
        }
    }
    DirtySet { changed, removed }
}

async fn load_dirty_set(path: &Path) -> DirtySet {
    let Ok(bytes) = tokio::fs::read(path).await else {
        return DirtySet {
            changed: HashSet::new(),
            removed: HashSet::new(),
        };
    };
    match serde_json::from_slice::<DirtyFilesFile>(&bytes) {
        Ok(file) => decode_dirty_set(file.dirty_files),
        Err(err) => {
            warn!("dirty-files store at {} is corrupt ({err}), starting empty", path.display());
            DirtySet {
                changed: HashSet::new(),
                removed: HashSet::new(),
            }
        }
    }
}

async fn save_dirty_set(path: &Path, dirty: &DirtySet) -> Result<()> {
    let file = DirtyFilesFile {
        version: DIRTY_FILES_SCHEMA_VERSION.to_string(),
        dirty_files: encode_dirty_set(dirty),
    };
    context_fsutil::atomic_write_json_pretty(path, &file)
        .await
        .map_err(crate::error::IndexerError::Fsutil)
}

/// Routes filesystem events into a persistent dirty-files set instead of
/// reacting to each one; an idle timer (default 30s) calls `flush`, which
/// applies removals then changes under a single lock so a burst of edits
/// costs one reindex pass, not one per file. The set is mirrored to
/// `dirty_files_path` (spec §6's `dirty-files.json`) after every mutation so
/// a crash between edits and the next idle flush doesn't lose track of what
/// changed.
pub struct LazyStrategy {
    manager: Arc<IndexManager>,
    project_root: PathBuf,
    dirty: Mutex<DirtySet>,
    dirty_files_path: Option<PathBuf>,
    _watcher: std::sync::Mutex<Option<RecommendedWatcher>>,
    shutdown_tx: mpsc::Sender<()>,
    events_observed: AtomicU64,
    files_reindexed: AtomicU64,
    errors: AtomicU64,
}

impl LazyStrategy {
    pub async fn start(
        manager: Arc<IndexManager>,
        project_root: PathBuf,
        idle_interval: Option<Duration>,
        dirty_files_path: Option<PathBuf>,
    ) -> Result<Arc<Self>> {
        let (event_tx, mut event_rx) = mpsc::channel::<notify::Result<Event>>(1024);
        let (shutdown_tx, mut shutdown_rx) = mpsc::channel::<()>(1);

        let mut watcher: RecommendedWatcher = RecommendedWatcher::new(
            move |res| {
                let _ = event_tx.blocking_send(res);
            },
            NotifyConfig::default(),
        )
        .map_err(|e| crate::error::IndexerError::Other(format!("failed to start watcher: {e}")))?;
        watcher
            .watch(&project_root, RecursiveMode::Recursive)
            .map_err(|e| crate::error::IndexerError::Other(format!("failed to watch {}: {e}", project_root.display())))?;

        let initial_dirty = match &dirty_files_path {
            Some(path) => load_dirty_set(path).await,
            None => DirtySet {
                changed: HashSet::new(),
                removed: HashSet::new(),
            },
        };

        let strategy = Arc::new(Self {
            manager,
            project_root,
            dirty: Mutex::new(initial_dirty),
            dirty_files_path,
            _watcher: std::sync::Mutex::new(Some(watcher)),
            shutdown_tx,
            events_observed: AtomicU64::new(0),
            files_reindexed: AtomicU64::new(0),
            errors: AtomicU64::new(0),
        });

        let idle = idle_interval.unwrap_or(DEFAULT_LAZY_IDLE);
        let loop_strategy = Arc::clone(&strategy);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(idle);
            loop {
                tokio::select! {
                    _ = shutdown_rx.recv() => break,
                    maybe_event = event_rx.recv() => {
                        let Some(event) = maybe_event else { break };
                        loop_strategy.absorb_event(event).await;
                    }
                    _ = ticker.tick() => {
                        if let Err(err) = loop_strategy.flush().await {
                            warn!("lazy strategy idle flush failed: {err}");
                        }
                    }
                }
            }
        });

        Ok(strategy)
    }

    async fn absorb_event(&self, event: notify::Result<Event>) {
        self.events_observed.fetch_add(1, Ordering::Relaxed);
        let event = match event {
            Ok(e) => e,
            Err(err) => {
                warn!("filesystem watcher error: {err}");
                self.errors.fetch_add(1, Ordering::Relaxed);
                return;
            }
        };
        let mut dirty = self.dirty.lock().await;
        for path in event.paths {
            if !is_relevant_path(&self.project_root, &path) {
                continue;
            }
            let relative = to_relative(&self.project_root, &path);
            if path.exists() {
                dirty.removed.remove(&relative);
                dirty.changed.insert(relative);
            } else {
                dirty.changed.remove(&relative);
                dirty.removed.insert(relative);
            }
        }
        if let Some(path) = &self.dirty_files_path {
            if let Err(err) = save_dirty_set(path, &dirty).await {
                warn!("failed to persist dirty-files set: {err}");
            }
        }
    }
}

#[async_trait]
impl IndexingStrategy for LazyStrategy {
    async fn flush(&self) -> Result<()> {
        let (removed, changed) = {
            let mut dirty = self.dirty.lock().await;
            let taken = (
                std::mem::take(&mut dirty.removed),
                std::mem::take(&mut dirty.changed),
            );
            if let Some(path) = &self.dirty_files_path {
                if let Err(err) = save_dirty_set(path, &dirty).await {
                    warn!("failed to persist dirty-files set: {err}");
                }
            }
            taken
        };

        for relative_path in &removed {
            match self.manager.remove_file(relative_path).await {
                Ok(()) => {
                    self.files_reindexed.fetch_add(1, Ordering::Relaxed);
                }
                Err(err) => {
                    warn!("lazy removal of {relative_path} failed: {err}");
                    self.errors.fetch_add(1, Ordering::Relaxed);
                }
            }
        }
        for relative_path in &changed {
            match self.manager.update_file(relative_path).await {
                Ok(()) => {
                    self.files_reindexed.fetch_add(1, Ordering::Relaxed);
                }
                Err(err) => {
                    warn!("lazy update of {relative_path} failed: {err}");
                    self.errors.fetch_add(1, Ordering::Relaxed);
                }
            }
        }
        Ok(())
    }

    async fn stop(&self) {
        let _ = self.shutdown_tx.send(()).await;
    }

    fn stats(&self) -> StrategyStats {
        StrategyStats {
            events_observed: self.events_observed.load(Ordering::Relaxed),
            files_reindexed: self.files_reindexed.load(Ordering::Relaxed),
            errors: self.errors.load(Ordering::Relaxed),
        }
    }

    fn kind(&self) -> StrategyKind {
        StrategyKind::Lazy
    }
}

/// Watches only the git ref log (`.git/logs/HEAD`) so branch switches,
/// commits, and rebases trigger a drift reconciliation without a full
/// filesystem watcher. Requires the project to be a git checkout.
pub struct GitStrategy {
    integrity: Arc<IntegrityEngine>,
    _watcher: std::sync::Mutex<Option<RecommendedWatcher>>,
    shutdown_tx: mpsc::Sender<()>,
    events_observed: AtomicU64,
    files_reindexed: AtomicU64,
    errors: AtomicU64,
}

impl GitStrategy {
    pub fn start(project_root: PathBuf, integrity: Arc<IntegrityEngine>) -> Result<Arc<Self>> {
        let ref_log = project_root.join(".git").join("logs").join("HEAD");
        if !ref_log.exists() {
            return Err(crate::error::IndexerError::NotAGitRepository(
                project_root.display().to_string(),
            ));
        }

        let (event_tx, mut event_rx) = mpsc::channel::<notify::Result<Event>>(16);
        let (shutdown_tx, mut shutdown_rx) = mpsc::channel::<()>(1);

        let mut watcher: RecommendedWatcher = RecommendedWatcher::new(
            move |res| {
                let _ = event_tx.blocking_send(res);
            },
            NotifyConfig::default(),
        )
        .map_err(|e| crate::error::IndexerError::Other(format!("failed to start watcher: {e}")))?;
        watcher
            .watch(&ref_log, RecursiveMode::NonRecursive)
            .map_err(|e| crate::error::IndexerError::Other(format!("failed to watch {}: {e}", ref_log.display())))?;

        let strategy = Arc::new(Self {
            integrity,
            _watcher: std::sync::Mutex::new(Some(watcher)),
            shutdown_tx,
            events_observed: AtomicU64::new(0),
            files_reindexed: AtomicU64::new(0),
            errors: AtomicU64::new(0),
        });

        let loop_strategy = Arc::clone(&strategy);
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = shutdown_rx.recv() => break,
                    maybe_event = event_rx.recv() => {
                        let Some(_event) = maybe_event else { break };
                        loop_strategy.events_observed.fetch_add(1, Ordering::Relaxed);
                        tokio::time::sleep(GIT_DEBOUNCE).await;
                        while event_rx.try_recv().is_ok() {}
                        if let Err(err) = loop_strategy.flush().await {
                            warn!("git strategy reconciliation failed: {err}");
                        }
                    }
                }
            }
        });

        Ok(strategy)
    }
}

#[async_trait]
impl IndexingStrategy for GitStrategy {
    async fn flush(&self) -> Result<()> {
        let drift = self.integrity.detect_drift().await?;
        if drift.recommend_full_rebuild {
            warn!("git strategy: drift exceeds per-pass budget, a full reindex is recommended");
        }
        let count = drift.event_count();
        self.integrity.reconcile(&drift).await?;
        self.files_reindexed.fetch_add(count as u64, Ordering::Relaxed);
        Ok(())
    }

    async fn stop(&self) {
        let _ = self.shutdown_tx.send(()).await;
    }

    fn stats(&self) -> StrategyStats {
        StrategyStats {
            events_observed: self.events_observed.load(Ordering::Relaxed),
            files_reindexed: self.files_reindexed.load(Ordering::Relaxed),
            errors: self.errors.load(Ordering::Relaxed),
        }
    }

    fn kind(&self) -> StrategyKind {
        StrategyKind::Git
    }
}

fn is_relevant_path(root: &Path, path: &Path) -> bool {
    const IGNORED: &[&str] = &[
        ".git", ".hg", ".svn", "target", "node_modules", "dist", "build", "out", ".idea", ".vscode",
    ];
    if let Ok(relative) = path.strip_prefix(root) {
        if let Some(first) = relative.components().next() {
            let first = first.as_os_str().to_string_lossy().to_lowercase();
            if IGNORED.iter().any(|ignored| first == *ignored) {
                return false;
            }
        }
    }
    true
}

/// Holds at most one active strategy per project. Setting a new strategy
/// stops the previous one first; setting the same kind twice is a no-op.
pub struct StrategyOrchestrator {
    active: Mutex<Option<(StrategyKind, Arc<dyn IndexingStrategy>)>>,
}

impl StrategyOrchestrator {
    #[must_use]
    pub fn new() -> Self {
        Self {
            active: Mutex::new(None),
        }
    }

    pub async fn set_strategy(&self, strategy: Arc<dyn IndexingStrategy>) {
        let kind = strategy.kind();
        let mut active = self.active.lock().await;
        if let Some((current_kind, _)) = active.as_ref() {
            if *current_kind == kind {
                return;
            }
        }
        if let Some((_, previous)) = active.take() {
            previous.stop().await;
        }
        info!("indexing strategy switched to {kind:?}");
        *active = Some((kind, strategy));
    }

    pub async fn flush(&self) -> Result<()> {
        if let Some((_, strategy)) = self.active.lock().await.as_ref() {
            strategy.flush().await
        } else {
            Ok(())
        }
    }

    pub async fn stop(&self) {
        if let Some((_, strategy)) = self.active.lock().await.take() {
            strategy.stop().await;
        }
    }

    pub async fn stats(&self) -> Option<StrategyStats> {
        self.active.lock().await.as_ref().map(|(_, s)| s.stats())
    }

    /// The active strategy's kind, independent of its stats. Callers that
    /// need to branch on strategy (e.g. only flushing for `Lazy`) should use
    /// this instead of treating `stats().is_some()` as a stand-in for it.
    pub async fn kind(&self) -> Option<StrategyKind> {
        self.active.lock().await.as_ref().map(|(kind, _)| *kind)
    }
}

impl Default for StrategyOrchestrator {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for StrategyKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            Self::Realtime => "realtime",
            Self::Lazy => "lazy",
            Self::Git => "git",
        };
        write!(f, "{label}")
    }
}
