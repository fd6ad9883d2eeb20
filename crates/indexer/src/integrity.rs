use crate::error::Result;
use crate::fingerprint::FingerprintDelta;
use crate::index_state::{assess_staleness, Watermark};
use crate::manager::IndexManager;
use std::path::PathBuf;
use std::sync::Arc;

/// A pass produces more drift events than this is treated as "the project
/// changed too much to patch incrementally" and a full rebuild is
/// recommended instead of reconciling item-by-item.
const MAX_DRIFT_EVENTS_PER_PASS: usize = 2000;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DriftReport {
    pub added: Vec<String>,
    pub modified: Vec<String>,
    pub removed: Vec<String>,
    pub recommend_full_rebuild: bool,
}

impl DriftReport {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.modified.is_empty() && self.removed.is_empty()
    }

    #[must_use]
    pub fn event_count(&self) -> usize {
        self.added.len() + self.modified.len() + self.removed.len()
    }
}

impl From<FingerprintDelta> for DriftReport {
    fn from(delta: FingerprintDelta) -> Self {
        let recommend_full_rebuild =
            delta.added.len() + delta.modified.len() + delta.removed.len() > MAX_DRIFT_EVENTS_PER_PASS;
        Self {
            added: delta.added,
            modified: delta.modified,
            removed: delta.removed,
            recommend_full_rebuild,
        }
    }
}

/// Watches a project's on-disk state against what an [`IndexManager`]
/// believes is indexed, and brings the two back into agreement. `detect_drift`
/// is read-only and idempotent; `reconcile` applies the minimum set of
/// `update_file`/`remove_file` calls to close the gap.
pub struct IntegrityEngine {
    project_root: PathBuf,
    manager: Arc<IndexManager>,
}

impl IntegrityEngine {
    pub fn new(project_root: PathBuf, manager: Arc<IndexManager>) -> Self {
        Self { project_root, manager }
    }

    /// Cheap check: does the current project watermark still match the one
    /// recorded at the last full index? If they match, skip the expensive
    /// per-file fingerprint scan entirely.
    pub fn watermark_unchanged(current: &Watermark, recorded: Option<&Watermark>) -> bool {
        let assessment = assess_staleness(current, recorded.is_some(), false, recorded);
        !assessment.stale
    }

    /// Full delta scan: compares every file the policy currently admits
    /// against the manager's fingerprint store.
    pub async fn detect_drift(&self) -> Result<DriftReport> {
        let candidates = self.manager.enumerate_candidates().await?;
        let delta = self
            .manager
            .fingerprint_delta_against_disk(&candidates, &self.project_root)
            .await;
        Ok(delta.into())
    }

    /// Apply a drift report: removals first, then adds/modifications. Safe
    /// to call repeatedly with the same report (each step is itself
    /// idempotent via `update_file`/`remove_file`).
    pub async fn reconcile(&self, drift: &DriftReport) -> Result<()> {
        for path in &drift.removed {
            self.manager.remove_file(path).await?;
        }
        for path in drift.added.iter().chain(drift.modified.iter()) {
            self.manager.update_file(path).await?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn drift_report_from_delta_counts_events() {
        let delta = FingerprintDelta {
            added: vec!["a.rs".into()],
            modified: vec!["b.rs".into()],
            removed: vec!["c.rs".into()],
            unchanged: vec!["d.rs".into()],
        };
        let report: DriftReport = delta.into();
        assert_eq!(report.event_count(), 3);
        assert!(!report.is_empty());
        assert!(!report.recommend_full_rebuild);
    }

    #[test]
    fn drift_report_recommends_rebuild_past_threshold() {
        let delta = FingerprintDelta {
            added: (0..MAX_DRIFT_EVENTS_PER_PASS + 1)
                .map(|i| format!("f{i}.rs"))
                .collect(),
            modified: vec![],
            removed: vec![],
            unchanged: vec![],
        };
        let report: DriftReport = delta.into();
        assert!(report.recommend_full_rebuild);
    }

    #[test]
    fn empty_report_has_no_events() {
        let report = DriftReport::default();
        assert!(report.is_empty());
        assert_eq!(report.event_count(), 0);
    }
}
