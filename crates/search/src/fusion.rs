use context_vector_store::SearchHit;
use std::collections::HashMap;

/// Reciprocal Rank Fusion over a table's raw vector-similarity ranking and
/// an optional path-glob match ranking. Combining two rankings by score
/// rather than rank would let an unrelated embedding scale dominate; RRF
/// only cares about each hit's position in each list.
pub struct RrfFusion {
    k: f32,
}

impl RrfFusion {
    #[must_use]
    pub const fn new(k: f32) -> Self {
        Self { k }
    }

    /// `semantic` is the table's ranking for the query, already sorted by
    /// descending score. `path_matches` is the subset of `semantic` whose
    /// path matched a glob filter, in the same relative order. When
    /// `path_matches` is empty the semantic ranking passes through
    /// unchanged (RRF over a single list is a monotonic reordering of it).
    #[must_use]
    pub fn fuse(&self, semantic: &[SearchHit], path_matches: &[SearchHit]) -> Vec<SearchHit> {
        if path_matches.is_empty() {
            return semantic.to_vec();
        }

        let mut fused_score: HashMap<HitKey, f32> = HashMap::new();
        let mut by_key: HashMap<HitKey, &SearchHit> = HashMap::new();

        for (rank, hit) in semantic.iter().enumerate() {
            let key = HitKey::from(hit);
            *fused_score.entry(key.clone()).or_insert(0.0) += 1.0 / (self.k + rank as f32 + 1.0);
            by_key.entry(key).or_insert(hit);
        }
        for (rank, hit) in path_matches.iter().enumerate() {
            let key = HitKey::from(hit);
            *fused_score.entry(key.clone()).or_insert(0.0) += 1.0 / (self.k + rank as f32 + 1.0);
            by_key.entry(key).or_insert(hit);
        }

        let mut fused: Vec<(HitKey, f32)> = fused_score.into_iter().collect();
        fused.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));

        fused
            .into_iter()
            .filter_map(|(key, score)| {
                by_key.get(&key).map(|hit| SearchHit {
                    path: hit.path.clone(),
                    text: hit.text.clone(),
                    score,
                    start_line: hit.start_line,
                    end_line: hit.end_line,
                })
            })
            .collect()
    }
}

impl Default for RrfFusion {
    fn default() -> Self {
        Self::new(60.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct HitKey {
    path: String,
    start_line: i64,
    end_line: i64,
}

impl From<&SearchHit> for HitKey {
    fn from(hit: &SearchHit) -> Self {
        Self {
            path: hit.path.clone(),
            start_line: hit.start_line,
            end_line: hit.end_line,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hit(path: &str, start: i64, end: i64, score: f32) -> SearchHit {
        SearchHit {
            path: path.to_string(),
            text: "x".to_string(),
            score,
            start_line: start,
            end_line: end,
        }
    }

    #[test]
    fn empty_path_matches_passes_semantic_through() {
        let semantic = vec![hit("a.rs", 1, 5, 0.9), hit("b.rs", 1, 5, 0.5)];
        let fused = RrfFusion::default().fuse(&semantic, &[]);
        assert_eq!(fused.len(), 2);
        assert_eq!(fused[0].path, "a.rs");
    }

    #[test]
    fn hit_present_in_both_rankings_outranks_semantic_only() {
        let semantic = vec![hit("a.rs", 1, 5, 0.9), hit("b.rs", 1, 5, 0.85)];
        let path_matches = vec![hit("b.rs", 1, 5, 0.85)];
        let fused = RrfFusion::default().fuse(&semantic, &path_matches);
        assert_eq!(fused[0].path, "b.rs");
    }

    #[test]
    fn fusion_preserves_chunk_identity() {
        let semantic = vec![hit("a.rs", 10, 20, 0.9)];
        let fused = RrfFusion::default().fuse(&semantic, &semantic);
        assert_eq!(fused.len(), 1);
        assert_eq!(fused[0].start_line, 10);
        assert_eq!(fused[0].end_line, 20);
    }
}
