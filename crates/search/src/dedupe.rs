use context_vector_store::SearchHit;
use std::collections::HashMap;

/// Merge adjacent or overlapping hits from the same file into a single
/// result: union their line ranges, keep the highest score, and join their
/// text with a blank line. Chunking can split one logical block of code
/// across two stored chunks; without this a caller would see the same
/// function appear twice.
#[must_use]
pub fn dedupe_same_file_hits(hits: Vec<SearchHit>) -> Vec<SearchHit> {
    let mut by_path: HashMap<String, Vec<SearchHit>> = HashMap::new();
    let mut order: Vec<String> = Vec::new();
    for hit in hits {
        if !by_path.contains_key(&hit.path) {
            order.push(hit.path.clone());
        }
        by_path.entry(hit.path.clone()).or_default().push(hit);
    }

    let mut merged = Vec::new();
    for path in order {
        let mut group = by_path.remove(&path).unwrap_or_default();
        group.sort_by_key(|h| h.start_line);
        merged.extend(merge_overlapping(group));
    }

    merged.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
    merged
}

fn merge_overlapping(sorted_by_start: Vec<SearchHit>) -> Vec<SearchHit> {
    let mut out: Vec<SearchHit> = Vec::new();
    for hit in sorted_by_start {
        match out.last_mut() {
            Some(prev) if hit.start_line <= prev.end_line + 1 => {
                prev.end_line = prev.end_line.max(hit.end_line);
                prev.score = prev.score.max(hit.score);
                if hit.text != prev.text {
                    prev.text.push_str("\n\n");
                    prev.text.push_str(&hit.text);
                }
            }
            _ => out.push(hit),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hit(path: &str, start: i64, end: i64, score: f32, text: &str) -> SearchHit {
        SearchHit {
            path: path.to_string(),
            text: text.to_string(),
            score,
            start_line: start,
            end_line: end,
        }
    }

    #[test]
    fn adjacent_chunks_in_same_file_merge() {
        let hits = vec![hit("a.rs", 1, 10, 0.5, "part one"), hit("a.rs", 9, 20, 0.8, "part two")];
        let merged = dedupe_same_file_hits(hits);
        assert_eq!(merged.len(), 1);
        assert_eq!(merged[0].start_line, 1);
        assert_eq!(merged[0].end_line, 20);
        assert_eq!(merged[0].score, 0.8);
    }

    #[test]
    fn non_overlapping_chunks_in_same_file_stay_separate() {
        let hits = vec![hit("a.rs", 1, 5, 0.5, "a"), hit("a.rs", 50, 60, 0.9, "b")];
        let merged = dedupe_same_file_hits(hits);
        assert_eq!(merged.len(), 2);
    }

    #[test]
    fn different_files_never_merge() {
        let hits = vec![hit("a.rs", 1, 10, 0.5, "x"), hit("b.rs", 1, 10, 0.6, "y")];
        let merged = dedupe_same_file_hits(hits);
        assert_eq!(merged.len(), 2);
    }

    #[test]
    fn results_are_sorted_by_score_descending() {
        let hits = vec![hit("a.rs", 1, 5, 0.2, "a"), hit("b.rs", 1, 5, 0.9, "b")];
        let merged = dedupe_same_file_hits(hits);
        assert_eq!(merged[0].path, "b.rs");
    }
}
