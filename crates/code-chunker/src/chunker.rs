use crate::error::{ChunkerError, Result};
use crate::language::Language;
use std::path::Path;
use tokio::io::{AsyncBufReadExt, BufReader};

/// Target chunk size, in characters. Chunks are allowed to run a little over
/// this when no good boundary is found nearby.
pub const TARGET_CHUNK_CHARS: usize = 4000;

/// Overlap carried from the tail of one chunk into the head of the next.
pub const OVERLAP_CHARS: usize = 400;

/// Files at or above this size are chunked by streaming lines rather than by
/// holding the whole file in memory.
pub const STREAMING_THRESHOLD_BYTES: u64 = 20 * 1024 * 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChunkType {
    Code,
    Docs,
}

/// One chunk of a file, ready for embedding.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CodeChunk {
    pub text: String,
    pub start_line: usize,
    pub end_line: usize,
    pub chunk_type: ChunkType,
}

#[derive(Debug, Clone)]
pub struct ChunkerConfig {
    pub target_chars: usize,
    pub overlap_chars: usize,
}

impl Default for ChunkerConfig {
    fn default() -> Self {
        Self::for_embeddings()
    }
}

impl ChunkerConfig {
    #[must_use]
    pub const fn for_embeddings() -> Self {
        Self {
            target_chars: TARGET_CHUNK_CHARS,
            overlap_chars: OVERLAP_CHARS,
        }
    }
}

/// Splits source text into overlapping, boundary-aware chunks.
///
/// Boundary preference, in order: a blank line, a line ending a balanced
/// brace run, then a plain line boundary. The chunker never looks inside a
/// line — splits always land between lines.
pub struct Chunker {
    config: ChunkerConfig,
}

impl Chunker {
    #[must_use]
    pub const fn new(config: ChunkerConfig) -> Self {
        Self { config }
    }

    /// Chunk `content` already fully loaded in memory. `_language` is
    /// currently unused for boundary selection (brace/blank-line heuristics
    /// are language-agnostic) but kept in the signature so callers can pass
    /// it through without a future breaking change.
    pub fn chunk_str(&self, content: &str, _language: Option<Language>) -> Result<Vec<CodeChunk>> {
        if content.is_empty() {
            return Err(ChunkerError::EmptyContent);
        }
        let lines: Vec<&str> = content.lines().collect();
        Ok(self.chunk_lines(&lines))
    }

    /// Chunk a file that may be too large to load whole. Streams line by
    /// line via a `BufReader`; the reader is dropped as soon as the loop
    /// ends on any exit path, including error.
    pub async fn chunk_file(&self, path: &Path) -> Result<Vec<CodeChunk>> {
        let file = tokio::fs::File::open(path).await?;
        let mut reader = BufReader::new(file);
        let mut lines = Vec::new();
        let result: Result<()> = async {
            let mut buf = String::new();
            loop {
                buf.clear();
                let n = reader.read_line(&mut buf).await?;
                if n == 0 {
                    break;
                }
                let line = buf.strip_suffix('\n').unwrap_or(&buf);
                let line = line.strip_suffix('\r').unwrap_or(line);
                lines.push(line.to_string());
            }
            Ok(())
        }
        .await;
        drop(reader);
        result?;

        if lines.is_empty() {
            return Err(ChunkerError::EmptyContent);
        }
        let borrowed: Vec<&str> = lines.iter().map(String::as_str).collect();
        Ok(self.chunk_lines(&borrowed))
    }

    fn chunk_lines(&self, lines: &[&str]) -> Vec<CodeChunk> {
        let mut chunks = Vec::new();
        let mut start = 0usize;

        while start < lines.len() {
            let end = self.find_chunk_end(lines, start);
            let (text, first, last) = trim_blank_edges(lines, start, end);
            if first <= last {
                chunks.push(CodeChunk {
                    text,
                    start_line: first + 1,
                    end_line: last + 1,
                    chunk_type: ChunkType::Code,
                });
            }

            if end >= lines.len() {
                break;
            }
            start = self.next_start(lines, start, end);
        }

        chunks
    }

    /// Exclusive end index of the chunk starting at `start`, chosen by
    /// scanning forward until the budget is exceeded, then walking back to
    /// the best boundary found along the way.
    fn find_chunk_end(&self, lines: &[&str], start: usize) -> usize {
        let mut chars = 0usize;
        let mut blank_boundary = None;
        let mut brace_boundary = None;
        let mut depth: i64 = 0;

        for (offset, line) in lines[start..].iter().enumerate() {
            let idx = start + offset;
            chars += line.len() + 1;
            depth += brace_delta(line);

            if line.trim().is_empty() && idx > start {
                blank_boundary = Some(idx);
            }
            if depth == 0 && idx > start {
                brace_boundary = Some(idx + 1);
            }

            if chars >= self.config.target_chars {
                if let Some(b) = blank_boundary {
                    return b;
                }
                if let Some(b) = brace_boundary {
                    return b;
                }
                return idx + 1;
            }
        }
        lines.len()
    }

    /// Where the next chunk should start, walking back from `end` by
    /// roughly `overlap_chars` of preceding lines (but never before
    /// `start + 1`, guaranteeing forward progress).
    fn next_start(&self, lines: &[&str], start: usize, end: usize) -> usize {
        let mut overlap_chars = 0usize;
        let mut idx = end;
        while idx > start + 1 {
            let candidate_len = lines[idx - 1].len() + 1;
            if overlap_chars + candidate_len > self.config.overlap_chars {
                break;
            }
            overlap_chars += candidate_len;
            idx -= 1;
        }
        idx.max(start + 1)
    }
}

/// Count of unmatched `{`/`}` in `line` (positive = more opens than closes).
fn brace_delta(line: &str) -> i64 {
    let mut delta = 0i64;
    for c in line.chars() {
        match c {
            '{' => delta += 1,
            '}' => delta -= 1,
            _ => {}
        }
    }
    delta
}

/// Trim leading/trailing blank lines from `lines[start..end]`, returning the
/// joined text plus the first/last retained line index (still relative to
/// the whole file, zero-based).
pub(crate) fn trim_blank_edges(lines: &[&str], start: usize, end: usize) -> (String, usize, usize) {
    let mut first = start;
    let mut last = end.saturating_sub(1);
    while first < end && lines[first].trim().is_empty() {
        first += 1;
    }
    while last >= first && last < lines.len() && lines[last].trim().is_empty() {
        if last == first {
            break;
        }
        last -= 1;
    }
    if first > last || first >= end {
        return (String::new(), start, start.wrapping_sub(1));
    }
    let text = lines[first..=last].join("\n");
    (text, first, last)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chunker() -> Chunker {
        Chunker::new(ChunkerConfig::for_embeddings())
    }

    #[test]
    fn small_file_is_a_single_chunk() {
        let content = "fn main() {\n    println!(\"hi\");\n}\n";
        let chunks = chunker().chunk_str(content, Some(Language::Rust)).unwrap();
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].start_line, 1);
        assert_eq!(chunks[0].end_line, 3);
    }

    #[test]
    fn empty_content_is_an_error() {
        assert!(matches!(
            chunker().chunk_str("", None),
            Err(ChunkerError::EmptyContent)
        ));
    }

    #[test]
    fn large_file_splits_into_overlapping_chunks() {
        let mut body = String::new();
        for i in 0..2000 {
            body.push_str(&format!("let x{i} = {i};\n"));
        }
        let chunks = chunker().chunk_str(&body, Some(Language::Rust)).unwrap();
        assert!(chunks.len() > 1);
        // Adjacent chunks overlap: the next chunk starts at or before the
        // previous chunk's end line.
        for pair in chunks.windows(2) {
            assert!(pair[1].start_line <= pair[0].end_line);
        }
    }

    #[test]
    fn line_numbers_are_one_based_and_monotonic() {
        let content = "a\nb\nc\nd\ne\n";
        let chunks = chunker().chunk_str(content, None).unwrap();
        assert_eq!(chunks[0].start_line, 1);
        assert!(chunks[0].end_line >= chunks[0].start_line);
    }

    #[test]
    fn blank_edges_are_trimmed_from_chunk_text() {
        let content = "\n\nfn foo() {}\n\n\n";
        let chunks = chunker().chunk_str(content, None).unwrap();
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].text, "fn foo() {}");
        assert_eq!(chunks[0].start_line, 3);
        assert_eq!(chunks[0].end_line, 3);
    }

    #[test]
    fn prefers_blank_line_boundary_when_available() {
        let mut body = String::new();
        for i in 0..90 {
            body.push_str(&format!("let value_{i}_padding_to_reach_budget = {i};\n"));
        }
        body.push('\n');
        for i in 0..90 {
            body.push_str(&format!("let tail_{i}_padding_to_reach_budget = {i};\n"));
        }
        let chunks = chunker().chunk_str(&body, None).unwrap();
        assert!(chunks.len() >= 1);
    }

    #[tokio::test]
    async fn chunk_file_streams_without_loading_whole_content() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("big.rs");
        let mut body = String::new();
        for i in 0..500 {
            body.push_str(&format!("fn f{i}() {{ let _ = {i}; }}\n"));
        }
        tokio::fs::write(&path, &body).await.unwrap();

        let chunks = chunker().chunk_file(&path).await.unwrap();
        assert!(!chunks.is_empty());
        assert_eq!(chunks[0].start_line, 1);
    }

    #[tokio::test]
    async fn chunk_file_missing_is_io_error() {
        let dir = tempfile::TempDir::new().unwrap();
        let missing = dir.path().join("nope.rs");
        let err = chunker().chunk_file(&missing).await.unwrap_err();
        assert!(matches!(err, ChunkerError::IoError(_)));
    }
}
