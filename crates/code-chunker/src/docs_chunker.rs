use crate::chunker::{ChunkType, CodeChunk, OVERLAP_CHARS, TARGET_CHUNK_CHARS};
use crate::error::{ChunkerError, Result};
use once_cell::sync::Lazy;
use regex::Regex;

static HEADING: Lazy<Regex> = Lazy::new(|| Regex::new(r"^(#{1,6})\s+\S").unwrap());

/// Prose-oriented chunker for Markdown and plain-text documentation.
///
/// Markdown is split on headings: a chunk is a heading plus its body, up to
/// (but not including) the next heading at the same or a shallower level.
/// Non-Markdown text is split on blank lines and paragraphs are packed up to
/// budget. Overlap is a single trailing sentence rather than a fixed
/// character window, since prose tolerates a boundary split better than
/// code does.
pub struct DocsChunker {
    target_chars: usize,
}

impl Default for DocsChunker {
    fn default() -> Self {
        Self::new()
    }
}

impl DocsChunker {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            target_chars: TARGET_CHUNK_CHARS,
        }
    }

    pub fn chunk_str(&self, content: &str, is_markdown: bool) -> Result<Vec<CodeChunk>> {
        if content.trim().is_empty() {
            return Err(ChunkerError::EmptyContent);
        }
        let lines: Vec<&str> = content.lines().collect();
        if is_markdown && lines.iter().any(|l| HEADING.is_match(l)) {
            Ok(self.chunk_by_heading(&lines))
        } else {
            Ok(self.chunk_by_paragraph(&lines))
        }
    }

    fn chunk_by_heading(&self, lines: &[&str]) -> Vec<CodeChunk> {
        let mut sections: Vec<(usize, usize, usize)> = Vec::new(); // (level, start, end)
        let mut boundaries: Vec<(usize, usize)> = Vec::new();
        for (idx, line) in lines.iter().enumerate() {
            if let Some(caps) = HEADING.captures(line) {
                boundaries.push((idx, caps[1].len()));
            }
        }
        if boundaries.is_empty() {
            return self.chunk_by_paragraph(lines);
        }

        for (i, &(start, level)) in boundaries.iter().enumerate() {
            let mut end = lines.len();
            for &(next_start, next_level) in &boundaries[i + 1..] {
                if next_level <= level {
                    end = next_start;
                    break;
                }
            }
            sections.push((level, start, end));
        }

        let mut chunks = Vec::new();
        for (_, start, end) in sections {
            for (sub_start, sub_end) in split_to_budget(lines, start, end, self.target_chars) {
                if let Some(chunk) = self.make_chunk(lines, sub_start, sub_end) {
                    chunks.push(chunk);
                }
            }
        }
        chunks
    }

    fn chunk_by_paragraph(&self, lines: &[&str]) -> Vec<CodeChunk> {
        let mut paragraphs: Vec<(usize, usize)> = Vec::new();
        let mut start = None;
        for (idx, line) in lines.iter().enumerate() {
            if line.trim().is_empty() {
                if let Some(s) = start.take() {
                    paragraphs.push((s, idx));
                }
            } else if start.is_none() {
                start = Some(idx);
            }
        }
        if let Some(s) = start {
            paragraphs.push((s, lines.len()));
        }
        if paragraphs.is_empty() {
            paragraphs.push((0, lines.len()));
        }

        let mut chunks = Vec::new();
        let mut cur_start = paragraphs[0].0;
        let mut cur_end = paragraphs[0].0;
        let mut cur_chars = 0usize;

        for &(p_start, p_end) in &paragraphs {
            let p_chars: usize = lines[p_start..p_end].iter().map(|l| l.len() + 1).sum();
            if cur_chars > 0 && cur_chars + p_chars > self.target_chars {
                if let Some(chunk) = self.make_chunk(lines, cur_start, cur_end) {
                    chunks.push(chunk);
                }
                cur_start = p_start;
                cur_chars = 0;
            }
            cur_end = p_end;
            cur_chars += p_chars;
        }
        if let Some(chunk) = self.make_chunk(lines, cur_start, cur_end) {
            chunks.push(chunk);
        }
        chunks
    }

    fn make_chunk(&self, lines: &[&str], start: usize, end: usize) -> Option<CodeChunk> {
        let (text, first, last) = crate::chunker::trim_blank_edges(lines, start, end.min(lines.len()));
        if text.is_empty() {
            return None;
        }
        Some(CodeChunk {
            text,
            start_line: first + 1,
            end_line: last + 1,
            chunk_type: ChunkType::Docs,
        })
    }
}

/// Split a (possibly oversized) section into budget-sized pieces, carrying a
/// one-sentence overlap into the head of each piece after the first.
fn split_to_budget(
    lines: &[&str],
    start: usize,
    end: usize,
    target_chars: usize,
) -> Vec<(usize, usize)> {
    let section_chars: usize = lines[start..end].iter().map(|l| l.len() + 1).sum();
    if section_chars <= target_chars {
        return vec![(start, end)];
    }

    let mut pieces = Vec::new();
    let mut piece_start = start;
    let mut chars = 0usize;
    for idx in start..end {
        chars += lines[idx].len() + 1;
        if chars >= target_chars {
            pieces.push((piece_start, idx + 1));
            piece_start = overlap_start(lines, idx + 1);
            chars = 0;
        }
    }
    if piece_start < end {
        pieces.push((piece_start, end));
    }
    pieces
}

/// One sentence of trailing overlap: walk back to the nearest sentence-
/// ending line (ends in `.`, `!`, or `?`) before `idx`, capped at a few lines.
fn overlap_start(lines: &[&str], idx: usize) -> usize {
    let floor = idx.saturating_sub(3);
    for back in (floor..idx).rev() {
        let trimmed = lines[back].trim_end();
        if trimmed.ends_with(['.', '!', '?']) {
            return back + 1;
        }
    }
    idx
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn splits_markdown_on_headings() {
        let content = "# Title\n\nIntro text.\n\n## Section A\n\nBody A.\n\n## Section B\n\nBody B.\n";
        let chunks = DocsChunker::new().chunk_str(content, true).unwrap();
        assert_eq!(chunks.len(), 3);
        assert!(chunks[0].text.contains("Title"));
        assert!(chunks[1].text.contains("Section A"));
        assert!(chunks[2].text.contains("Section B"));
    }

    #[test]
    fn nested_heading_stays_with_parent_until_sibling() {
        let content = "# Top\n\n## Sub\n\nSub body.\n\n# Next Top\n\nNext body.\n";
        let chunks = DocsChunker::new().chunk_str(content, true).unwrap();
        assert_eq!(chunks.len(), 2);
        assert!(chunks[0].text.contains("Sub"));
        assert!(chunks[0].text.contains("Sub body"));
    }

    #[test]
    fn plain_text_splits_on_paragraphs() {
        let content = "Para one line one.\nPara one line two.\n\nPara two.\n";
        let chunks = DocsChunker::new().chunk_str(content, false).unwrap();
        assert_eq!(chunks.len(), 1);
        assert!(chunks[0].text.contains("Para one"));
        assert!(chunks[0].text.contains("Para two"));
    }

    #[test]
    fn empty_content_is_an_error() {
        assert!(matches!(
            DocsChunker::new().chunk_str("   \n\n", true),
            Err(ChunkerError::EmptyContent)
        ));
    }

    #[test]
    fn large_section_is_split_to_budget_with_overlap() {
        let mut content = String::from("# Big\n\n");
        for i in 0..400 {
            content.push_str(&format!("Sentence number {i} in a long section.\n"));
        }
        let chunks = DocsChunker::new().chunk_str(&content, true).unwrap();
        assert!(chunks.len() > 1);
    }

    #[test]
    fn overlap_budget_constant_is_nonzero() {
        assert!(OVERLAP_CHARS > 0);
    }
}
