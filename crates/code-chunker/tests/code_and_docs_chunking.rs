use context_code_chunker::{
    extract_imports_from_lines, filter_relevant_imports, Chunker, ChunkerConfig, ChunkType,
    DocsChunker, Language,
};

const RUST_WITH_IMPORTS: &str = "use std::collections::HashMap;\nuse std::collections::HashSet;\n\npub fn foo() -> HashMap<i32, i32> {\n    let _set: HashSet<i32> = HashSet::new();\n    HashMap::new()\n}\n";

#[test]
fn chunk_str_covers_every_line_exactly_once_in_order() {
    let mut body = String::new();
    for i in 0..1500 {
        body.push_str(&format!("let v{i} = {i};\n"));
    }
    let chunks = Chunker::new(ChunkerConfig::for_embeddings())
        .chunk_str(&body, Some(Language::Rust))
        .unwrap();

    assert!(chunks.len() > 1);
    for pair in chunks.windows(2) {
        assert!(pair[1].start_line > pair[0].start_line);
        assert!(pair[1].start_line <= pair[0].end_line + 1);
    }
    assert_eq!(chunks.last().unwrap().end_line, 1500);
}

#[test]
fn extract_imports_from_lines_finds_rust_use_statements() {
    let lines: Vec<&str> = RUST_WITH_IMPORTS.lines().collect();
    let imports = extract_imports_from_lines(Language::Rust, &lines, 10);
    assert!(imports.iter().any(|i| i.contains("HashMap")));
    assert!(imports.iter().any(|i| i.contains("HashSet")));
}

#[test]
fn filter_relevant_imports_drops_unused_imports() {
    let imports = vec![
        "use std::collections::HashMap".to_string(),
        "use std::fmt::Debug".to_string(),
    ];
    let code = "HashMap::new()";
    let relevant = filter_relevant_imports(Language::Rust, &imports, code, 10);
    assert_eq!(relevant.len(), 1);
    assert!(relevant[0].contains("HashMap"));
}

#[test]
fn docs_chunker_splits_markdown_headings_and_keeps_line_numbers() {
    let content = "# Guide\n\nIntro.\n\n## Setup\n\nRun it.\n";
    let chunks = DocsChunker::new().chunk_str(content, true).unwrap();
    assert_eq!(chunks.len(), 2);
    assert_eq!(chunks[0].chunk_type, ChunkType::Docs);
    assert_eq!(chunks[1].start_line, 5);
}

#[test]
fn docs_chunker_rejects_blank_content() {
    assert!(DocsChunker::new().chunk_str("\n\n  \n", false).is_err());
}
