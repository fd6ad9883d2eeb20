use crate::error::{Result, VectorStoreError};
use context_code_chunker::{ChunkType, CodeChunk};
use serde::{Deserialize, Serialize};

pub const EMBEDDING_TEMPLATES_SCHEMA_VERSION: u32 = 1;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum QueryKind {
    Identifier,
    Path,
    Conceptual,
}

impl QueryKind {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Identifier => "identifier",
            Self::Path => "path",
            Self::Conceptual => "conceptual",
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DocumentKind {
    Code,
    Docs,
}

impl DocumentKind {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Code => "code",
            Self::Docs => "docs",
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct EmbeddingTemplates {
    #[serde(default = "default_schema_version")]
    pub schema_version: u32,
    #[serde(default = "default_max_chars")]
    pub max_chars: usize,
    #[serde(default)]
    pub query: QueryTemplates,
    #[serde(default)]
    pub document: DocumentTemplates,
}

fn default_schema_version() -> u32 {
    EMBEDDING_TEMPLATES_SCHEMA_VERSION
}

fn default_max_chars() -> usize {
    8192
}

impl Default for EmbeddingTemplates {
    fn default() -> Self {
        Self {
            schema_version: EMBEDDING_TEMPLATES_SCHEMA_VERSION,
            max_chars: default_max_chars(),
            query: QueryTemplates::default(),
            document: DocumentTemplates::default(),
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct QueryTemplates {
    #[serde(default = "default_template")]
    pub default: String,
    pub identifier: Option<String>,
    pub path: Option<String>,
    pub conceptual: Option<String>,
}

impl Default for QueryTemplates {
    fn default() -> Self {
        Self {
            default: default_template(),
            identifier: None,
            path: None,
            conceptual: None,
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DocumentTemplates {
    #[serde(default = "default_template")]
    pub default: String,
    pub code: Option<String>,
    pub docs: Option<String>,
}

impl Default for DocumentTemplates {
    fn default() -> Self {
        Self {
            default: default_template(),
            code: None,
            docs: None,
        }
    }
}

fn default_template() -> String {
    "{text}".to_string()
}

impl EmbeddingTemplates {
    pub fn validate(&self) -> Result<()> {
        if self.schema_version != EMBEDDING_TEMPLATES_SCHEMA_VERSION {
            return Err(VectorStoreError::EmbeddingError(format!(
                "unsupported embedding template schema_version {} (expected {EMBEDDING_TEMPLATES_SCHEMA_VERSION})",
                self.schema_version
            )));
        }

        let max_chars = self.max_chars;
        if !(256..=200_000).contains(&max_chars) {
            return Err(VectorStoreError::EmbeddingError(format!(
                "embedding.max_chars must be in [256, 200000] (got {max_chars})"
            )));
        }

        for template in self.all_templates() {
            validate_template_placeholders(template)?;
        }

        Ok(())
    }

    #[must_use]
    pub fn doc_template_hash(&self) -> u64 {
        let repr = format!(
            "schema_version={}\nmax_chars={}\ndoc.default={}\ndoc.code={}\ndoc.docs={}\n",
            self.schema_version,
            self.max_chars,
            self.document.default,
            self.document.code.as_deref().unwrap_or_default(),
            self.document.docs.as_deref().unwrap_or_default(),
        );
        fnv1a64(repr.as_bytes())
    }

    pub fn render_query(&self, kind: QueryKind, text: &str) -> Result<String> {
        let template = match kind {
            QueryKind::Identifier => self.query.identifier.as_deref(),
            QueryKind::Path => self.query.path.as_deref(),
            QueryKind::Conceptual => self.query.conceptual.as_deref(),
        }
        .unwrap_or(self.query.default.as_str());

        render_template(template, self.max_chars, |key| match key {
            "text" => Some(text),
            "query_kind" => Some(kind.as_str()),
            _ => None,
        })
    }

    /// Render a chunk plus its relative path into the text actually handed
    /// to the embedder. `kind` picks which document template applies.
    pub fn render_doc_chunk(&self, chunk: &CodeChunk, path: &str, kind: DocumentKind) -> Result<String> {
        let template = match kind {
            DocumentKind::Code => self.document.code.as_deref(),
            DocumentKind::Docs => self.document.docs.as_deref(),
        }
        .unwrap_or(self.document.default.as_str());

        let chunk_type = match chunk.chunk_type {
            ChunkType::Code => "code",
            ChunkType::Docs => "docs",
        };
        let chunk_id = format!("{path}:{}:{}", chunk.start_line, chunk.end_line);
        let start_line = chunk.start_line.to_string();
        let end_line = chunk.end_line.to_string();

        render_template(template, self.max_chars, |key| match key {
            "text" => Some(chunk.text.as_str()),
            "path" => Some(path),
            "chunk_type" => Some(chunk_type),
            "chunk_id" => Some(chunk_id.as_str()),
            "start_line" => Some(start_line.as_str()),
            "end_line" => Some(end_line.as_str()),
            "doc_kind" => Some(kind.as_str()),
            _ => None,
        })
    }

    fn all_templates(&self) -> Vec<&str> {
        let mut out = vec![self.query.default.as_str()];
        if let Some(v) = &self.query.identifier {
            out.push(v.as_str());
        }
        if let Some(v) = &self.query.path {
            out.push(v.as_str());
        }
        if let Some(v) = &self.query.conceptual {
            out.push(v.as_str());
        }

        out.push(self.document.default.as_str());
        if let Some(v) = &self.document.code {
            out.push(v.as_str());
        }
        if let Some(v) = &self.document.docs {
            out.push(v.as_str());
        }
        out
    }
}

/// Classify a relative path into which document template family applies.
#[must_use]
pub fn classify_document_kind(path: &str) -> DocumentKind {
    let lower = path.to_ascii_lowercase();
    if lower.ends_with(".md") || lower.ends_with(".mdx") || lower.ends_with(".rst") {
        DocumentKind::Docs
    } else {
        DocumentKind::Code
    }
}

fn validate_template_placeholders(template: &str) -> Result<()> {
    for name in extract_placeholders(template)? {
        if !is_allowed_placeholder(&name) {
            return Err(VectorStoreError::EmbeddingError(format!(
                "unsupported template placeholder '{{{name}}}'. allowed: {ALLOWED_PLACEHOLDERS}",
            )));
        }
    }
    Ok(())
}

const ALLOWED_PLACEHOLDERS: &str =
    "text, path, chunk_type, chunk_id, start_line, end_line, doc_kind, query_kind";

fn is_allowed_placeholder(name: &str) -> bool {
    matches!(
        name,
        "text" | "path" | "chunk_type" | "chunk_id" | "start_line" | "end_line" | "doc_kind" | "query_kind"
    )
}

fn extract_placeholders(template: &str) -> Result<Vec<String>> {
    let mut placeholders = Vec::new();
    let mut chars = template.chars().peekable();
    while let Some(ch) = chars.next() {
        match ch {
            '{' => {
                if matches!(chars.peek(), Some('{')) {
                    let _ = chars.next();
                    continue;
                }
                let mut name = String::new();
                loop {
                    match chars.next() {
                        Some('}') => break,
                        Some('{') => {
                            return Err(VectorStoreError::EmbeddingError(
                                "invalid template: nested '{' inside placeholder".into(),
                            ));
                        }
                        Some(c) => name.push(c),
                        None => {
                            return Err(VectorStoreError::EmbeddingError(
                                "invalid template: unterminated '{...}' placeholder".into(),
                            ));
                        }
                    }
                }
                if name.trim().is_empty() {
                    return Err(VectorStoreError::EmbeddingError(
                        "invalid template: empty placeholder '{}'".into(),
                    ));
                }
                placeholders.push(name);
            }
            '}' => {
                if matches!(chars.peek(), Some('}')) {
                    let _ = chars.next();
                    continue;
                }
                return Err(VectorStoreError::EmbeddingError(
                    "invalid template: stray '}'".into(),
                ));
            }
            _ => {}
        }
    }
    Ok(placeholders)
}

fn render_template<'a>(
    template: &str,
    max_chars: usize,
    mut resolve: impl FnMut(&str) -> Option<&'a str>,
) -> Result<String> {
    let mut out = String::new();
    let mut chars = template.chars().peekable();
    while let Some(ch) = chars.next() {
        if out.len() >= max_chars {
            break;
        }

        match ch {
            '{' => {
                if matches!(chars.peek(), Some('{')) {
                    let _ = chars.next();
                    push_char_bounded(&mut out, '{', max_chars);
                    continue;
                }

                let mut name = String::new();
                loop {
                    match chars.next() {
                        Some('}') => break,
                        Some('{') => {
                            return Err(VectorStoreError::EmbeddingError(
                                "invalid template: nested '{' inside placeholder".into(),
                            ));
                        }
                        Some(c) => name.push(c),
                        None => {
                            return Err(VectorStoreError::EmbeddingError(
                                "invalid template: unterminated '{...}' placeholder".into(),
                            ));
                        }
                    }
                }

                if !is_allowed_placeholder(name.trim()) {
                    return Err(VectorStoreError::EmbeddingError(format!(
                        "unsupported template placeholder '{{{}}}'. allowed: {ALLOWED_PLACEHOLDERS}",
                        name.trim()
                    )));
                }

                let value = resolve(name.trim()).unwrap_or("");
                push_str_bounded(&mut out, value, max_chars);
            }
            '}' => {
                if matches!(chars.peek(), Some('}')) {
                    let _ = chars.next();
                    push_char_bounded(&mut out, '}', max_chars);
                    continue;
                }
                return Err(VectorStoreError::EmbeddingError(
                    "invalid template: stray '}'".into(),
                ));
            }
            other => push_char_bounded(&mut out, other, max_chars),
        }
    }

    Ok(out)
}

fn push_char_bounded(out: &mut String, ch: char, max_chars: usize) {
    let remaining = max_chars.saturating_sub(out.len());
    if remaining == 0 {
        return;
    }
    let mut buf = [0u8; 4];
    let encoded = ch.encode_utf8(&mut buf);
    push_str_bounded(out, encoded, max_chars);
}

fn push_str_bounded(out: &mut String, value: &str, max_chars: usize) {
    let remaining = max_chars.saturating_sub(out.len());
    if remaining == 0 {
        return;
    }
    if value.len() <= remaining {
        out.push_str(value);
        return;
    }
    out.push_str(utf8_prefix(value, remaining));
}

fn utf8_prefix(value: &str, max_bytes: usize) -> &str {
    if value.len() <= max_bytes {
        return value;
    }
    let mut end = 0;
    for (i, _) in value.char_indices() {
        if i > max_bytes {
            break;
        }
        end = i;
    }
    &value[..end]
}

fn fnv1a64(bytes: &[u8]) -> u64 {
    const OFFSET: u64 = 14695981039346656037;
    const PRIME: u64 = 1099511628211;
    let mut hash = OFFSET;
    for b in bytes {
        hash ^= u64::from(*b);
        hash = hash.wrapping_mul(PRIME);
    }
    hash
}
