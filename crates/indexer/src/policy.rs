use globset::{Glob, GlobSet, GlobSetBuilder};
use ignore::gitignore::Gitignore;
use std::path::Path;

/// Directory names that are never indexed, regardless of user configuration.
const HARD_DENY_DIRS: &[&str] = &[
    "node_modules", "vendor", "venv", ".venv", "__pycache__", ".git", ".hg", ".svn",
    "dist", "build", "target", "out", ".next", ".nuxt", "coverage", ".idea", ".vscode",
];

/// Glob patterns (matched against the relative path) that are never indexed.
const HARD_DENY_GLOBS: &[&str] = &[
    "**/.env", "**/.env.*", "**/*.pem", "**/*.key", "**/*.pfx", "**/*.p12",
    "**/package-lock.json", "**/yarn.lock", "**/pnpm-lock.yaml", "**/Cargo.lock",
    "**/*.lock",
];

/// Extensions sniffed as binary without reading file content.
const BINARY_EXTENSIONS: &[&str] = &[
    "png", "jpg", "jpeg", "gif", "bmp", "ico", "webp", "svg", "pdf", "zip", "tar", "gz",
    "bz2", "xz", "7z", "rar", "exe", "dll", "so", "dylib", "a", "o", "class", "jar", "wasm",
    "woff", "woff2", "ttf", "otf", "eot", "mp3", "mp4", "avi", "mov", "mkv", "wav", "flac",
    "db", "sqlite", "sqlite3",
];

/// Number of leading bytes inspected for the binary content sniff.
const BINARY_SNIFF_BYTES: usize = 8192;

#[derive(Debug, Clone)]
pub struct PolicyConfig {
    pub include_globs: Vec<String>,
    pub exclude_globs: Vec<String>,
    pub respect_gitignore: bool,
    pub max_file_size_bytes: u64,
    pub doc_patterns: Vec<String>,
    pub index_docs: bool,
}

impl Default for PolicyConfig {
    fn default() -> Self {
        Self {
            include_globs: Vec::new(),
            exclude_globs: Vec::new(),
            respect_gitignore: true,
            max_file_size_bytes: 1024 * 1024,
            doc_patterns: vec!["**/*.md".to_string(), "**/*.mdx".to_string()],
            index_docs: true,
        }
    }
}

/// Which table a path is being evaluated for. Code and docs share the hard
/// deny list, user excludes, and gitignore step, but diverge on the
/// include-set and binary/doc-pattern checks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Table {
    Code,
    Docs,
}

/// Reason a file was rejected, for logging/diagnostics. `should_index`
/// itself only returns a bool (spec contract); this is exposed alongside it
/// for callers that want to explain a decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RejectReason {
    HardDenyList,
    UserExclude,
    UserIncludeMismatch,
    Gitignore,
    SizeCap,
    Binary,
    NotADocPattern,
    IsADocPatternInCodeTable,
}

pub struct IndexingPolicy {
    project_root: std::path::PathBuf,
    config: PolicyConfig,
    hard_deny: GlobSet,
    user_include: Option<GlobSet>,
    user_exclude: GlobSet,
    doc_include: GlobSet,
    gitignore: Option<Gitignore>,
}

impl IndexingPolicy {
    pub fn new(project_root: &Path, config: PolicyConfig) -> Self {
        let hard_deny = build_hard_deny_globset();
        let user_include = build_globset(&config.include_globs);
        let user_exclude = build_globset(&config.exclude_globs).unwrap_or_else(empty_globset);
        let doc_include = build_globset(&config.doc_patterns).unwrap_or_else(empty_globset);

        let gitignore = if config.respect_gitignore {
            let (gi, _) = Gitignore::new(project_root.join(".gitignore"));
            Some(gi)
        } else {
            None
        };

        Self {
            project_root: project_root.to_path_buf(),
            config,
            hard_deny,
            user_include,
            user_exclude,
            doc_include,
            gitignore,
        }
    }

    /// `should_index(relative_path)` for the code table. Evaluation order
    /// (short-circuits on first match): hard deny list, user excludes, user
    /// includes, gitignore, size cap, binary sniff.
    pub fn should_index(&self, relative_path: &str, absolute_path: &Path) -> bool {
        self.evaluate(relative_path, absolute_path, Table::Code).is_none()
    }

    /// Same evaluation, for the docs table: the include set is
    /// `doc_patterns` instead of the user include globs, and files that
    /// *aren't* doc-patterned are rejected outright (code and docs are
    /// disjoint index targets).
    pub fn should_index_docs(&self, relative_path: &str, absolute_path: &Path) -> bool {
        if !self.config.index_docs {
            return false;
        }
        self.evaluate(relative_path, absolute_path, Table::Docs).is_none()
    }

    /// Evaluate and return the rejection reason, or `None` if the file
    /// should be indexed. Exposed for diagnostics; `should_index`/
    /// `should_index_docs` are the spec-contract entry points.
    pub fn evaluate(
        &self,
        relative_path: &str,
        absolute_path: &Path,
        table: Table,
    ) -> Option<RejectReason> {
        if self.hard_deny.is_match(relative_path) || has_hard_deny_dir(relative_path) {
            return Some(RejectReason::HardDenyList);
        }
        if self.user_exclude.is_match(relative_path) {
            return Some(RejectReason::UserExclude);
        }

        match table {
            Table::Code => {
                if let Some(include) = &self.user_include {
                    if !include.is_match(relative_path) {
                        return Some(RejectReason::UserIncludeMismatch);
                    }
                }
                if self.doc_include.is_match(relative_path) {
                    return Some(RejectReason::IsADocPatternInCodeTable);
                }
            }
            Table::Docs => {
                if !self.doc_include.is_match(relative_path) {
                    return Some(RejectReason::NotADocPattern);
                }
            }
        }

        if let Some(gitignore) = &self.gitignore {
            let full = self.project_root.join(relative_path);
            if gitignore.matched(&full, false).is_ignore() {
                return Some(RejectReason::Gitignore);
            }
        }

        if let Ok(meta) = std::fs::metadata(absolute_path) {
            if meta.len() > self.config.max_file_size_bytes {
                return Some(RejectReason::SizeCap);
            }
        }

        if is_binary_extension(relative_path) || sniff_binary_content(absolute_path) {
            return Some(RejectReason::Binary);
        }

        None
    }
}

fn has_hard_deny_dir(relative_path: &str) -> bool {
    relative_path
        .split('/')
        .any(|segment| HARD_DENY_DIRS.contains(&segment))
}

fn build_hard_deny_globset() -> GlobSet {
    let mut builder = GlobSetBuilder::new();
    for pattern in HARD_DENY_GLOBS {
        if let Ok(glob) = Glob::new(pattern) {
            builder.add(glob);
        }
    }
    builder.build().unwrap_or_else(|_| empty_globset())
}

fn build_globset(patterns: &[String]) -> Option<GlobSet> {
    if patterns.is_empty() {
        return None;
    }
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        if let Ok(glob) = Glob::new(pattern) {
            builder.add(glob);
        }
    }
    builder.build().ok()
}

fn empty_globset() -> GlobSet {
    GlobSetBuilder::new().build().expect("empty globset always builds")
}

fn is_binary_extension(relative_path: &str) -> bool {
    Path::new(relative_path)
        .extension()
        .and_then(|e| e.to_str())
        .map(|ext| BINARY_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str()))
        .unwrap_or(false)
}

/// BOM plus byte-distribution sniff on the first few KiB. Treats a NUL byte
/// or a high proportion of non-text bytes as binary.
fn sniff_binary_content(path: &Path) -> bool {
    let Ok(bytes) = std::fs::read(path) else {
        return false;
    };
    let sample = &bytes[..bytes.len().min(BINARY_SNIFF_BYTES)];

    if sample.starts_with(&[0xFF, 0xFE]) || sample.starts_with(&[0xFE, 0xFF]) {
        return false; // UTF-16 BOM: treated as text.
    }
    if sample.starts_with(&[0xEF, 0xBB, 0xBF]) {
        return false; // UTF-8 BOM: text.
    }

    if sample.contains(&0) {
        return true;
    }

    if sample.is_empty() {
        return false;
    }
    let non_text = sample
        .iter()
        .filter(|&&b| b < 0x09 || (b > 0x0D && b < 0x20 && b != 0x1B))
        .count();
    (non_text as f64) / (sample.len() as f64) > 0.30
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn policy(dir: &Path, config: PolicyConfig) -> IndexingPolicy {
        IndexingPolicy::new(dir, config)
    }

    #[test]
    fn hard_deny_rejects_node_modules_regardless_of_include() {
        let dir = TempDir::new().unwrap();
        let mut config = PolicyConfig::default();
        config.respect_gitignore = false;
        let p = policy(dir.path(), config);
        let abs = dir.path().join("node_modules/pkg/index.js");
        assert!(!p.should_index("node_modules/pkg/index.js", &abs));
    }

    #[test]
    fn user_exclude_overrides_include() {
        let dir = TempDir::new().unwrap();
        let file = dir.path().join("src/secret.rs");
        std::fs::create_dir_all(file.parent().unwrap()).unwrap();
        std::fs::write(&file, "fn main() {}").unwrap();

        let config = PolicyConfig {
            include_globs: vec!["**/*.rs".to_string()],
            exclude_globs: vec!["**/secret.rs".to_string()],
            respect_gitignore: false,
            ..PolicyConfig::default()
        };
        let p = policy(dir.path(), config);
        assert!(!p.should_index("src/secret.rs", &file));
    }

    #[test]
    fn user_include_requires_match_when_non_default() {
        let dir = TempDir::new().unwrap();
        let file = dir.path().join("src/lib.py");
        std::fs::create_dir_all(file.parent().unwrap()).unwrap();
        std::fs::write(&file, "x = 1").unwrap();

        let config = PolicyConfig {
            include_globs: vec!["**/*.rs".to_string()],
            respect_gitignore: false,
            ..PolicyConfig::default()
        };
        let p = policy(dir.path(), config);
        assert!(!p.should_index("src/lib.py", &file));
    }

    #[test]
    fn size_cap_rejects_oversized_files() {
        let dir = TempDir::new().unwrap();
        let file = dir.path().join("big.rs");
        std::fs::write(&file, vec![b'a'; 2048]).unwrap();

        let config = PolicyConfig {
            max_file_size_bytes: 1024,
            respect_gitignore: false,
            ..PolicyConfig::default()
        };
        let p = policy(dir.path(), config);
        assert!(!p.should_index("big.rs", &file));
    }

    #[test]
    fn binary_extension_is_rejected() {
        let dir = TempDir::new().unwrap();
        let file = dir.path().join("logo.png");
        std::fs::write(&file, [0x89, b'P', b'N', b'G']).unwrap();
        let config = PolicyConfig {
            respect_gitignore: false,
            ..PolicyConfig::default()
        };
        let p = policy(dir.path(), config);
        assert!(!p.should_index("logo.png", &file));
    }

    #[test]
    fn binary_content_sniff_rejects_nul_bytes() {
        let dir = TempDir::new().unwrap();
        let file = dir.path().join("data.bin.txt");
        std::fs::write(&file, [0u8, 1, 2, 3, b'a', b'b']).unwrap();
        let config = PolicyConfig {
            respect_gitignore: false,
            ..PolicyConfig::default()
        };
        let p = policy(dir.path(), config);
        assert!(!p.should_index("data.bin.txt", &file));
    }

    #[test]
    fn plain_rust_file_is_indexed_for_code_table() {
        let dir = TempDir::new().unwrap();
        let file = dir.path().join("src/lib.rs");
        std::fs::create_dir_all(file.parent().unwrap()).unwrap();
        std::fs::write(&file, "pub fn hi() {}").unwrap();
        let config = PolicyConfig {
            respect_gitignore: false,
            ..PolicyConfig::default()
        };
        let p = policy(dir.path(), config);
        assert!(p.should_index("src/lib.rs", &file));
    }

    #[test]
    fn markdown_is_rejected_for_code_table_but_accepted_for_docs() {
        let dir = TempDir::new().unwrap();
        let file = dir.path().join("README.md");
        std::fs::write(&file, "# hi").unwrap();
        let config = PolicyConfig {
            respect_gitignore: false,
            ..PolicyConfig::default()
        };
        let p = policy(dir.path(), config);
        assert!(!p.should_index("README.md", &file));
        assert!(p.should_index_docs("README.md", &file));
    }

    #[test]
    fn gitignore_is_respected_when_repo_present() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join(".gitignore"), "ignored.rs\n").unwrap();
        let file = dir.path().join("ignored.rs");
        std::fs::write(&file, "fn x() {}").unwrap();
        let config = PolicyConfig::default();
        let p = policy(dir.path(), config);
        assert!(!p.should_index("ignored.rs", &file));
    }
}
