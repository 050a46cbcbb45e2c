//! Document Chunker.
//!
//! Detects a document's kind from its file extension and dispatches to the
//! matching strategy. Every strategy guarantees at least one fragment and
//! never panics on malformed input — structured-format parse failures fall
//! back to plain-text chunking.

mod code;
mod html;
mod markdown;
mod plain;
mod rst;
mod structured;

use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::path::Path;

use crate::models::{Fragment, FragmentKind};

pub const MAX_FRAGMENT_SIZE: usize = 1500;
pub const OVERLAP_LINES: usize = 3;
pub const MAX_DOCUMENT_SIZE: usize = 1_000_000;
pub const WORD_OVERLAP: usize = 10;
pub const CHAR_OVERLAP: usize = 50;

/// Tunable size/overlap knobs for the splitting step every strategy shares.
/// Defaults match the fixed constants above; `config::ChunkingConfig` can
/// override them per the engine's configuration file or environment.
#[derive(Debug, Clone, Copy)]
pub struct ChunkOptions {
    pub max_fragment_size: usize,
    pub overlap_lines: usize,
    pub word_overlap: usize,
    pub char_overlap: usize,
}

impl Default for ChunkOptions {
    fn default() -> Self {
        Self {
            max_fragment_size: MAX_FRAGMENT_SIZE,
            overlap_lines: OVERLAP_LINES,
            word_overlap: WORD_OVERLAP,
            char_overlap: CHAR_OVERLAP,
        }
    }
}

/// A fragment as produced by a kind-specific strategy, before identifiers,
/// content hashes, and the heading forest are attached by [`chunk_document`].
pub(crate) struct RawFragment {
    pub kind: FragmentKind,
    pub content: String,
    pub start_line: Option<usize>,
    pub end_line: Option<usize>,
    pub metadata: Vec<(String, String)>,
}

impl RawFragment {
    fn new(kind: FragmentKind, content: impl Into<String>) -> Self {
        Self { kind, content: content.into(), start_line: None, end_line: None, metadata: vec![] }
    }

    fn with_lines(mut self, start: usize, end: usize) -> Self {
        self.start_line = Some(start);
        self.end_line = Some(end);
        self
    }

    fn with_meta(mut self, key: &str, value: impl Into<String>) -> Self {
        self.metadata.push((key.to_string(), value.into()));
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Kind {
    Markdown,
    RestructuredText,
    Html,
    SourceCode,
    Yaml,
    Json,
    PlainText,
}

pub fn detect_kind(path: &str) -> Kind {
    let lower = path.to_lowercase();
    let file_name = Path::new(&lower).file_name().and_then(|n| n.to_str()).unwrap_or("");

    if file_name.starts_with("readme") && !file_name.contains('.') {
        return Kind::Markdown;
    }

    match Path::new(&lower).extension().and_then(|e| e.to_str()) {
        Some("md") | Some("markdown") => Kind::Markdown,
        Some("rst") => Kind::RestructuredText,
        Some("html") | Some("htm") => Kind::Html,
        Some("yaml") | Some("yml") => Kind::Yaml,
        Some("json") => Kind::Json,
        Some(
            "rs" | "py" | "js" | "ts" | "jsx" | "tsx" | "go" | "java" | "c" | "h" | "cpp" | "hpp" | "cc" | "rb"
            | "php" | "cs" | "kt" | "swift" | "scala",
        ) => Kind::SourceCode,
        _ => Kind::PlainText,
    }
}

/// Chunk `content` (already validated and sanitized) into an ordered list
/// of fragments for `document_id`. Never returns an empty list for
/// non-empty input.
pub fn chunk_document(document_id: &str, path: &str, content: &str) -> Vec<Fragment> {
    chunk_document_with_options(document_id, path, content, ChunkOptions::default())
}

/// Same as [`chunk_document`] but with configurable max fragment size and
/// overlap.
pub fn chunk_document_with_options(
    document_id: &str,
    path: &str,
    content: &str,
    options: ChunkOptions,
) -> Vec<Fragment> {
    if content.is_empty() {
        return vec![make_fragment(document_id, path, FragmentKind::Other, "", 0, None)];
    }

    let raw = match detect_kind(path) {
        Kind::Markdown => markdown::chunk(content, options),
        Kind::RestructuredText => rst::chunk(content),
        Kind::Html => html::chunk(content),
        Kind::SourceCode => code::chunk(content, options),
        Kind::Yaml => structured::chunk_yaml(content, options).unwrap_or_else(|| plain::chunk(content, options)),
        Kind::Json => structured::chunk_json(content, options).unwrap_or_else(|| plain::chunk(content, options)),
        Kind::PlainText => plain::chunk(content, options),
    };

    let mut fragments: Vec<Fragment> = raw
        .into_iter()
        .enumerate()
        .map(|(i, raw_fragment)| {
            let mut fragment = make_fragment(
                document_id,
                path,
                raw_fragment.kind,
                &raw_fragment.content,
                i,
                raw_fragment.start_line,
            );
            fragment.end_line = raw_fragment.end_line;
            for (k, v) in raw_fragment.metadata {
                fragment.metadata.insert(k, crate::models::PayloadValue::Str(v));
            }
            fragment
        })
        .collect();

    link_heading_forest(&mut fragments);
    fragments
}

fn make_fragment(
    document_id: &str,
    path: &str,
    kind: FragmentKind,
    content: &str,
    index: usize,
    start_line: Option<usize>,
) -> Fragment {
    Fragment {
        id: format!("{}_{:04}", document_id, start_line.unwrap_or(index)),
        document_id: document_id.to_string(),
        repository: String::new(),
        path: path.to_string(),
        kind,
        content: content.to_string(),
        start_line,
        end_line: None,
        parent_id: None,
        child_ids: vec![],
        metadata: HashMap::new(),
        content_hash: content_hash(content),
        embedding: None,
    }
}

pub fn content_hash(content: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(content.as_bytes());
    format!("{:x}", hasher.finalize())[..16].to_string()
}

/// Walk the fragment list maintaining a stack of unclosed headings keyed by
/// level; every non-heading fragment's parent is the innermost heading, and
/// every heading of level L owns every subsequent fragment up to the next
/// heading of level <= L.
fn link_heading_forest(fragments: &mut [Fragment]) {
    let mut stack: Vec<(usize, usize)> = Vec::new(); // (level, index)

    for i in 0..fragments.len() {
        let level = heading_level(&fragments[i]);

        if let Some(level) = level {
            while stack.last().is_some_and(|(l, _)| *l >= level) {
                stack.pop();
            }
            if let Some((_, parent_idx)) = stack.last() {
                let parent_id = fragments[*parent_idx].id.clone();
                fragments[i].parent_id = Some(parent_id);
                let child_id = fragments[i].id.clone();
                fragments[*parent_idx].child_ids.push(child_id);
            }
            stack.push((level, i));
        } else if let Some((_, parent_idx)) = stack.last() {
            let parent_id = fragments[*parent_idx].id.clone();
            fragments[i].parent_id = Some(parent_id);
            let child_id = fragments[i].id.clone();
            fragments[*parent_idx].child_ids.push(child_id);
        }
    }
}

fn heading_level(fragment: &Fragment) -> Option<usize> {
    if fragment.kind != FragmentKind::Heading {
        return None;
    }
    match fragment.metadata.get("level") {
        Some(crate::models::PayloadValue::Str(level)) => level.parse().ok().or(Some(1)),
        _ => Some(1),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detects_markdown_by_extension() {
        assert_eq!(detect_kind("docs/guide.md"), Kind::Markdown);
    }

    #[test]
    fn detects_extensionless_readme_as_markdown() {
        assert_eq!(detect_kind("README"), Kind::Markdown);
    }

    #[test]
    fn falls_back_to_plain_text() {
        assert_eq!(detect_kind("data.bin"), Kind::PlainText);
    }

    #[test]
    fn empty_content_yields_one_fragment() {
        let fragments = chunk_document("doc1", "readme.md", "");
        assert_eq!(fragments.len(), 1);
    }

    #[test]
    fn markdown_headings_own_their_body() {
        let content = "# Title\n\nSome paragraph.\n\n## Sub\n\nMore text.\n";
        let fragments = chunk_document("doc1", "guide.md", content);
        let heading = fragments.iter().find(|f| f.kind == FragmentKind::Heading).unwrap();
        assert!(!heading.child_ids.is_empty());
    }

    #[test]
    fn fragments_carry_the_source_path() {
        let fragments = chunk_document("doc1", "docs/guide.md", "some text\n");
        assert!(fragments.iter().all(|f| f.path == "docs/guide.md"));
    }

    #[test]
    fn custom_options_are_honored_end_to_end() {
        let content = "x".repeat(100);
        let options = ChunkOptions { max_fragment_size: 40, overlap_lines: 3, word_overlap: 10, char_overlap: 10 };
        let fragments = chunk_document_with_options("doc1", "notes.txt", &content, options);
        assert!(fragments.len() > 1);
        assert!(fragments[0].content.len() <= 40);
    }
}
