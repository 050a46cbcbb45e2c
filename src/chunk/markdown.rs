//! Markdown chunking strategy.
//!
//! A single pass over the content recognizing fenced code blocks, ATX
//! headings (levels 1-6), list items, blockquotes, pipe tables, and
//! blank-line-separated paragraphs. A running heading stack is carried as
//! a `heading_path` metadata tag on every non-heading fragment.

use crate::models::FragmentKind;

use super::{ChunkOptions, RawFragment};

enum Block {
    Heading(usize, String),
    Code(String, Option<String>),
    List(String),
    Blockquote(String),
    Table(String),
    Paragraph(String),
}

pub(super) fn chunk(content: &str, options: ChunkOptions) -> Vec<RawFragment> {
    let lines: Vec<&str> = content.lines().collect();
    let blocks = split_blocks(&lines);

    let mut heading_stack: Vec<String> = Vec::new();
    let mut fragments = Vec::new();

    for (block, start, end) in blocks {
        match block {
            Block::Heading(level, text) => {
                let bare = text.trim().to_string();
                while heading_stack.len() >= level {
                    heading_stack.pop();
                }
                heading_stack.push(bare.clone());
                let prefixed = format!("{} {}", "#".repeat(level), bare);
                let fragment = RawFragment::new(FragmentKind::Heading, prefixed)
                    .with_lines(start, end)
                    .with_meta("level", level.to_string())
                    .with_meta("heading_path", heading_stack.join(" > "));
                fragments.push(fragment);
            }
            Block::Code(text, language) => {
                let mut fragment = RawFragment::new(FragmentKind::Code, text).with_lines(start, end);
                if let Some(lang) = language {
                    fragment = fragment.with_meta("language", lang);
                }
                fragment = fragment.with_meta("heading_path", heading_stack.join(" > "));
                push_with_split(&mut fragments, fragment, options);
            }
            Block::List(text) => {
                let fragment = RawFragment::new(FragmentKind::List, text)
                    .with_lines(start, end)
                    .with_meta("heading_path", heading_stack.join(" > "));
                push_with_split(&mut fragments, fragment, options);
            }
            Block::Blockquote(text) => {
                let fragment = RawFragment::new(FragmentKind::Blockquote, text)
                    .with_lines(start, end)
                    .with_meta("heading_path", heading_stack.join(" > "));
                push_with_split(&mut fragments, fragment, options);
            }
            Block::Table(text) => {
                let fragment = RawFragment::new(FragmentKind::Table, text)
                    .with_lines(start, end)
                    .with_meta("heading_path", heading_stack.join(" > "));
                push_with_split(&mut fragments, fragment, options);
            }
            Block::Paragraph(text) => {
                let fragment = RawFragment::new(FragmentKind::Paragraph, text)
                    .with_lines(start, end)
                    .with_meta("heading_path", heading_stack.join(" > "));
                push_with_split(&mut fragments, fragment, options);
            }
        }
    }

    if fragments.is_empty() {
        fragments.push(RawFragment::new(FragmentKind::Paragraph, content).with_lines(0, lines.len()));
    }

    fragments
}

/// Split a block's content into multiple fragments if it exceeds
/// `options.max_fragment_size`, retaining `options.overlap_lines` trailing
/// lines of overlap into the next piece.
fn push_with_split(fragments: &mut Vec<RawFragment>, fragment: RawFragment, options: ChunkOptions) {
    if fragment.content.len() <= options.max_fragment_size {
        fragments.push(fragment);
        return;
    }

    let lines: Vec<&str> = fragment.content.lines().collect();
    let mut start = 0usize;
    while start < lines.len() {
        let mut end = start;
        let mut size = 0usize;
        while end < lines.len() && size < options.max_fragment_size {
            size += lines[end].len() + 1;
            end += 1;
        }
        let piece = lines[start..end].join("\n");
        let piece = if piece.len() > options.max_fragment_size {
            // A single oversize line: slice by characters.
            piece.chars().take(options.max_fragment_size).collect::<String>()
        } else {
            piece
        };
        let mut split_fragment = RawFragment::new(fragment.kind, piece);
        split_fragment.metadata = fragment.metadata.clone();
        fragments.push(split_fragment);
        if end >= lines.len() {
            break;
        }
        start = end.saturating_sub(options.overlap_lines);
    }
}

fn split_blocks(lines: &[&str]) -> Vec<(Block, usize, usize)> {
    let mut blocks = Vec::new();
    let mut i = 0usize;
    let mut buffer: Vec<&str> = Vec::new();
    let mut buffer_start = 0usize;

    macro_rules! flush_paragraph {
        () => {
            if !buffer.is_empty() {
                let text = buffer.join("\n");
                if !text.trim().is_empty() {
                    blocks.push((Block::Paragraph(text), buffer_start, i));
                }
                buffer.clear();
            }
        };
    }

    while i < lines.len() {
        let line = lines[i];

        if let Some(lang) = fence_language(line) {
            flush_paragraph!();
            let start = i;
            let mut code_lines = Vec::new();
            i += 1;
            while i < lines.len() && !is_fence(lines[i]) {
                code_lines.push(lines[i]);
                i += 1;
            }
            if i < lines.len() {
                i += 1; // consume closing fence
            }
            blocks.push((Block::Code(code_lines.join("\n"), lang), start, i));
            buffer_start = i;
            continue;
        }

        if let Some((level, text)) = atx_heading(line) {
            flush_paragraph!();
            blocks.push((Block::Heading(level, text), i, i + 1));
            i += 1;
            buffer_start = i;
            continue;
        }

        if line.trim().is_empty() {
            flush_paragraph!();
            i += 1;
            buffer_start = i;
            continue;
        }

        if is_blockquote(line) {
            flush_paragraph!();
            let start = i;
            let mut quote_lines = Vec::new();
            while i < lines.len() && is_blockquote(lines[i]) {
                quote_lines.push(lines[i]);
                i += 1;
            }
            blocks.push((Block::Blockquote(quote_lines.join("\n")), start, i));
            buffer_start = i;
            continue;
        }

        if is_list_item(line) {
            flush_paragraph!();
            let start = i;
            let mut list_lines = Vec::new();
            while i < lines.len() && (is_list_item(lines[i]) || (!lines[i].trim().is_empty() && lines[i].starts_with(' '))) {
                list_lines.push(lines[i]);
                i += 1;
            }
            blocks.push((Block::List(list_lines.join("\n")), start, i));
            buffer_start = i;
            continue;
        }

        if is_table_row(line) && i + 1 < lines.len() && is_table_separator(lines[i + 1]) {
            flush_paragraph!();
            let start = i;
            let mut table_lines = vec![line];
            i += 1;
            while i < lines.len() && is_table_row(lines[i]) {
                table_lines.push(lines[i]);
                i += 1;
            }
            blocks.push((Block::Table(table_lines.join("\n")), start, i));
            buffer_start = i;
            continue;
        }

        if buffer.is_empty() {
            buffer_start = i;
        }
        buffer.push(line);
        i += 1;
    }

    flush_paragraph!();
    blocks
}

fn fence_language(line: &str) -> Option<Option<String>> {
    let trimmed = line.trim_start();
    if trimmed.starts_with("```") || trimmed.starts_with("~~~") {
        let lang = trimmed.trim_start_matches('`').trim_start_matches('~').trim();
        Some(if lang.is_empty() { None } else { Some(lang.to_string()) })
    } else {
        None
    }
}

fn is_fence(line: &str) -> bool {
    let trimmed = line.trim_start();
    trimmed.starts_with("```") || trimmed.starts_with("~~~")
}

fn atx_heading(line: &str) -> Option<(usize, String)> {
    let trimmed = line.trim_start();
    if !trimmed.starts_with('#') {
        return None;
    }
    let level = trimmed.chars().take_while(|c| *c == '#').count();
    if level == 0 || level > 6 {
        return None;
    }
    let rest = trimmed[level..].trim_start();
    if level < trimmed.len() && !trimmed.as_bytes().get(level).map(|b| b.is_ascii_whitespace()).unwrap_or(true) {
        return None;
    }
    Some((level, rest.trim_end_matches('#').trim().to_string()))
}

fn is_blockquote(line: &str) -> bool {
    line.trim_start().starts_with('>')
}

fn is_list_item(line: &str) -> bool {
    let trimmed = line.trim_start();
    if trimmed.starts_with("- ") || trimmed.starts_with("* ") || trimmed.starts_with("+ ") {
        return true;
    }
    let digits: String = trimmed.chars().take_while(|c| c.is_ascii_digit()).collect();
    !digits.is_empty() && trimmed[digits.len()..].starts_with(". ")
}

fn is_table_row(line: &str) -> bool {
    line.trim().starts_with('|') || (line.contains('|') && !line.trim().is_empty())
}

fn is_table_separator(line: &str) -> bool {
    let trimmed = line.trim().trim_matches('|');
    !trimmed.is_empty() && trimmed.chars().all(|c| c == '-' || c == ':' || c == ' ' || c == '|')
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn splits_headings_and_paragraphs() {
        let content = "# Title\n\nIntro paragraph.\n\n## Section\n\nBody text.\n";
        let fragments = chunk(content, ChunkOptions::default());
        assert!(fragments.iter().any(|f| f.kind == FragmentKind::Heading));
        assert!(fragments.iter().any(|f| f.kind == FragmentKind::Paragraph));
    }

    #[test]
    fn unclosed_fence_is_flushed_as_code() {
        let content = "```rust\nfn main() {}\n";
        let fragments = chunk(content, ChunkOptions::default());
        assert!(fragments.iter().any(|f| f.kind == FragmentKind::Code));
    }

    #[test]
    fn recognizes_pipe_tables() {
        let content = "| a | b |\n|---|---|\n| 1 | 2 |\n";
        let fragments = chunk(content, ChunkOptions::default());
        assert!(fragments.iter().any(|f| f.kind == FragmentKind::Table));
    }

    #[test]
    fn heading_path_nests() {
        let content = "# A\n\n## B\n\ntext\n";
        let fragments = chunk(content, ChunkOptions::default());
        let para = fragments.iter().find(|f| f.kind == FragmentKind::Paragraph).unwrap();
        let path = para.metadata.iter().find(|(k, _)| k == "heading_path").unwrap();
        assert_eq!(path.1, "A > B");
    }

    #[test]
    fn heading_content_retains_its_markdown_prefix() {
        let content = "# Intro\n\ntext\n";
        let fragments = chunk(content, ChunkOptions::default());
        let heading = fragments.iter().find(|f| f.kind == FragmentKind::Heading).unwrap();
        assert_eq!(heading.content, "# Intro");
    }
}
