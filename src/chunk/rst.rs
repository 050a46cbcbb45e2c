//! RestructuredText chunking strategy.
//!
//! Title underlines (a line of identical punctuation at least as long as
//! the title line above it) mark headings. A trailing `::` opens a literal
//! block that runs until the first non-indented line; `.. name::`
//! directives use the same termination rule.

use crate::models::FragmentKind;

use super::RawFragment;

const UNDERLINE_CHARS: &[char] = &['=', '-', '~', '^', '"', '\'', '#', '*', '+', '.'];

pub(super) fn chunk(content: &str) -> Vec<RawFragment> {
    let lines: Vec<&str> = content.lines().collect();
    let mut fragments = Vec::new();
    let mut i = 0usize;
    let mut heading_levels: Vec<char> = Vec::new();

    while i < lines.len() {
        if i + 1 < lines.len() && is_title_underline(lines[i], lines[i + 1]) {
            let underline_char = lines[i + 1].trim().chars().next().unwrap();
            if !heading_levels.contains(&underline_char) {
                heading_levels.push(underline_char);
            }
            let level = heading_levels.iter().position(|c| *c == underline_char).unwrap() + 1;
            fragments.push(
                RawFragment::new(FragmentKind::Heading, lines[i].trim())
                    .with_lines(i, i + 2)
                    .with_meta("level", level.to_string()),
            );
            i += 2;
            continue;
        }

        if lines[i].trim_end().ends_with("::") || is_directive(lines[i]) {
            let start = i;
            let header = lines[i];
            i += 1;
            let mut body = Vec::new();
            while i < lines.len() && (lines[i].trim().is_empty() || lines[i].starts_with(' ') || lines[i].starts_with('\t')) {
                body.push(lines[i]);
                i += 1;
            }
            let mut text = header.to_string();
            if !body.is_empty() {
                text.push('\n');
                text.push_str(&body.join("\n"));
            }
            let kind = if is_directive(header) { FragmentKind::Other } else { FragmentKind::Code };
            fragments.push(RawFragment::new(kind, text).with_lines(start, i));
            continue;
        }

        if lines[i].trim().is_empty() {
            i += 1;
            continue;
        }

        let start = i;
        let mut para = Vec::new();
        while i < lines.len() && !lines[i].trim().is_empty() && !(i + 1 < lines.len() && is_title_underline(lines[i], lines[i + 1])) {
            para.push(lines[i]);
            i += 1;
        }
        if !para.is_empty() {
            fragments.push(RawFragment::new(FragmentKind::Paragraph, para.join("\n")).with_lines(start, i));
        }
    }

    if fragments.is_empty() {
        fragments.push(RawFragment::new(FragmentKind::Paragraph, content));
    }

    fragments
}

fn is_title_underline(title: &str, underline: &str) -> bool {
    let underline = underline.trim();
    if underline.is_empty() || title.trim().is_empty() {
        return false;
    }
    let first = match underline.chars().next() {
        Some(c) => c,
        None => return false,
    };
    if !UNDERLINE_CHARS.contains(&first) {
        return false;
    }
    underline.chars().all(|c| c == first) && underline.len() >= title.trim().len()
}

fn is_directive(line: &str) -> bool {
    let trimmed = line.trim_start();
    trimmed.starts_with(".. ") && trimmed.contains("::")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detects_title_underline() {
        let content = "Title\n=====\n\nBody text.\n";
        let fragments = chunk(content);
        assert!(fragments.iter().any(|f| f.kind == FragmentKind::Heading));
    }

    #[test]
    fn literal_block_after_double_colon() {
        let content = "Example::\n\n    code here\n    more code\n";
        let fragments = chunk(content);
        assert!(fragments.iter().any(|f| f.kind == FragmentKind::Code));
    }

    #[test]
    fn directive_block_detected() {
        let content = ".. note::\n\n   Some note text.\n";
        let fragments = chunk(content);
        assert!(!fragments.is_empty());
    }
}
