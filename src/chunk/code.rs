//! Source-code chunking strategy.
//!
//! Scans for function/class/struct/impl/type declarations and gathers each
//! one plus its balanced body into a single code fragment. Brace counting
//! handles brace-delimited languages; indentation (or the start of a
//! sibling declaration) terminates declarations in indentation-based ones.

use crate::models::FragmentKind;

use super::{plain, ChunkOptions, RawFragment};

const DECL_KEYWORDS: &[&str] = &[
    "fn ", "pub fn ", "async fn ", "function ", "def ", "class ", "struct ", "impl ", "type ", "interface ",
    "enum ", "trait ", "module ", "func ",
];

pub(super) fn chunk(content: &str, options: ChunkOptions) -> Vec<RawFragment> {
    let lines: Vec<&str> = content.lines().collect();
    let mut fragments = Vec::new();
    let mut i = 0usize;

    while i < lines.len() {
        if is_declaration(lines[i]) {
            let start = i;
            let indent = leading_whitespace(lines[i]);
            let end = if content.contains('{') {
                brace_bounded_end(&lines, i)
            } else {
                indentation_bounded_end(&lines, i, indent)
            };
            let body = lines[start..end].join("\n");
            fragments.push(RawFragment::new(FragmentKind::Code, body).with_lines(start, end));
            i = end.max(start + 1);
        } else {
            i += 1;
        }
    }

    if fragments.is_empty() {
        return plain::chunk(content, options);
    }

    fragments
}

fn is_declaration(line: &str) -> bool {
    let trimmed = line.trim_start();
    DECL_KEYWORDS.iter().any(|kw| trimmed.starts_with(kw))
}

fn leading_whitespace(line: &str) -> usize {
    line.chars().take_while(|c| *c == ' ' || *c == '\t').count()
}

fn brace_bounded_end(lines: &[&str], start: usize) -> usize {
    let mut depth = 0i32;
    let mut seen_open = false;
    for (offset, line) in lines[start..].iter().enumerate() {
        for c in line.chars() {
            match c {
                '{' => {
                    depth += 1;
                    seen_open = true;
                }
                '}' => depth -= 1,
                _ => {}
            }
        }
        if seen_open && depth <= 0 {
            return start + offset + 1;
        }
    }
    lines.len()
}

fn indentation_bounded_end(lines: &[&str], start: usize, base_indent: usize) -> usize {
    for (offset, line) in lines[start + 1..].iter().enumerate() {
        if line.trim().is_empty() {
            continue;
        }
        let indent = leading_whitespace(line);
        if indent <= base_indent && !line.trim_start().starts_with(')') {
            return start + 1 + offset;
        }
    }
    lines.len()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn braces_bound_a_rust_function() {
        let content = "fn main() {\n    println!(\"hi\");\n}\n\nfn other() {}\n";
        let fragments = chunk(content, ChunkOptions::default());
        assert_eq!(fragments.len(), 2);
        assert!(fragments[0].content.contains("println"));
    }

    #[test]
    fn indentation_bounds_a_python_function() {
        let content = "def foo():\n    return 1\n\ndef bar():\n    return 2\n";
        let fragments = chunk(content, ChunkOptions::default());
        assert_eq!(fragments.len(), 2);
    }

    #[test]
    fn falls_back_to_plain_text_with_no_declarations() {
        let content = "just some\nplain lines\nwith no code\n";
        let fragments = chunk(content, ChunkOptions::default());
        assert!(!fragments.is_empty());
    }
}
