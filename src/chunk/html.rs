//! HTML chunking strategy.
//!
//! Strips `<script>`, `<style>`, and comment regions, extracts headings
//! (`<h1>`-`<h6>`) with their level and text, and produces plain-text
//! fragments for the content between headings. Deliberately pattern-based
//! rather than a full DOM parse, matching the scope of the other
//! strategies here.

use crate::models::FragmentKind;

use super::RawFragment;

pub(super) fn chunk(content: &str) -> Vec<RawFragment> {
    let cleaned = strip_noise(content);
    let mut fragments = Vec::new();
    let mut rest = cleaned.as_str();

    loop {
        match find_heading(rest) {
            Some((before, level, text, after)) => {
                push_text(&mut fragments, before);
                fragments.push(RawFragment::new(FragmentKind::Heading, text).with_meta("level", level.to_string()));
                rest = after;
            }
            None => {
                push_text(&mut fragments, rest);
                break;
            }
        }
    }

    if fragments.is_empty() {
        fragments.push(RawFragment::new(FragmentKind::Other, strip_tags(&cleaned)));
    }

    fragments
}

fn push_text(fragments: &mut Vec<RawFragment>, chunk: &str) {
    let text = strip_tags(chunk);
    let text = text.trim();
    if !text.is_empty() {
        fragments.push(RawFragment::new(FragmentKind::Paragraph, text));
    }
}

fn strip_noise(content: &str) -> String {
    let without_comments = remove_between(content, "<!--", "-->");
    let without_scripts = remove_block(&without_comments, "script");
    remove_block(&without_scripts, "style")
}

fn remove_between(content: &str, open: &str, close: &str) -> String {
    let mut out = String::new();
    let mut rest = content;
    while let Some(start) = rest.find(open) {
        out.push_str(&rest[..start]);
        match rest[start..].find(close) {
            Some(end) => rest = &rest[start + end + close.len()..],
            None => {
                rest = "";
                break;
            }
        }
    }
    out.push_str(rest);
    out
}

fn remove_block(content: &str, tag: &str) -> String {
    let open_prefix = format!("<{}", tag);
    let close_tag = format!("</{}>", tag);
    let mut out = String::new();
    let mut rest = content;
    loop {
        let lower = rest.to_lowercase();
        match lower.find(&open_prefix) {
            Some(start) => {
                out.push_str(&rest[..start]);
                match lower[start..].find(&close_tag) {
                    Some(end) => rest = &rest[start + end + close_tag.len()..],
                    None => {
                        rest = "";
                        break;
                    }
                }
            }
            None => break,
        }
    }
    out.push_str(rest);
    out
}

/// Find the earliest heading tag of any level in document order, not the
/// lowest level available — two headings of different levels must come
/// back in the order they actually appear in the markup.
fn find_heading(content: &str) -> Option<(&str, usize, String, &str)> {
    let lower = content.to_lowercase();
    let mut best: Option<(usize, usize)> = None; // (start, level)

    for level in 1..=6 {
        let open = format!("<h{}", level);
        if let Some(start) = lower.find(&open) {
            let better = match best {
                Some((best_start, _)) => start < best_start,
                None => true,
            };
            if better {
                best = Some((start, level));
            }
        }
    }

    let (start, level) = best?;
    let close = format!("</h{}>", level);
    let after_open = content[start..].find('>').map(|p| start + p + 1)?;
    let end_rel = content[after_open..].to_lowercase().find(&close)?;
    let end = after_open + end_rel;
    let text = strip_tags(&content[after_open..end]);
    Some((&content[..start], level, text.trim().to_string(), &content[end + close.len()..]))
}

fn strip_tags(content: &str) -> String {
    let mut out = String::new();
    let mut in_tag = false;
    for c in content.chars() {
        match c {
            '<' => in_tag = true,
            '>' => in_tag = false,
            _ if !in_tag => out.push(c),
            _ => {}
        }
    }
    html_unescape(&out)
}

fn html_unescape(input: &str) -> String {
    input
        .replace("&amp;", "&")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_headings() {
        let content = "<h1>Title</h1><p>Body text</p>";
        let fragments = chunk(content);
        assert!(fragments.iter().any(|f| f.kind == FragmentKind::Heading && f.content == "Title"));
    }

    #[test]
    fn strips_script_and_style() {
        let content = "<script>evil()</script><p>Safe text</p><style>.x{}</style>";
        let fragments = chunk(content);
        assert!(!fragments.iter().any(|f| f.content.contains("evil")));
        assert!(fragments.iter().any(|f| f.content.contains("Safe text")));
    }

    #[test]
    fn strips_comments() {
        let content = "<!-- hidden --><p>Visible</p>";
        let fragments = chunk(content);
        assert!(!fragments.iter().any(|f| f.content.contains("hidden")));
    }

    #[test]
    fn headings_are_returned_in_document_order_regardless_of_level() {
        let content = "<h2>Second-level first</h2><h1>First-level second</h1>";
        let fragments = chunk(content);
        let headings: Vec<_> = fragments.iter().filter(|f| f.kind == FragmentKind::Heading).collect();
        assert_eq!(headings.len(), 2);
        assert_eq!(headings[0].content, "Second-level first");
        assert_eq!(headings[1].content, "First-level second");
    }
}
