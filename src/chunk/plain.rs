//! Plain-text chunking strategy.
//!
//! When whitespace is present, words are greedily packed into size-bounded
//! fragments with a configurable word-level overlap. When no whitespace
//! exists (a single long token), the content is sliced into fixed-size
//! character windows with overlap.

use crate::models::FragmentKind;

use super::{ChunkOptions, RawFragment};

pub(super) fn chunk(content: &str, options: ChunkOptions) -> Vec<RawFragment> {
    if content.trim().is_empty() {
        return vec![RawFragment::new(FragmentKind::Other, content)];
    }

    if content.contains(char::is_whitespace) {
        chunk_by_words(content, options)
    } else {
        chunk_by_windows(content, options)
    }
}

fn chunk_by_words(content: &str, options: ChunkOptions) -> Vec<RawFragment> {
    let words: Vec<&str> = content.split_whitespace().collect();
    let mut fragments = Vec::new();
    let mut start = 0usize;

    while start < words.len() {
        let mut end = start;
        let mut size = 0usize;
        while end < words.len() && size + words[end].len() + 1 <= options.max_fragment_size {
            size += words[end].len() + 1;
            end += 1;
        }
        if end == start {
            end = start + 1; // a single oversize word still makes progress
        }
        let text = words[start..end].join(" ");
        fragments.push(RawFragment::new(FragmentKind::Other, text));
        if end >= words.len() {
            break;
        }
        start = end.saturating_sub(options.word_overlap).max(start + 1);
    }

    fragments
}

fn chunk_by_windows(content: &str, options: ChunkOptions) -> Vec<RawFragment> {
    let chars: Vec<char> = content.chars().collect();
    let mut fragments = Vec::new();
    let mut start = 0usize;

    while start < chars.len() {
        let end = (start + options.max_fragment_size).min(chars.len());
        let text: String = chars[start..end].iter().collect();
        fragments.push(RawFragment::new(FragmentKind::Other, text));
        if end >= chars.len() {
            break;
        }
        start = end.saturating_sub(options.char_overlap).max(start + 1);
    }

    fragments
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_text_is_one_fragment() {
        let fragments = chunk("a short sentence", ChunkOptions::default());
        assert_eq!(fragments.len(), 1);
    }

    #[test]
    fn long_whitespace_text_packs_words() {
        let content = "word ".repeat(2000);
        let fragments = chunk(&content, ChunkOptions::default());
        assert!(fragments.len() > 1);
    }

    #[test]
    fn long_token_without_whitespace_slices_into_windows() {
        let content = "a".repeat(5000);
        let fragments = chunk(&content, ChunkOptions::default());
        assert!(fragments.len() > 1);
    }

    #[test]
    fn configurable_size_and_overlap_reproduce_the_worked_example() {
        let content = "x".repeat(5000);
        let options = ChunkOptions { max_fragment_size: 2000, overlap_lines: 3, word_overlap: 10, char_overlap: 300 };
        let fragments = chunk(&content, options);
        assert_eq!(fragments.len(), 3);
        assert_eq!(fragments[0].content.len(), 2000);
        assert_eq!(fragments[1].content.len(), 2000);
        assert_eq!(fragments[2].content.len(), 1600);
        assert_eq!(&fragments[0].content[1700..], &fragments[1].content[..300]);
        assert_eq!(&fragments[1].content[1700..], &fragments[2].content[..300]);
    }
}
