//! YAML/JSON chunking strategy.
//!
//! Parses the content into a `serde_json::Value` tree. If the whole
//! serialized form fits within the fragment size cap, it is emitted as a
//! single structured fragment; otherwise the top-level mapping is
//! recursed into, emitting one fragment per value with its dotted-key
//! path as metadata. Parse failure returns `None` so the caller can fall
//! back to plain-text chunking.
//!
//! YAML is parsed through a minimal line-based bridge into the same
//! `serde_json::Value` model used for JSON, since the corpus carries no
//! standalone YAML parser crate; this only round-trips the subset of YAML
//! (block mappings of scalars) actually expected in repository config and
//! front-matter files.

use crate::models::FragmentKind;

use super::{ChunkOptions, RawFragment};

pub(super) fn chunk_json(content: &str, options: ChunkOptions) -> Option<Vec<RawFragment>> {
    let value: serde_json::Value = serde_json::from_str(content).ok()?;
    Some(chunk_value(value, options))
}

pub(super) fn chunk_yaml(content: &str, options: ChunkOptions) -> Option<Vec<RawFragment>> {
    let value = yaml_like_to_json(content)?;
    Some(chunk_value(value, options))
}

fn chunk_value(value: serde_json::Value, options: ChunkOptions) -> Vec<RawFragment> {
    let serialized = serde_json::to_string_pretty(&value).unwrap_or_default();
    if serialized.len() <= options.max_fragment_size {
        return vec![RawFragment::new(FragmentKind::StructuredNode, serialized)];
    }

    let mut fragments = Vec::new();
    if let serde_json::Value::Object(map) = &value {
        for (key, child) in map {
            let path = escape_key(key);
            let child_text = serde_json::to_string_pretty(child).unwrap_or_default();
            fragments.push(RawFragment::new(FragmentKind::StructuredNode, child_text).with_meta("key_path", path));
        }
    } else {
        fragments.push(RawFragment::new(FragmentKind::StructuredNode, serialized));
    }

    if fragments.is_empty() {
        fragments.push(RawFragment::new(FragmentKind::StructuredNode, "{}"));
    }
    fragments
}

fn escape_key(key: &str) -> String {
    key.replace('.', "\\.")
}

/// Translate a block of `key: value` YAML lines into JSON. Supports
/// scalar values and one level of nested mappings by indentation; lines
/// that don't fit this shape abort the whole parse.
fn yaml_like_to_json(content: &str) -> Option<serde_json::Value> {
    let mut root = serde_json::Map::new();
    let mut current_parent: Option<String> = None;
    let mut nested = serde_json::Map::new();

    for line in content.lines() {
        if line.trim().is_empty() || line.trim_start().starts_with('#') {
            continue;
        }
        let indent = line.chars().take_while(|c| *c == ' ').count();
        let trimmed = line.trim();
        let (key, value) = trimmed.split_once(':')?;
        let key = key.trim().to_string();
        let value = value.trim();

        if indent == 0 {
            if let Some(parent) = current_parent.take() {
                root.insert(parent, serde_json::Value::Object(std::mem::take(&mut nested)));
            }
            if value.is_empty() {
                current_parent = Some(key);
            } else {
                root.insert(key, scalar_value(value));
            }
        } else if current_parent.is_some() {
            nested.insert(key, scalar_value(value));
        } else {
            return None;
        }
    }
    if let Some(parent) = current_parent {
        root.insert(parent, serde_json::Value::Object(nested));
    }

    if root.is_empty() {
        None
    } else {
        Some(serde_json::Value::Object(root))
    }
}

fn scalar_value(value: &str) -> serde_json::Value {
    let unquoted = value.trim_matches('"').trim_matches('\'');
    if let Ok(i) = unquoted.parse::<i64>() {
        serde_json::Value::from(i)
    } else if let Ok(f) = unquoted.parse::<f64>() {
        serde_json::Value::from(f)
    } else if unquoted == "true" || unquoted == "false" {
        serde_json::Value::from(unquoted == "true")
    } else {
        serde_json::Value::String(unquoted.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn small_json_is_one_fragment() {
        let content = r#"{"a": 1, "b": "two"}"#;
        let fragments = chunk_json(content, ChunkOptions::default()).unwrap();
        assert_eq!(fragments.len(), 1);
    }

    #[test]
    fn oversize_json_recurses_into_keys() {
        let mut big = serde_json::Map::new();
        for i in 0..200 {
            big.insert(format!("key{}", i), serde_json::Value::String("x".repeat(50)));
        }
        let content = serde_json::to_string(&serde_json::Value::Object(big)).unwrap();
        let fragments = chunk_json(&content, ChunkOptions::default()).unwrap();
        assert!(fragments.len() > 1);
    }

    #[test]
    fn invalid_json_returns_none() {
        assert!(chunk_json("{not json", ChunkOptions::default()).is_none());
    }

    #[test]
    fn simple_yaml_parses() {
        let content = "name: demo\nversion: 1\nnested:\n  a: 1\n  b: two\n";
        let fragments = chunk_yaml(content, ChunkOptions::default()).unwrap();
        assert!(!fragments.is_empty());
    }
}
