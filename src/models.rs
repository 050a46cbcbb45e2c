//! Core data models that flow through the sync, chunk, index, and query pipeline.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Priority tier attached to a repository, used to weight ranked results.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    High,
    Medium,
    Low,
}

impl Default for Priority {
    fn default() -> Self {
        Priority::Medium
    }
}

impl Priority {
    pub fn weight(self) -> f64 {
        match self {
            Priority::High => 1.5,
            Priority::Medium => 1.0,
            Priority::Low => 0.5,
        }
    }
}

/// A tagged value for the heterogeneous payloads the vector store holds.
///
/// Mirrors the shapes Qdrant accepts in a point payload: scalars, string
/// arrays, and a single level of nested maps — deeper nesting is flattened
/// by the chunker before it gets here.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PayloadValue {
    Str(String),
    Int(i64),
    Float(f64),
    Bool(bool),
    StrArray(Vec<String>),
    Map(HashMap<String, PayloadValue>),
}

impl From<&str> for PayloadValue {
    fn from(value: &str) -> Self {
        PayloadValue::Str(value.to_string())
    }
}

impl From<String> for PayloadValue {
    fn from(value: String) -> Self {
        PayloadValue::Str(value)
    }
}

impl PayloadValue {
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            PayloadValue::Str(s) => serde_json::Value::String(s.clone()),
            PayloadValue::Int(i) => serde_json::Value::from(*i),
            PayloadValue::Float(f) => serde_json::Value::from(*f),
            PayloadValue::Bool(b) => serde_json::Value::Bool(*b),
            PayloadValue::StrArray(items) => serde_json::Value::Array(
                items.iter().map(|s| serde_json::Value::String(s.clone())).collect(),
            ),
            PayloadValue::Map(map) => {
                let mut obj = serde_json::Map::new();
                for (k, v) in map {
                    obj.insert(k.clone(), v.to_json());
                }
                serde_json::Value::Object(obj)
            }
        }
    }
}

/// Authentication mode for a repository's git transport.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AuthType {
    None,
    Token,
    Ssh,
}

impl Default for AuthType {
    fn default() -> Self {
        AuthType::None
    }
}

/// A kind of file the chunker knows a dedicated strategy for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DocumentKind {
    Markdown,
    RestructuredText,
    Html,
    SourceCode,
    Yaml,
    Json,
    Xml,
    PlainText,
    Unknown,
}

/// A file read from a synchronized repository, not yet chunked.
#[derive(Debug, Clone)]
pub struct Document {
    pub id: String,
    pub repository: String,
    pub path: String,
    pub kind: DocumentKind,
    pub content: String,
    pub metadata: HashMap<String, String>,
    pub content_hash: String,
    pub last_modified: DateTime<Utc>,
    pub fragments: Vec<Fragment>,
}

/// The kind of a chunked unit of text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FragmentKind {
    Heading,
    Code,
    Paragraph,
    List,
    Table,
    Blockquote,
    StructuredNode,
    Other,
}

impl FragmentKind {
    /// Kind-affinity weight used by the ranking step.
    pub fn affinity(self) -> f64 {
        match self {
            FragmentKind::Code => 1.0,
            FragmentKind::Heading => 0.8,
            FragmentKind::List | FragmentKind::Table => 0.7,
            FragmentKind::Paragraph => 0.6,
            FragmentKind::Blockquote => 0.5,
            FragmentKind::StructuredNode | FragmentKind::Other => 0.4,
        }
    }
}

/// A semantically coherent unit of a document.
///
/// Parent/child links are identifier references rather than owning
/// pointers — fragments live flat in `Document::fragments`, ordered by
/// position, and the forest is reconstructed by id lookup when needed.
#[derive(Debug, Clone)]
pub struct Fragment {
    pub id: String,
    pub document_id: String,
    pub repository: String,
    pub path: String,
    pub kind: FragmentKind,
    pub content: String,
    pub start_line: Option<usize>,
    pub end_line: Option<usize>,
    pub parent_id: Option<String>,
    pub child_ids: Vec<String>,
    pub metadata: HashMap<String, PayloadValue>,
    pub content_hash: String,
    pub embedding: Option<Vec<f32>>,
}

impl Fragment {
    pub fn heading_path(&self) -> Option<&str> {
        match self.metadata.get("heading_path") {
            Some(PayloadValue::Str(s)) => Some(s.as_str()),
            _ => None,
        }
    }
}

/// A fragment plus its ranking score and a human-readable explanation.
#[derive(Debug, Clone)]
pub struct RankedResult {
    pub fragment: Fragment,
    pub score: f64,
    pub explanation: String,
}

/// The three-bucket progressive view shaped from a ranked result set.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ProgressiveContext {
    pub overview: Vec<OverviewItem>,
    pub details: HashMap<String, Vec<String>>,
    pub related: HashMap<String, Vec<String>>,
    pub confidence: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct OverviewItem {
    pub document_id: String,
    pub heading: Option<String>,
    pub paragraph_summary: Option<String>,
    pub code_preview: Option<String>,
}
