//! Configuration parsing and validation.
//!
//! The engine is configured via a JSON file (default: `config/engine.json`).
//! The config defines the project identity, the repositories to track, the
//! context-generation tuning knobs, and the vector store connection.

use serde::Deserialize;
use std::path::Path;

use crate::error::{EngineError, Result};
use crate::models::{AuthType, Priority};

#[derive(Debug, Deserialize, Clone)]
pub struct EngineConfig {
    pub project: ProjectConfig,
    pub repositories: Vec<RepositoryConfig>,
    #[serde(default)]
    pub context_generation: ContextGenerationConfig,
    #[serde(default)]
    pub vector_store: VectorStoreConfig,
    #[serde(default)]
    pub chunking: ChunkingConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ProjectConfig {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub version: Option<String>,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(rename_all = "camelCase")]
pub struct RepositoryConfig {
    pub name: String,
    pub url: String,
    #[serde(default)]
    pub branch: Option<String>,
    #[serde(default = "default_auth_type")]
    pub auth_type: AuthType,
    #[serde(default)]
    pub credentials: Option<String>,
    #[serde(default)]
    pub paths: Vec<String>,
    #[serde(default)]
    pub exclude: Vec<String>,
    #[serde(default = "default_sync_interval")]
    pub sync_interval: u64,
    #[serde(default = "default_priority")]
    pub priority: Priority,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub metadata: std::collections::HashMap<String, String>,
}

fn default_auth_type() -> AuthType {
    AuthType::None
}

fn default_sync_interval() -> u64 {
    60
}

fn default_priority() -> Priority {
    Priority::Medium
}

#[derive(Debug, Deserialize, Clone)]
#[serde(rename_all = "camelCase")]
pub struct ContextGenerationConfig {
    #[serde(default = "default_strategies")]
    pub strategies: Vec<String>,
    #[serde(default = "default_max_chunks")]
    pub max_chunks: usize,
    #[serde(default = "default_true")]
    pub priority_weighting: bool,
    #[serde(default)]
    pub custom_prompts: std::collections::HashMap<String, String>,
    #[serde(default = "default_expansion_threshold")]
    pub expansion_threshold: f64,
}

impl Default for ContextGenerationConfig {
    fn default() -> Self {
        Self {
            strategies: default_strategies(),
            max_chunks: default_max_chunks(),
            priority_weighting: true,
            custom_prompts: Default::default(),
            expansion_threshold: default_expansion_threshold(),
        }
    }
}

fn default_strategies() -> Vec<String> {
    vec!["keyword".into(), "semantic".into(), "hybrid".into()]
}

fn default_max_chunks() -> usize {
    20
}

fn default_true() -> bool {
    true
}

fn default_expansion_threshold() -> f64 {
    0.7
}

#[derive(Debug, Deserialize, Clone)]
#[serde(rename_all = "camelCase")]
pub struct VectorStoreConfig {
    #[serde(default = "default_store_type", rename = "type")]
    pub store_type: String,
    #[serde(default)]
    pub qdrant: Option<QdrantConfig>,
    #[serde(default)]
    pub embedding: EmbeddingSettings,
}

impl Default for VectorStoreConfig {
    fn default() -> Self {
        Self {
            store_type: default_store_type(),
            qdrant: None,
            embedding: EmbeddingSettings::default(),
        }
    }
}

fn default_store_type() -> String {
    "qdrant".to_string()
}

#[derive(Debug, Deserialize, Clone)]
#[serde(rename_all = "camelCase")]
pub struct QdrantConfig {
    pub url: String,
    pub collection_name: String,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(rename_all = "camelCase")]
pub struct EmbeddingSettings {
    #[serde(default = "default_provider")]
    pub provider: String,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub dims: Option<usize>,
    #[serde(default)]
    pub endpoint: Option<String>,
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for EmbeddingSettings {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            model: None,
            dims: None,
            endpoint: None,
            batch_size: default_batch_size(),
            max_retries: default_max_retries(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

fn default_provider() -> String {
    "disabled".to_string()
}

fn default_batch_size() -> usize {
    10
}

fn default_max_retries() -> u32 {
    3
}

fn default_timeout_secs() -> u64 {
    20
}

impl EmbeddingSettings {
    pub fn is_enabled(&self) -> bool {
        self.provider != "disabled"
    }
}

/// Chunk size/overlap tuning, configurable per the engine's JSON config or
/// the `CTXENG_MAX_CHUNK_SIZE` environment variable.
#[derive(Debug, Deserialize, Clone, Copy)]
#[serde(rename_all = "camelCase")]
pub struct ChunkingConfig {
    #[serde(default = "default_max_fragment_size")]
    pub max_fragment_size: usize,
    #[serde(default = "default_overlap_lines")]
    pub overlap_lines: usize,
    #[serde(default = "default_word_overlap")]
    pub word_overlap: usize,
    #[serde(default = "default_char_overlap")]
    pub char_overlap: usize,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            max_fragment_size: default_max_fragment_size(),
            overlap_lines: default_overlap_lines(),
            word_overlap: default_word_overlap(),
            char_overlap: default_char_overlap(),
        }
    }
}

impl ChunkingConfig {
    pub fn to_options(self) -> crate::chunk::ChunkOptions {
        crate::chunk::ChunkOptions {
            max_fragment_size: self.max_fragment_size,
            overlap_lines: self.overlap_lines,
            word_overlap: self.word_overlap,
            char_overlap: self.char_overlap,
        }
    }
}

fn default_max_fragment_size() -> usize {
    crate::chunk::MAX_FRAGMENT_SIZE
}

fn default_overlap_lines() -> usize {
    crate::chunk::OVERLAP_LINES
}

fn default_word_overlap() -> usize {
    crate::chunk::WORD_OVERLAP
}

fn default_char_overlap() -> usize {
    crate::chunk::CHAR_OVERLAP
}

pub fn load_config(path: &Path) -> Result<EngineConfig> {
    let content = std::fs::read_to_string(path)
        .map_err(|e| EngineError::Configuration(format!("failed to read {}: {}", path.display(), e)))?;

    let mut config: EngineConfig = serde_json::from_str(&content)
        .map_err(|e| EngineError::Configuration(format!("failed to parse config file: {}", e)))?;

    if let Ok(value) = std::env::var("CTXENG_MAX_CHUNK_SIZE") {
        config.chunking.max_fragment_size = value
            .parse()
            .map_err(|_| EngineError::Configuration("CTXENG_MAX_CHUNK_SIZE must be a positive integer".into()))?;
    }

    validate(&config)?;
    Ok(config)
}

fn validate(config: &EngineConfig) -> Result<()> {
    if config.repositories.is_empty() {
        return Err(EngineError::Configuration(
            "at least one repository must be configured".into(),
        ));
    }

    for repo in &config.repositories {
        if repo.name.is_empty() {
            return Err(EngineError::Configuration("repository name must not be empty".into()));
        }
        if repo.sync_interval == 0 {
            return Err(EngineError::Configuration(format!(
                "repositories.{}.sync_interval must be > 0",
                repo.name
            )));
        }
        if repo.auth_type == AuthType::Token && repo.credentials.is_none() {
            return Err(EngineError::Configuration(format!(
                "repositories.{}.credentials required when auth_type is 'token'",
                repo.name
            )));
        }
    }

    if config.context_generation.max_chunks == 0 {
        return Err(EngineError::Configuration("context_generation.max_chunks must be > 0".into()));
    }
    if !(0.0..=1.0).contains(&config.context_generation.expansion_threshold) {
        return Err(EngineError::Configuration(
            "context_generation.expansion_threshold must be in [0.0, 1.0]".into(),
        ));
    }

    let embedding = &config.vector_store.embedding;
    if embedding.is_enabled() {
        if embedding.dims.is_none() || embedding.dims == Some(0) {
            return Err(EngineError::Configuration(format!(
                "vector_store.embedding.dims must be > 0 when provider is '{}'",
                embedding.provider
            )));
        }
        if embedding.model.is_none() {
            return Err(EngineError::Configuration(format!(
                "vector_store.embedding.model must be specified when provider is '{}'",
                embedding.provider
            )));
        }
        match embedding.provider.as_str() {
            "http" => {}
            other => {
                return Err(EngineError::Configuration(format!(
                    "unknown embedding provider: '{}'. must be 'disabled' or 'http'",
                    other
                )))
            }
        }
    }

    if config.vector_store.store_type == "qdrant" && config.vector_store.qdrant.is_none() {
        return Err(EngineError::Configuration(
            "vector_store.qdrant config required when vector_store.type is 'qdrant'".into(),
        ));
    }

    if config.chunking.max_fragment_size == 0 {
        return Err(EngineError::Configuration("chunking.max_fragment_size must be > 0".into()));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write_config(contents: &str) -> tempfile::NamedTempFile {
        use std::io::Write;
        let mut f = tempfile::NamedTempFile::new().unwrap();
        f.write_all(contents.as_bytes()).unwrap();
        f
    }

    #[test]
    fn rejects_empty_repositories() {
        let f = write_config(r#"{"project":{"name":"p"},"repositories":[]}"#);
        let err = load_config(f.path()).unwrap_err();
        assert!(matches!(err, EngineError::Configuration(_)));
    }

    #[test]
    fn accepts_minimal_valid_config() {
        let f = write_config(
            r#"{"project":{"name":"p"},"repositories":[{"name":"docs","url":"https://example.com/docs.git"}]}"#,
        );
        let config = load_config(f.path()).unwrap();
        assert_eq!(config.repositories.len(), 1);
        assert_eq!(config.repositories[0].sync_interval, 60);
    }

    #[test]
    fn chunking_defaults_match_the_chunker_constants() {
        let f = write_config(
            r#"{"project":{"name":"p"},"repositories":[{"name":"docs","url":"https://example.com/docs.git"}]}"#,
        );
        let config = load_config(f.path()).unwrap();
        assert_eq!(config.chunking.max_fragment_size, crate::chunk::MAX_FRAGMENT_SIZE);
        assert_eq!(config.chunking.overlap_lines, crate::chunk::OVERLAP_LINES);
    }

    #[test]
    fn chunking_accepts_configured_overrides() {
        let f = write_config(
            r#"{"project":{"name":"p"},"repositories":[{"name":"docs","url":"https://example.com/docs.git"}],"chunking":{"maxFragmentSize":2000,"overlapLines":5,"charOverlap":300}}"#,
        );
        let config = load_config(f.path()).unwrap();
        assert_eq!(config.chunking.max_fragment_size, 2000);
        assert_eq!(config.chunking.overlap_lines, 5);
        assert_eq!(config.chunking.char_overlap, 300);
    }

    #[test]
    fn rejects_token_auth_without_credentials() {
        let f = write_config(
            r#"{"project":{"name":"p"},"repositories":[{"name":"docs","url":"u","authType":"token"}]}"#,
        );
        let err = load_config(f.path()).unwrap_err();
        assert!(matches!(err, EngineError::Configuration(_)));
    }
}
