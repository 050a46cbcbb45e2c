//! # ctx-engine
//!
//! **A local documentation indexing and retrieval engine for AI coding tools.**
//!
//! ctx-engine tracks a set of configured Git repositories, chunks their
//! documents into semantically coherent fragments, embeds and indexes those
//! fragments in a Qdrant vector store, and answers task-shaped queries with
//! a ranked, progressively-expandable context view.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────┐   ┌──────────────────┐   ┌───────────────┐
//! │ Repository            │──▶│ Document          │──▶│ Vector Index   │
//! │ Synchronizer (git)    │   │ Chunker           │   │ Coordinator     │
//! └──────────────────────┘   └──────────────────┘   └───────┬───────┘
//!                                                            │
//!                                                            ▼
//!                                                  ┌───────────────────┐
//!                                                  │ Context Generator  │
//!                                                  │ + Progressive View │
//!                                                  └───────────────────┘
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | JSON configuration parsing and validation |
//! | [`models`] | Core data types: `Document`, `Fragment`, `RankedResult` |
//! | [`error`] | Typed error taxonomy shared across subsystems |
//! | [`path_security`] | Path sanitization and confinement under the repositories root |
//! | [`repo_sync`] | Git-backed repository synchronizer |
//! | [`chunk`] | Kind-dispatched document chunker (markdown, RST, HTML, code, structured, plain) |
//! | [`embedding`] | Embedding provider trait and HTTP implementation |
//! | [`vector_store`] | Qdrant REST coordinator: upsert, search, delete, stats |
//! | [`context_generator`] | Strategy selection, ranking, and progressive view construction |
//! | [`retry`] | Generic bounded exponential backoff |
//! | [`rate_limit`] | Rolling-window rate limiter |
//! | [`circuit_breaker`] | Consecutive-failure circuit breaker |
//! | [`throttle`] | Cooperative throttle signal |
//!
//! ## Configuration
//!
//! The engine is configured via a JSON file. See [`config`] for the schema
//! and [`config::load_config`] for validation rules.

pub mod chunk;
pub mod circuit_breaker;
pub mod config;
pub mod context_generator;
pub mod embedding;
pub mod error;
pub mod models;
pub mod path_security;
pub mod rate_limit;
pub mod repo_sync;
pub mod retry;
pub mod throttle;
pub mod vector_store;

use std::path::PathBuf;
use std::sync::Arc;

use config::EngineConfig;
use error::Result;

/// Ties the four subsystems together behind the shape a CLI or embedding
/// application actually needs: sync configured repositories, chunk and
/// index their documents, and answer context queries against the index.
pub struct Engine {
    pub config: EngineConfig,
    pub synchronizer: Arc<repo_sync::RepositorySynchronizer>,
    pub embedder: Box<dyn embedding::EmbeddingProvider>,
    pub store: vector_store::VectorStoreCoordinator,
}

impl Engine {
    pub fn new(config: EngineConfig, repositories_root: PathBuf) -> Result<Self> {
        let embedder = embedding::create_provider(&config.vector_store.embedding)?;
        let qdrant = config.vector_store.qdrant.as_ref().ok_or_else(|| {
            error::EngineError::Configuration("vector_store.qdrant is required to build an engine".into())
        })?;
        let store = vector_store::VectorStoreCoordinator::new(qdrant, embedder.dims())?;

        Ok(Self {
            config,
            synchronizer: Arc::new(repo_sync::RepositorySynchronizer::new(repositories_root)),
            embedder,
            store,
        })
    }

    pub fn context_generator(&self) -> context_generator::ContextGenerator<'_> {
        context_generator::ContextGenerator::new(&self.store, self.embedder.as_ref())
            .with_expansion_threshold(self.config.context_generation.expansion_threshold)
    }
}
