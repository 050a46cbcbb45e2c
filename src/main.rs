//! # ctxeng
//!
//! CLI front-end for the context engine: synchronize configured
//! repositories, chunk and index their documents, run context queries
//! against the index, and report index statistics.

use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};

use ctx_engine::config::{self, RepositoryConfig};
use ctx_engine::context_generator::ContextQuery;
use ctx_engine::models::{Document, DocumentKind, PayloadValue};
use ctx_engine::{chunk, path_security, Engine};

const MAX_FILE_BYTES: u64 = 5_000_000;

#[derive(Parser)]
#[command(name = "ctxeng", about = "A local documentation indexing and retrieval engine", version)]
struct Cli {
    /// Path to the JSON configuration file
    #[arg(long, global = true, default_value = "./config/engine.json")]
    config: PathBuf,

    /// Root directory for repository working copies
    #[arg(long, global = true, default_value = "./data/repositories")]
    repositories_root: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Clone or pull every configured repository and report changed files
    Sync {
        /// Only sync this repository by name
        #[arg(long)]
        repository: Option<String>,
    },

    /// Sync (if needed) and index a repository's documents into the vector store
    Index {
        /// Repository name to index
        repository: String,
    },

    /// Register periodic sync tasks for configured repositories and run until interrupted
    Schedule {
        /// Only schedule this repository by name (defaults to every configured repository)
        #[arg(long)]
        repository: Option<String>,
    },

    /// Run a context query against the index
    Search {
        /// Task text
        task: String,

        #[arg(long)]
        language: Option<String>,

        #[arg(long)]
        framework: Option<String>,

        #[arg(long)]
        limit: Option<usize>,
    },

    /// Print point/document counts for the configured collection
    Stats,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let cfg = config::load_config(&cli.config)?;
    let engine = Engine::new(cfg, cli.repositories_root.clone())?;

    match cli.command {
        Commands::Sync { repository } => run_sync(&engine, repository.as_deref()).await?,
        Commands::Index { repository } => run_index(&engine, &repository, &cli.repositories_root).await?,
        Commands::Schedule { repository } => run_schedule(&engine, repository.as_deref()).await?,
        Commands::Search { task, language, framework, limit } => {
            run_search(&engine, task, language, framework, limit).await?
        }
        Commands::Stats => run_stats(&engine).await?,
    }

    Ok(())
}

async fn run_sync(engine: &Engine, only: Option<&str>) -> anyhow::Result<()> {
    let repos: Vec<RepositoryConfig> = engine
        .config
        .repositories
        .iter()
        .filter(|r| only.map_or(true, |name| r.name == name))
        .cloned()
        .collect();

    if repos.is_empty() {
        println!("no matching repositories configured");
        return Ok(());
    }

    let results = engine.synchronizer.sync_all(&repos).await;
    for (name, result) in results {
        match result {
            Ok(changed) => println!("{}: {} file(s) changed", name, changed.len()),
            Err(e) => println!("{}: failed ({})", name, e),
        }
    }
    Ok(())
}

async fn run_index(engine: &Engine, repository_name: &str, repositories_root: &Path) -> anyhow::Result<()> {
    let repo_config = engine
        .config
        .repositories
        .iter()
        .find(|r| r.name == repository_name)
        .ok_or_else(|| anyhow::anyhow!("no repository named '{}' configured", repository_name))?;

    let changed = engine.synchronizer.pull(repo_config).await?;
    let working_dir = path_security::repository_dir(repositories_root, repository_name)?;
    let chunk_options = engine.config.chunking.to_options();

    let mut documents = Vec::new();
    for rel_path in changed {
        let full_path = working_dir.join(&rel_path);
        if path_security::validate_file_read(repositories_root, &full_path, MAX_FILE_BYTES).is_err() {
            continue;
        }
        let Ok(content) = std::fs::read_to_string(&full_path) else { continue };
        let document = build_document(repo_config, &rel_path, &content, chunk_options);
        documents.push(document);
    }

    println!("chunked {} document(s)", documents.len());

    let mut all_fragments = Vec::new();
    for mut document in documents {
        // A document's chunking boundaries can shift between syncs; drop its
        // previously indexed fragments before the fresh set replaces them.
        engine.store.delete_by_document(&document.id).await?;

        if engine.embedder.dims() > 0 {
            let texts: Vec<String> = document.fragments.iter().map(|f| f.content.clone()).collect();
            if !texts.is_empty() {
                let vectors = engine.embedder.embed(&texts).await?;
                for (fragment, vector) in document.fragments.iter_mut().zip(vectors) {
                    fragment.embedding = Some(vector);
                }
            }
        }
        all_fragments.append(&mut document.fragments);
    }

    let summary = engine.store.upsert(&all_fragments).await?;
    println!(
        "indexed {} fragment(s) across {} batch(es), {} failed, {} skipped",
        summary.fragments_written, summary.batches_total, summary.batches_failed, summary.fragments_skipped
    );
    Ok(())
}

async fn run_schedule(engine: &Engine, only: Option<&str>) -> anyhow::Result<()> {
    let repos: Vec<RepositoryConfig> = engine
        .config
        .repositories
        .iter()
        .filter(|r| only.map_or(true, |name| r.name == name))
        .cloned()
        .collect();

    if repos.is_empty() {
        println!("no matching repositories configured");
        return Ok(());
    }

    for repo in &repos {
        println!("scheduling '{}' every {} minute(s)", repo.name, repo.sync_interval);
        engine.synchronizer.schedule(repo.clone()).await;
    }

    tokio::signal::ctrl_c().await?;

    for repo in &repos {
        engine.synchronizer.cancel(&repo.name).await;
    }
    Ok(())
}

fn build_document(
    repo_config: &RepositoryConfig,
    rel_path: &str,
    content: &str,
    chunk_options: chunk::ChunkOptions,
) -> Document {
    let repository = repo_config.name.as_str();
    let kind = document_kind(rel_path);
    let document_id = format!("{}:{}", repository, rel_path);
    let last_modified = chrono::Utc::now();
    let mut fragments = chunk::chunk_document_with_options(&document_id, rel_path, content, chunk_options);
    for fragment in &mut fragments {
        fragment.repository = repository.to_string();
        fragment.metadata.insert("priority".into(), PayloadValue::Str(priority_tag(repo_config.priority)));
        fragment
            .metadata
            .insert("last_modified_nanos".into(), PayloadValue::Str(last_modified.timestamp_nanos_opt().unwrap_or(0).to_string()));
        if let Some(category) = &repo_config.category {
            fragment.metadata.insert("category".into(), PayloadValue::Str(category.clone()));
        }
    }

    Document {
        id: document_id,
        repository: repository.to_string(),
        path: rel_path.to_string(),
        kind,
        content: content.to_string(),
        metadata: Default::default(),
        content_hash: chunk::content_hash(content),
        last_modified,
        fragments,
    }
}

fn priority_tag(priority: ctx_engine::models::Priority) -> String {
    match priority {
        ctx_engine::models::Priority::High => "high".to_string(),
        ctx_engine::models::Priority::Medium => "medium".to_string(),
        ctx_engine::models::Priority::Low => "low".to_string(),
    }
}

fn document_kind(path: &str) -> DocumentKind {
    match chunk::detect_kind(path) {
        chunk::Kind::Markdown => DocumentKind::Markdown,
        chunk::Kind::RestructuredText => DocumentKind::RestructuredText,
        chunk::Kind::Html => DocumentKind::Html,
        chunk::Kind::SourceCode => DocumentKind::SourceCode,
        chunk::Kind::Yaml => DocumentKind::Yaml,
        chunk::Kind::Json => DocumentKind::Json,
        chunk::Kind::PlainText => DocumentKind::PlainText,
    }
}

async fn run_search(
    engine: &Engine,
    task: String,
    language: Option<String>,
    framework: Option<String>,
    limit: Option<usize>,
) -> anyhow::Result<()> {
    let query = ContextQuery { task, language, framework, limit, ..Default::default() };
    let context = engine.context_generator().generate(&query).await?;

    println!("confidence: {:.2}", context.confidence);
    for item in &context.overview {
        println!("- {}", item.document_id);
        if let Some(heading) = &item.heading {
            println!("    heading: {}", heading);
        }
        if let Some(paragraph) = &item.paragraph_summary {
            println!("    summary: {}", paragraph.replace('\n', " "));
        }
        if let Some(code) = &item.code_preview {
            println!("    code: {}", code.replace('\n', " / "));
        }
    }
    Ok(())
}

async fn run_stats(engine: &Engine) -> anyhow::Result<()> {
    let (points, indexed) = engine.store.stats().await?;
    let documents = ctx_engine::vector_store::VectorStoreCoordinator::estimated_document_count(points);
    println!("points: {}", points);
    println!("indexed vectors: {}", indexed);
    println!("estimated documents: {}", documents);
    Ok(())
}
