//! Application wiring.
//!
//! Builds providers from configuration, opens the on-disk index, and runs
//! the orchestrator's startup. Also hosts the non-server CLI operations:
//! `ingest`, `ask`, and `stats`.

use anyhow::{anyhow, Context, Result};
use std::sync::Arc;

use ilaria_rag_core::embedding::Embedder;
use ilaria_rag_core::index::{self, VectorIndex};
use ilaria_rag_core::rag::ingest_document;
use ilaria_rag_core::RetrievalService;

use crate::config::Config;
use crate::embedding::{configured_dims, create_embedder};
use crate::llm::create_generator;

/// Build providers and initialize the retrieval service.
///
/// Returns `Ok(None)` when the service cannot be brought up for a
/// recoverable reason (missing API key, unreachable model, embedding
/// failure); the HTTP layer then answers chat requests with 503. Errors
/// in the knowledge base itself (missing document, corrupt or mismatched
/// index) are returned as `Err` and abort startup.
pub async fn start_service(config: &Config) -> Result<Option<Arc<RetrievalService>>> {
    let embedder = match create_embedder(&config.embedding) {
        Ok(e) => e,
        Err(e) => {
            tracing::error!(error = %format!("{:#}", e), "embedding provider unavailable");
            return Ok(None);
        }
    };
    let generator = match create_generator(&config.llm) {
        Ok(g) => g,
        Err(e) => {
            tracing::error!(error = %format!("{:#}", e), "language model unavailable");
            return Ok(None);
        }
    };

    let index = VectorIndex::open(&config.retrieval.index_path, embedder.dims())
        .with_context(|| {
            format!(
                "Failed to open index at {}",
                config.retrieval.index_path.display()
            )
        })?;

    match RetrievalService::initialize(
        embedder,
        generator,
        index,
        &config.document.path,
        config.rag_settings(),
    )
    .await
    {
        Ok(service) => Ok(Some(Arc::new(service))),
        Err(e) if e.is_fatal() => Err(anyhow::Error::new(e).context("Failed to prepare knowledge base")),
        Err(e) => {
            tracing::error!(error = %e, "retrieval service failed to initialize");
            Ok(None)
        }
    }
}

/// Ingest the configured document into the on-disk index.
///
/// Without `rebuild`, an already-populated index is left untouched. With
/// `rebuild`, the snapshot is deleted first and the document re-ingested.
pub async fn run_ingest(config: &Config, rebuild: bool) -> Result<()> {
    let embedder = create_embedder(&config.embedding)?;
    run_ingest_with(config, embedder.as_ref(), rebuild).await
}

/// [`run_ingest`] with a caller-supplied embedder.
pub async fn run_ingest_with(config: &Config, embedder: &dyn Embedder, rebuild: bool) -> Result<()> {
    let index_path = &config.retrieval.index_path;

    if rebuild {
        index::remove_snapshot(index_path)
            .with_context(|| format!("Failed to remove index at {}", index_path.display()))?;
        println!("Removed existing index at {}", index_path.display());
    }

    let mut index = VectorIndex::open(index_path, embedder.dims())
        .with_context(|| format!("Failed to open index at {}", index_path.display()))?;

    if !index.is_empty() {
        println!(
            "Index at {} already holds {} chunks; use --rebuild to re-ingest.",
            index_path.display(),
            index.len()
        );
        return Ok(());
    }

    let added = ingest_document(embedder, &mut index, &config.document.path, &config.rag_settings())
        .await
        .with_context(|| format!("Failed to ingest {}", config.document.path.display()))?;

    println!("Ingest {}", config.document.path.display());
    println!("  chunks indexed: {}", added);
    println!("  embedding model: {}", embedder.model_name());
    println!("  index: {}", index_path.display());
    println!("ok");
    Ok(())
}

/// Answer one question from the terminal.
pub async fn run_ask(config: &Config, question: &str) -> Result<()> {
    let service = start_service(config)
        .await?
        .ok_or_else(|| anyhow!("Retrieval service unavailable; check provider configuration"))?;

    let answer = service.answer(question, &[]).await?;

    println!("{}", answer.answer);
    if !answer.sources.is_empty() {
        println!();
        println!("Sources:");
        for source in &answer.sources {
            println!("  [{}] {} :: {}", source.id, source.section, source.content);
        }
    }
    Ok(())
}

/// Print index cardinality and dimension without loading any model.
pub fn run_stats(config: &Config) -> Result<()> {
    let index_path = &config.retrieval.index_path;
    let info = index::inspect(index_path)
        .with_context(|| format!("Failed to read index at {}", index_path.display()))?;

    println!("Ilaria RAG — Index Stats");
    println!("========================");
    println!();
    println!("  Index:       {}", index_path.display());
    println!("  Document:    {}", config.document.path.display());
    println!(
        "  Embedding:   {} ({})",
        config.embedding.model, config.embedding.provider
    );

    match info {
        Some(info) => {
            println!("  Chunks:      {}", info.count);
            println!("  Dimension:   {}", info.dimension);
            if let Some(expected) = configured_dims(&config.embedding) {
                if expected != info.dimension {
                    println!(
                        "  Warning:     configured embedder produces {} dims; rebuild the index",
                        expected
                    );
                }
            }
        }
        None => {
            println!("  Chunks:      0 (no index yet; run `ilaria ingest`)");
        }
    }
    Ok(())
}
