//! Retrieval orchestrator.
//!
//! Ties chunker, embedder, and index together. Startup runs
//! [`RetrievalService::initialize`], which ingests the source document only
//! when the index is empty and then freezes the index. Each query runs
//! embed → search → prompt → generate → shape.
//!
//! ```text
//! initialize:  load doc ─▶ split_markdown ─▶ embed_many ─▶ VectorIndex::add ─▶ ReadyIndex
//! answer:      embed_one ─▶ ReadyIndex::search ─▶ build_prompt ─▶ generate ─▶ Answer
//! ```

use std::path::Path;
use std::sync::Arc;

use crate::chunk::{load_document, split_markdown, UNKNOWN_SECTION};
use crate::embedding::Embedder;
use crate::error::{RagError, Result};
use crate::generation::{GenerationParams, Generator};
use crate::index::{ReadyIndex, VectorIndex};
use crate::models::{Answer, AnswerMetadata, Chunk, ConversationTurn, SearchResult, Source};
use crate::prompt::{build_prompt, context_block, history_block};

/// Canned answer returned when nothing was retrieved.
pub const NO_RELEVANT_INFO: &str = "უკაცრავად, ვერ ვიპოვე რელევანტური ინფორმაცია.";

/// Maximum number of citations attached to an answer.
pub const MAX_SOURCES: usize = 3;

/// Characters of chunk text kept in a citation.
pub const SOURCE_PREVIEW_CHARS: usize = 200;

/// Tuning knobs for ingestion and answering.
#[derive(Debug, Clone, PartialEq)]
pub struct RagSettings {
    /// Window width in characters.
    pub chunk_size: usize,
    /// Overlap between consecutive windows in characters.
    pub chunk_overlap: usize,
    /// Number of chunks retrieved per query.
    pub top_k: usize,
    pub generation: GenerationParams,
}

impl Default for RagSettings {
    fn default() -> Self {
        Self {
            chunk_size: 1000,
            chunk_overlap: 200,
            top_k: 4,
            generation: GenerationParams::default(),
        }
    }
}

/// Chunk, embed, and index one Markdown document.
///
/// Returns the number of chunks added. A document without content adds
/// nothing and is not an error.
pub async fn ingest_document(
    embedder: &dyn Embedder,
    index: &mut VectorIndex,
    document: &Path,
    settings: &RagSettings,
) -> Result<usize> {
    let text = load_document(document)?;
    let source_name = document
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| document.display().to_string());

    let chunks = split_markdown(
        &text,
        &source_name,
        settings.chunk_size,
        settings.chunk_overlap,
    );
    if chunks.is_empty() {
        tracing::warn!(path = %document.display(), "document has no content, index stays empty");
        return Ok(0);
    }
    tracing::info!(chunks = chunks.len(), "document split into chunks");

    let texts: Vec<String> = chunks.iter().map(|c| c.content.clone()).collect();
    let metadatas = chunks.iter().map(Chunk::metadata).collect();

    let vectors = embedder
        .embed_many(&texts)
        .await
        .map_err(RagError::Embedding)?;
    index.add(texts, vectors, Some(metadatas))?;

    tracing::info!(indexed = chunks.len(), "ingestion complete");
    Ok(chunks.len())
}

/// The serving-phase handle: providers plus a frozen index.
pub struct RetrievalService {
    embedder: Arc<dyn Embedder>,
    generator: Arc<dyn Generator>,
    index: ReadyIndex,
    settings: RagSettings,
}

impl std::fmt::Debug for RetrievalService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RetrievalService")
            .field("embedder", &self.embedder.model_name())
            .field("generator", &self.generator.model_name())
            .field("documents", &self.index.len())
            .field("settings", &self.settings)
            .finish()
    }
}

impl RetrievalService {
    /// Prepare the service, ingesting `document` only if `index` is empty.
    ///
    /// A populated index is used as-is; it is not compared against the
    /// current document.
    ///
    /// # Errors
    ///
    /// - [`RagError::DimensionMismatch`] if the index and embedder disagree.
    /// - [`RagError::DocumentNotFound`] if ingestion is needed and the
    ///   document is missing.
    /// - [`RagError::Embedding`] / [`RagError::Io`] from ingestion.
    pub async fn initialize(
        embedder: Arc<dyn Embedder>,
        generator: Arc<dyn Generator>,
        mut index: VectorIndex,
        document: &Path,
        settings: RagSettings,
    ) -> Result<Self> {
        if index.dimension() != embedder.dims() {
            return Err(RagError::DimensionMismatch {
                expected: embedder.dims(),
                actual: index.dimension(),
            });
        }

        if index.is_empty() {
            ingest_document(embedder.as_ref(), &mut index, document, &settings).await?;
        } else {
            tracing::info!(count = index.len(), "index already populated, skipping ingestion");
        }

        tracing::info!(
            documents = index.len(),
            embedding_model = embedder.model_name(),
            llm_model = generator.model_name(),
            "retrieval service ready"
        );

        Ok(Self {
            embedder,
            generator,
            index: index.into_ready(),
            settings,
        })
    }

    /// Number of vectors in the index.
    pub fn document_count(&self) -> usize {
        self.index.len()
    }

    /// Name of the language model used for answers.
    pub fn model_name(&self) -> &str {
        self.generator.model_name()
    }

    /// Retrieve the `top_k` chunks nearest to `query`.
    pub async fn retrieve(&self, query: &str) -> Result<Vec<SearchResult>> {
        let query_vec = self
            .embedder
            .embed_one(query)
            .await
            .map_err(RagError::Embedding)?;
        self.index.search(&query_vec, self.settings.top_k)
    }

    /// Answer `query` grounded in the indexed document.
    ///
    /// An empty result set short-circuits to [`NO_RELEVANT_INFO`] without
    /// calling the model. Embedding and generation failures are returned
    /// unchanged.
    pub async fn answer(&self, query: &str, history: &[ConversationTurn]) -> Result<Answer> {
        if query.trim().is_empty() {
            return Err(RagError::EmptyQuery);
        }

        let hits = self.retrieve(query).await?;
        if hits.is_empty() {
            return Ok(Answer {
                answer: NO_RELEVANT_INFO.to_string(),
                sources: Vec::new(),
                metadata: AnswerMetadata {
                    model: None,
                    retrieved_docs: 0,
                },
            });
        }

        let prompt = build_prompt(&context_block(&hits), &history_block(history), query);
        tracing::debug!(
            retrieved = hits.len(),
            prompt_chars = prompt.chars().count(),
            "calling language model"
        );

        let raw = self
            .generator
            .generate(&prompt, &self.settings.generation)
            .await
            .map_err(RagError::Generation)?;

        Ok(Answer {
            answer: raw.trim().to_string(),
            sources: citations(&hits),
            metadata: AnswerMetadata {
                model: Some(self.generator.model_name().to_string()),
                retrieved_docs: hits.len(),
            },
        })
    }
}

fn citations(hits: &[SearchResult]) -> Vec<Source> {
    hits.iter()
        .take(MAX_SOURCES)
        .enumerate()
        .map(|(i, hit)| {
            let mut content: String = hit.content.chars().take(SOURCE_PREVIEW_CHARS).collect();
            content.push_str("...");
            let section = if hit.metadata.section.is_empty() {
                UNKNOWN_SECTION.to_string()
            } else {
                hit.metadata.section.clone()
            };
            Source {
                id: i + 1,
                content,
                section,
            }
        })
        .collect()
}
