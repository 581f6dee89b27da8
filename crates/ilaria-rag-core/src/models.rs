//! Data types that flow through ingestion and retrieval.
//!
//! A [`Chunk`] is produced by the chunker, becomes an [`IndexedDocument`]
//! once embedded, and comes back out of the index as a [`SearchResult`].
//! [`Answer`] is what the orchestrator hands to the HTTP layer.

use serde::{Deserialize, Serialize};

/// A bounded span of document text, the unit of retrieval.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chunk {
    /// Dense, zero-based id assigned in emission order across the document.
    pub id: usize,
    /// Trimmed, non-empty text.
    pub content: String,
    /// Heading text of the section this chunk came from, or `"Unknown"`.
    pub section_title: String,
    /// File name of the source document.
    pub source_name: String,
}

impl Chunk {
    /// Payload stored next to the chunk's vector in the index.
    pub fn metadata(&self) -> ChunkMetadata {
        ChunkMetadata {
            source: self.source_name.clone(),
            section: self.section_title.clone(),
            chunk_id: Some(self.id),
        }
    }
}

/// Payload kept alongside each vector.
///
/// The default value is the empty metadata synthesized when a caller adds
/// texts without metadata.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChunkMetadata {
    pub source: String,
    pub section: String,
    pub chunk_id: Option<usize>,
}

/// One stored entry of the vector index: text, payload, and vector together.
#[derive(Debug, Clone, PartialEq)]
pub struct IndexedDocument {
    pub content: String,
    pub metadata: ChunkMetadata,
    pub vector: Vec<f32>,
}

/// A nearest-neighbour hit. Produced per query and never persisted.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SearchResult {
    pub content: String,
    pub metadata: ChunkMetadata,
    /// Squared Euclidean distance to the query (smaller is closer).
    pub distance: f32,
    /// Insertion position of the matched entry in the index.
    pub position: usize,
}

/// Speaker of a conversation turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

/// A single prior message in the conversation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversationTurn {
    pub role: Role,
    pub content: String,
}

impl ConversationTurn {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}

/// A citation returned with an answer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Source {
    /// 1-based retrieval rank.
    pub id: usize,
    /// Leading excerpt of the chunk text.
    pub content: String,
    /// Section title of the chunk.
    pub section: String,
}

/// Metadata attached to every answer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnswerMetadata {
    /// Model that produced the answer; absent when the model was not called.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    /// Number of chunks retrieved for the query.
    pub retrieved_docs: usize,
}

/// The shaped result of answering a question.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Answer {
    pub answer: String,
    pub sources: Vec<Source>,
    pub metadata: AnswerMetadata,
}
