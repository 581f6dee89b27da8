//! # Ilaria RAG Core
//!
//! Retrieval logic for the Ilaria assistant: Markdown chunking, a flat L2
//! vector index with an on-disk snapshot, provider traits for embeddings
//! and text generation, prompt assembly, and the retrieval orchestrator.
//!
//! The crate performs no network I/O. Concrete embedding and language
//! model backends implement [`embedding::Embedder`] and
//! [`generation::Generator`] in the `ilaria-rag` app crate.
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`chunk`] | Heading-aware, character-windowed Markdown splitter |
//! | [`index`] | Exact nearest-neighbour index and snapshot format |
//! | [`rag`] | Ingestion and question answering |
//! | [`prompt`] | Grounded prompt template |
//! | [`models`] | Shared data types |
//! | [`error`] | [`RagError`](error::RagError) taxonomy |

pub mod chunk;
pub mod embedding;
pub mod error;
pub mod generation;
pub mod index;
pub mod models;
pub mod prompt;
pub mod rag;

pub use error::{RagError, Result};
pub use rag::{RagSettings, RetrievalService};
