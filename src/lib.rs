//! # Ilaria RAG
//!
//! Retrieval-augmented assistant answering Georgian-language questions
//! about the ilaria application from a single Markdown knowledge base.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────┐   ┌─────────────┐   ┌──────────────┐
//! │  Markdown    │──▶│  Chunk +    │──▶│  Flat L2     │
//! │  document    │   │  Embed      │   │  index (disk)│
//! └──────────────┘   └─────────────┘   └──────┬───────┘
//!                                             │
//!                      ┌──────────────────────┤
//!                      ▼                      ▼
//!                 ┌──────────┐          ┌──────────┐
//!                 │   CLI    │          │   HTTP   │
//!                 │ (ilaria) │          │  (chat)  │
//!                 └──────────┘          └──────────┘
//! ```
//!
//! Chunking, indexing, and the orchestrator live in `ilaria-rag-core`;
//! this crate supplies configuration, provider clients, and the surfaces.
//!
//! ## Quick Start
//!
//! ```bash
//! export GEMINI_API_KEY=...
//! ilaria ingest            # build the index from data/ilaria-instructions.md
//! ilaria ask "რა არის ilaria?"
//! ilaria serve             # start the HTTP server on 0.0.0.0:8000
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration with environment overrides |
//! | [`embedding`] | Embedding providers (local, OpenAI, Ollama) |
//! | [`llm`] | Language model clients (Gemini, Ollama) |
//! | [`service`] | Startup wiring and CLI operations |
//! | [`server`] | HTTP API |

pub mod config;
pub mod embedding;
pub mod llm;
pub mod server;
pub mod service;
