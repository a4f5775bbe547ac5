//! # ragline
//!
//! A local retrieval-augmented generation pipeline: ingest PDF, DOCX,
//! Markdown and plain-text files into a vector index, then ask questions
//! grounded in them, chat, summarize and extract structured information.
//!
//! The pure pipeline logic (chunking, assembly, the index and prompt
//! templates) lives in the `ragline-core` crate. This crate adds the I/O:
//! file loaders, HTTP backends for embeddings and language models, the
//! SQLite index engine, session persistence, a CLI and an HTTP server.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────┐   ┌──────────────┐   ┌────────────┐   ┌──────────────┐
//! │ Loaders  │──▶│ Chunk+Embed  │──▶│ VectorIndex│◀──│  RagEngine   │
//! │PDF/DOCX/ │   │ (core)       │   │ SQLite/mem │   │  ChatEngine  │
//! │ TXT/MD   │   └──────────────┘   └────────────┘   └──────┬───────┘
//! └──────────┘                                             │
//!                                  ┌───────────────────────┤
//!                                  ▼                       ▼
//!                             ┌──────────┐           ┌──────────┐
//!                             │   CLI    │           │   HTTP   │
//!                             │(ragline) │           │  (axum)  │
//!                             └──────────┘           └──────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```bash
//! ragline ingest ./docs
//! ragline query "What does the report conclude?" --sources
//! ragline chat
//! ragline serve
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`loader`] | Validation and text extraction per format |
//! | [`embedding`] | Ollama / OpenAI embedding backends |
//! | [`llm`] | Language model trait and Ollama backend |
//! | [`sqlite_store`] | SQLite vector index engine |
//! | [`ingest`] | File and directory ingestion |
//! | [`rag`] | Grounded question answering |
//! | [`chat`] | Multi-turn chat sessions |
//! | [`session_store`] | Session snapshots on disk |
//! | [`summarize`] | Single-pass and map-reduce summaries |
//! | [`extractor`] | Entities, keywords and key points |
//! | [`services`] | Wiring from configuration |
//! | [`server`] | HTTP API |
//! | [`db`] | Database connection |
//! | [`migrate`] | Schema migrations |

pub mod chat;
pub mod commands;
pub mod config;
pub mod db;
pub mod embedding;
pub mod extractor;
pub mod ingest;
pub mod llm;
pub mod loader;
pub mod logging;
pub mod migrate;
pub mod rag;
pub mod server;
pub mod services;
pub mod session_store;
pub mod sqlite_store;
pub mod summarize;
