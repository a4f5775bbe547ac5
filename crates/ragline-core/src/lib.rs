//! # ragline core
//!
//! Pure pipeline logic for ragline: data models, deterministic chunking,
//! document assembly, the embedding gateway, the vector store trait with
//! an in-memory engine, the document-level vector index, prompt
//! templates, chat session state and extraction parsing.
//!
//! This crate contains no tokio, sqlx, HTTP client or filesystem I/O.
//! Backends for embeddings, language models and persistent storage are
//! provided by the `ragline` app crate through the traits defined here.
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`models`] | Documents, chunks, indexed records, query hits |
//! | [`chunk`] | Recursive boundary-aware chunker |
//! | [`document`] | Id hashing and chunk assembly |
//! | [`embedding`] | [`embedding::Embedder`] trait, gateway, vector utils |
//! | [`store`] | [`store::VectorStore`] trait and in-memory engine |
//! | [`index`] | Insert / query / delete over a collection |
//! | [`prompt`] | Context blocks and prompt templates |
//! | [`chat`] | Chat session history |
//! | [`extraction`] | Entity / keyword / key-point results |
//! | [`error`] | Error taxonomy |

pub mod chat;
pub mod chunk;
pub mod document;
pub mod embedding;
pub mod error;
pub mod extraction;
pub mod index;
pub mod models;
pub mod prompt;
pub mod store;

pub use error::{Error, Result};
