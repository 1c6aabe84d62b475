//! # doc-qa
//!
//! A question-answering service over uploaded PDF documents. Each upload is
//! split into overlapping chunks, embedded, and stored in its own vector
//! index. Questions arrive over a WebSocket and are answered by a chat model
//! using the best passages found across the selected documents.
//!
//! ## Pipeline
//!
//! ```text
//!   upload ─► extract pages ─► split ─► embed ─► vectorstores/doc_{id}
//!
//!   question ─► embed once ─┬─► doc_1 top-k ─┐
//!                           ├─► doc_2 top-k ─┼─► sort by score ─► keep k×n ─► LLM ─► answer + sources
//!                           └─► doc_n top-k ─┘
//! ```
//!
//! ## Module Overview
//!
//! - [`config`] - Environment-based configuration for paths, chunking and providers
//! - [`models`] - Shared data types: `Document`, `TextChunk`, wire messages
//! - [`documents`] - JSON-persisted registry of uploaded documents
//! - [`loader`] - Per-page PDF text extraction
//! - [`chunking`] - Recursive character splitter
//! - [`llm::embeddings`] - Batch embedding generation via OpenAI or Ollama
//! - [`llm::chat`] - Single-turn completions via Anthropic, OpenAI or Ollama
//! - [`search::vector`] - Per-document cosine-similarity index with disk persistence
//! - [`search::fanin`] - Union of per-document results
//! - [`service`] - Document processing and cross-document search
//! - [`qa`] - Answer pipeline with the user-facing fallback messages
//! - [`api`] - Axum HTTP handlers and the chat WebSocket
//! - [`state`] - Shared application state

pub mod api;
pub mod chunking;
pub mod config;
pub mod documents;
pub mod error;
pub mod llm;
pub mod loader;
pub mod models;
pub mod qa;
pub mod search;
pub mod service;
pub mod state;

pub use error::{Error, Result};
