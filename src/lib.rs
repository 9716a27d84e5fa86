//! # doc-chat
//!
//! A retrieval-augmented chatbot backend. Documents dropped in a folder are
//! loaded, split into overlapping chunks, embedded and stored in a vector
//! index; questions are answered by an LLM from the most similar chunks.
//!
//! ## Architecture
//!
//! ```text
//!   Ingest                               Chat
//!   ──────                               ────
//!   docs folder (pdf/docx/txt/html/md)   POST /chat {message, userId, role}
//!          │                                   │
//!          ▼                                   ▼
//!   ┌──────────────┐                    ┌──────────────┐
//!   │ Loader        │                    │ Role router  │ namespace, model,
//!   │ + domain tag  │                    └──────┬───────┘ domain, threshold
//!   └──────┬───────┘                           │
//!          ▼                                   ▼
//!   ┌──────────────┐                    ┌──────────────┐
//!   │ Recursive     │                    │ Embed query  │
//!   │ splitter      │                    └──────┬───────┘
//!   │ 500 / 100     │                           ▼
//!   └──────┬───────┘                    ┌──────────────┐
//!          ▼                            │ Top-k cosine │
//!   ┌──────────────┐                    │ + threshold  │
//!   │ Embed batches │                    └──────┬───────┘
//!   └──────┬───────┘                           ▼
//!          ▼                            ┌──────────────┐
//!   ┌──────────────┐   ◄── query ──     │ "Stuff"      │
//!   │ Vector index  │                    │ prompt → LLM │
//!   │ local|pinecone│                    └──────┬───────┘
//!   └──────────────┘                           ▼
//!                                       {response, sources, context}
//! ```
//!
//! ## Module Overview
//!
//! - [`config`] - Environment-based configuration for server, providers, retrieval and roles
//! - [`models`] - Shared data types: pages, chunks, chat request/response, answers
//! - [`ingest::loader`] - Folder loader for PDF, Word, text, HTML and Markdown files
//! - [`ingest::domain`] - Filename keyword tagging into business domains
//! - [`ingest::pipeline`] - Load → chunk → embed → index run with tracked status
//! - [`chunking`] - Recursive character splitter with overlap
//! - [`llm::embeddings`] - Batch embedding via text-embeddings-inference, Ollama or OpenAI-compatible APIs
//! - [`llm::chat`] - Chat completion via OpenAI-compatible APIs (Groq) or Ollama
//! - [`index`] - Vector index backends: local JSON-persisted store and Pinecone
//! - [`rag::routing`] - Role to namespace/model/filter resolution
//! - [`rag::pipeline`] - Retrieval, relevance filtering and grounded answer generation
//! - [`api`] - Axum HTTP handlers for chat, health and ingest
//! - [`state`] - Shared application state

pub mod api;
pub mod chunking;
pub mod config;
pub mod index;
pub mod ingest;
pub mod llm;
pub mod models;
pub mod rag;
pub mod state;

#[cfg(test)]
mod testing;
