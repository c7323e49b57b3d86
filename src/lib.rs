//! # docvault
//!
//! A per-owner document knowledge base. Uploaded PDFs, text files, and
//! images are turned into text, split into overlapping chunks, embedded,
//! and stored in SQLite; queries are embedded the same way and ranked by
//! cosine similarity against the owner's chunks.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────┐   ┌──────────┐   ┌──────────┐   ┌──────────┐
//! │ Extract  │──▶│  Chunk   │──▶│  Embed   │──▶│  SQLite  │
//! │ pdf/txt/ │   │ (core)   │   │ chain +  │   │ docs +   │
//! │ image    │   │          │   │ fallback │   │ chunks   │
//! └──────────┘   └──────────┘   └──────────┘   └────┬─────┘
//!                                                   │
//!                              ┌────────────────────┤
//!                              ▼                    ▼
//!                        ┌──────────┐        ┌─────────────┐
//!                        │   CLI    │        │ Search tool │
//!                        └──────────┘        └─────────────┘
//! ```
//!
//! Runtime-free logic (models, splitter, embedding chain, store trait,
//! ranking) lives in the `docvault-core` crate.
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`db`] | Database connection |
//! | [`migrate`] | Schema migrations |
//! | [`sqlite_store`] | SQLite document store |
//! | [`embedding`] | OpenAI, Ollama, and local embedding providers |
//! | [`extract`] | PDF, text, and image (OCR) extraction |
//! | [`ingest`] | Ingestion, reprocessing, and deletion |
//! | [`search`] | Owner-scoped retrieval |
//! | [`tool`] | Agent-facing search tool |
//! | [`documents`] | Document CLI commands |
//! | [`vault`] | Component wiring |

pub mod config;
pub mod db;
pub mod documents;
pub mod embedding;
pub mod extract;
pub mod ingest;
pub mod migrate;
pub mod search;
pub mod sqlite_store;
pub mod tool;
pub mod vault;
