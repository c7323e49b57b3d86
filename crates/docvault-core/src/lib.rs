//! # docvault Core
//!
//! Runtime-free logic for docvault: data models, the recursive text
//! splitter, the embedding provider chain with its deterministic fallback,
//! the document store abstraction, and similarity ranking.
//!
//! This crate contains no tokio, sqlx, filesystem I/O, or other
//! native-only dependencies. Concrete stores, embedding backends, and
//! content extraction live in the `docvault` application crate.

pub mod chunk;
pub mod embedding;
pub mod error;
pub mod models;
pub mod search;
pub mod store;

pub use error::{Result, VaultError};
