//! # docfusion core
//!
//! Store-agnostic logic for docfusion: the data model, the [`store::Store`]
//! contract, reciprocal rank fusion, the hybrid retrieval engine, and the
//! idempotent ingestion coordinator.
//!
//! This crate does no filesystem or database I/O of its own. Directory
//! listing, document loading, embedding, and persistence are reached
//! through the traits in [`loader`], [`embedding`], and [`store`], which the
//! `docfusion` application crate implements.
//!
//! ```text
//!  ingest:  FileLister ─▶ manifest_diff ─▶ DocumentLoader ─▶ Embedder ─▶ create_file_with_chunks
//!  query:   (text, embedding) ─▶ vector_query ┐
//!                               lexical_query ┴─▶ reciprocal rank fusion ─▶ Vec<RankedHit>
//! ```

pub mod chunk;
pub mod embedding;
pub mod error;
pub mod fusion;
pub mod ingest;
pub mod loader;
pub mod models;
pub mod search;
pub mod store;

pub use error::{Error, Result};
