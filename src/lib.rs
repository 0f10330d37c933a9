//! # docfusion
//!
//! Hybrid document search over SQLite. Documents are chunked, embedded, and
//! stored once per filename; queries run a vector channel and an FTS5
//! channel side by side and merge them with reciprocal rank fusion.
//!
//! The store-agnostic algorithms live in [`docfusion_core`]. This crate
//! supplies the SQLite store, filesystem and PDF collaborators, embedding
//! providers, configuration, and the `docfusion` CLI.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────┐   ┌──────────────────┐   ┌───────────┐
//! │ FsLister    │──▶│ Ingestion        │──▶│  SQLite   │
//! │ FileLoader  │   │ coordinator      │   │ FTS5+Vec  │
//! └─────────────┘   └──────────────────┘   └─────┬─────┘
//!                                                │
//!                        ┌───────────────────────┘
//!                        ▼
//!                 ┌──────────────┐      ┌──────────┐
//!                 │ Hybrid engine│─────▶│   CLI    │
//!                 │ (RRF)        │      │(docfusion)│
//!                 └──────────────┘      └──────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```bash
//! docfusion init                        # create database
//! docfusion ingest ./docs               # ingest new files
//! docfusion query "connection pooling"  # hybrid search
//! docfusion delete notes.md             # remove a file and its chunks
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`db`] | Database connection |
//! | [`migrate`] | Schema migrations |
//! | [`sqlite_store`] | SQLite implementation of the store contract |
//! | [`lister`] | Directory listing |
//! | [`loader`] | Text and PDF extraction |
//! | [`embedding`] | Embedding providers |
//! | [`app`] | Service composition |
//! | [`ingest`] | `ingest` and `delete` commands |
//! | [`search`] | `query` and `files` commands |

pub mod app;
pub mod config;
pub mod db;
pub mod embedding;
pub mod ingest;
pub mod lister;
pub mod loader;
pub mod migrate;
pub mod search;
pub mod sqlite_store;
