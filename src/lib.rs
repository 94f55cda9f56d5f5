//! # Tarix
//!
//! Embedding-backed retrieval and question answering over the Harmonized
//! Tariff Schedule.
//!
//! Tarix serializes each tariff row into a canonical labeled text, embeds
//! those texts with a hosted sentence-embedding model, stores the vectors
//! next to the rows in SQLite, and answers free-text questions by cosine
//! nearest-neighbor retrieval plus a chat-model summarization step.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────┐   ┌───────────────────┐   ┌──────────┐
//! │ HTS records  │──▶│ Indexer            │──▶│  SQLite   │
//! │ (JSON load)  │   │ canonicalize+embed │   │ rows+vecs │
//! └──────────────┘   └───────────────────┘   └────┬─────┘
//!                                                 │
//!                             ┌───────────────────┤
//!                             ▼                   ▼
//!                        ┌──────────┐       ┌──────────┐
//!                        │   CLI    │       │   HTTP   │
//!                        │ (tarix)  │       │  (/api)  │
//!                        └──────────┘       └──────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```bash
//! tarix init                        # create database
//! tarix load data/hts.json         # import tariff records
//! tarix embed all                  # compute embeddings
//! tarix search "laptop computers"  # nearest-neighbor search
//! tarix ask "What is the duty on live horses?"
//! tarix serve                      # start the HTTP API
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration + environment credentials |
//! | [`models`] | Core data types |
//! | [`canonical`] | Canonical text serialization of records |
//! | [`embedding`] | Embedding backend abstraction and vector utilities |
//! | [`index`] | Batch embedding refresh |
//! | [`search`] | Similarity search and substring lookup |
//! | [`context`] | Context assembly for the answer generator |
//! | [`answer`] | Chat-model answer generation |
//! | [`server`] | HTTP API server |
//! | [`db`] | Database connection |
//! | [`migrate`] | Schema creation |

pub mod answer;
pub mod canonical;
pub mod config;
pub mod context;
pub mod db;
pub mod embedding;
pub mod error;
pub mod http;
pub mod index;
pub mod ingest;
pub mod migrate;
pub mod models;
pub mod progress;
pub mod search;
pub mod server;
pub mod stats;
