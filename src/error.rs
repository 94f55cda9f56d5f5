//! Typed errors for the retrieval pipeline.
//!
//! Each variant maps to a distinct failure class with its own propagation
//! policy:
//! - [`Error::InvalidQuery`] — caller error, surfaced as HTTP 400, never retried.
//! - [`Error::EmbeddingBackend`] — the embedding service was unreachable or
//!   returned a malformed response after retries were exhausted.
//! - [`Error::MalformedRecord`] — a canonical text failed to re-parse during
//!   indexing; the indexing run aborts rather than persisting corrupted data.
//! - [`Error::ModelMismatch`] — stored vectors were produced by a different
//!   embedding model than the query vector; they are not comparable.
//! - [`Error::AnswerBackend`] — the chat completion service failed.
//! - [`Error::Store`] — database connection or query failure.

use thiserror::Error;

/// Errors produced by the Tarix indexing and retrieval pipeline.
#[derive(Debug, Error)]
pub enum Error {
    /// The search query was empty or whitespace-only.
    #[error("query must not be empty")]
    InvalidQuery,

    /// The embedding backend was unreachable or returned a malformed response.
    #[error("embedding backend error: {0}")]
    EmbeddingBackend(String),

    /// A canonical record text failed to re-parse into its field values.
    #[error("malformed canonical record: {0}")]
    MalformedRecord(String),

    /// Stored embeddings were produced by a different model than the query.
    #[error("embedding model mismatch: store has '{stored}', query used '{query}'")]
    ModelMismatch { stored: String, query: String },

    /// The answer-generation backend failed.
    #[error("answer backend error: {0}")]
    AnswerBackend(String),

    /// Database connection or query failure.
    #[error("store error: {0}")]
    Store(#[from] sqlx::Error),
}

/// Result alias used throughout the library core.
pub type Result<T> = std::result::Result<T, Error>;
