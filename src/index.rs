//! Batch embedding refresh over the tariff table.
//!
//! The indexing run: read target rows, canonicalize each into its
//! embeddable text, embed the texts in batches, defensively re-parse every
//! canonical text against its source row, then write all vectors in one
//! transaction. The commit happens once at the end — any failure rolls the
//! whole run back and no partial embedding state is visible to readers.
//!
//! Vectors are written update-in-place keyed by row id, so re-running
//! refreshes rows instead of duplicating them. Each vector is stored with
//! the model tag, dimensionality, and a SHA-256 of the canonical text;
//! `embed pending` uses those to pick up only new, stale, or
//! foreign-model rows.

use anyhow::{bail, Result};
use sha2::{Digest, Sha256};
use sqlx::{Row, SqlitePool};

use crate::canonical;
use crate::config::Config;
use crate::db;
use crate::embedding::{self, Embedder};
use crate::error::Error;
use crate::models::TariffRecord;
use crate::progress::{EmbedProgressReporter, ProgressMode};

/// Which rows an indexing run targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EmbedScope {
    /// Every row, refreshing existing vectors.
    All,
    /// Rows with no vector, a stale canonical-text hash, or a vector from
    /// a different model.
    Pending,
}

/// A row selected for embedding, with its canonical text precomputed.
pub struct EmbedTarget {
    pub id: i64,
    pub record: TariffRecord,
    pub canonical: String,
    pub hash: String,
}

/// Select the rows an indexing run will embed, in row-id order.
pub async fn collect_targets(
    pool: &SqlitePool,
    scope: EmbedScope,
    model: &str,
    limit: Option<usize>,
) -> Result<Vec<EmbedTarget>, Error> {
    let rows = sqlx::query(
        r#"
        SELECT id, htsnumber, indent, description, unitquantity,
               generalrateofduty, specialrateofduty, extrarateofduty,
               quotaquantity, additionalduties,
               embeddings IS NULL AS missing, embedding_model, embedding_hash
        FROM hts
        ORDER BY id
        "#,
    )
    .fetch_all(pool)
    .await?;

    let mut targets = Vec::new();
    for row in &rows {
        let record = db::record_from_row(row);
        let text = canonical::canonicalize(&record);
        let hash = hash_text(&text);

        let wanted = match scope {
            EmbedScope::All => true,
            EmbedScope::Pending => {
                let missing: bool = row.get("missing");
                let stored_model: Option<String> = row.get("embedding_model");
                let stored_hash: Option<String> = row.get("embedding_hash");
                missing
                    || stored_model.as_deref() != Some(model)
                    || stored_hash.as_deref() != Some(hash.as_str())
            }
        };

        if wanted {
            targets.push(EmbedTarget {
                id: row.get("id"),
                record,
                canonical: text,
                hash,
            });
        }

        if let Some(lim) = limit {
            if targets.len() >= lim {
                break;
            }
        }
    }

    Ok(targets)
}

/// Embed the targets and persist their vectors in a single transaction.
///
/// Before any vector is written, its canonical text is re-parsed and
/// checked against the source row; a mismatch aborts the run with
/// [`Error::MalformedRecord`] and nothing is committed.
///
/// Returns the number of rows embedded.
pub async fn embed_targets(
    pool: &SqlitePool,
    embedder: &dyn Embedder,
    targets: &[EmbedTarget],
    batch_size: usize,
    progress: &dyn EmbedProgressReporter,
) -> Result<u64, Error> {
    if targets.is_empty() {
        return Ok(0);
    }

    let texts: Vec<String> = targets.iter().map(|t| t.canonical.clone()).collect();
    let total = texts.len();
    let vectors = embedding::embed_in_batches(embedder, &texts, batch_size, |done, _| {
        progress.report(done as u64, total as u64)
    })
    .await?;

    let now = chrono::Utc::now().timestamp();
    let model = embedder.model_name();
    let dims = embedder.dims() as i64;

    let mut tx = pool.begin().await?;

    for (target, vector) in targets.iter().zip(vectors.iter()) {
        verify_canonical(target)?;

        let blob = embedding::vec_to_blob(vector);
        sqlx::query(
            r#"
            UPDATE hts
            SET embeddings = ?, embedding_model = ?, embedding_dims = ?,
                embedding_hash = ?, embedded_at = ?
            WHERE id = ?
            "#,
        )
        .bind(&blob)
        .bind(model)
        .bind(dims)
        .bind(&target.hash)
        .bind(now)
        .bind(target.id)
        .execute(&mut *tx)
        .await?;
    }

    tx.commit().await?;
    Ok(targets.len() as u64)
}

/// Defensive double-check against silent corruption: the canonical text
/// must parse back into exactly the source row's values.
fn verify_canonical(target: &EmbedTarget) -> Result<(), Error> {
    let parsed = canonical::parse(&target.canonical)
        .map_err(|e| Error::MalformedRecord(format!("row {}: {}", target.id, e)))?;

    let expected = canonical::canonical_values(&target.record);
    if parsed.as_slice() != expected.as_slice() {
        return Err(Error::MalformedRecord(format!(
            "row {} (hts {}): canonical text does not round-trip",
            target.id,
            target.record.htsnumber.as_deref().unwrap_or("None")
        )));
    }

    Ok(())
}

fn hash_text(text: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(text.as_bytes());
    format!("{:x}", hasher.finalize())
}

// ============ CLI entry points ============

/// Refresh embeddings for every row (`tarix embed all`).
pub async fn run_embed_all(
    config: &Config,
    batch_size_override: Option<usize>,
    dry_run: bool,
    progress: ProgressMode,
) -> Result<()> {
    run_embed(config, EmbedScope::All, batch_size_override, None, dry_run, progress).await
}

/// Embed rows that are missing, stale, or tagged with a different model
/// (`tarix embed pending`).
pub async fn run_embed_pending(
    config: &Config,
    batch_size_override: Option<usize>,
    limit: Option<usize>,
    dry_run: bool,
    progress: ProgressMode,
) -> Result<()> {
    run_embed(config, EmbedScope::Pending, batch_size_override, limit, dry_run, progress).await
}

async fn run_embed(
    config: &Config,
    scope: EmbedScope,
    batch_size_override: Option<usize>,
    limit: Option<usize>,
    dry_run: bool,
    progress: ProgressMode,
) -> Result<()> {
    if !config.embedding.is_enabled() {
        bail!("Embedding provider is disabled. Set [embedding] provider in config.");
    }

    let embedder = embedding::create_embedder(&config.embedding)?;
    let batch_size = batch_size_override.unwrap_or(config.embedding.batch_size);
    let pool = db::connect(config).await?;

    let targets = collect_targets(&pool, scope, embedder.model_name(), limit).await?;
    let label = match scope {
        EmbedScope::All => "embed all",
        EmbedScope::Pending => "embed pending",
    };

    if dry_run {
        println!("{} (dry-run)", label);
        println!("  rows to embed: {}", targets.len());
        pool.close().await;
        return Ok(());
    }

    if targets.is_empty() {
        println!("{}", label);
        println!("  all rows up to date");
        pool.close().await;
        return Ok(());
    }

    tracing::debug!(rows = targets.len(), batch_size, "starting embedding run");
    let reporter = progress.reporter();
    let embedded =
        embed_targets(&pool, embedder.as_ref(), &targets, batch_size, reporter.as_ref()).await?;

    println!("{}", label);
    println!("  model: {}", embedder.model_name());
    println!("  embedded: {}", embedded);

    pool.close().await;
    Ok(())
}
