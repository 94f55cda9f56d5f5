//! Nearest-neighbor retrieval over embedded tariff rows, plus the
//! non-semantic substring lookup.
//!
//! Similarity search embeds the query with the configured backend, loads
//! every row with a non-null vector, and ranks by cosine distance computed
//! in-process. Rows whose stored model tag differs from the query's model
//! are not comparable and fail the whole search with
//! [`Error::ModelMismatch`] rather than returning silently wrong neighbors.
//!
//! Ordering is deterministic: ascending distance, then `htsnumber`, then
//! row id.

use anyhow::Result;
use sqlx::{Row, SqlitePool};

use crate::config::Config;
use crate::db;
use crate::embedding;
use crate::error::Error;
use crate::models::{ExactMatch, SearchHit};

/// Embed `query` and return the `k` nearest embedded records.
///
/// # Errors
///
/// [`Error::InvalidQuery`] for an empty or whitespace-only query;
/// [`Error::EmbeddingBackend`] when the query cannot be embedded;
/// [`Error::ModelMismatch`] when stored vectors came from another model.
pub async fn search(
    config: &Config,
    pool: &SqlitePool,
    query: &str,
    k: i64,
) -> Result<Vec<SearchHit>, Error> {
    let query = query.trim();
    if query.is_empty() {
        return Err(Error::InvalidQuery);
    }

    let embedder = embedding::create_embedder(&config.embedding)?;
    let query_vec = embedding::embed_query(embedder.as_ref(), query).await?;

    search_with_vector(pool, &query_vec, embedder.model_name(), k).await
}

/// Rank embedded rows by ascending cosine distance from `query_vec`.
///
/// Rows with a NULL `embeddings` column never participate. Returns at most
/// `k` hits; an empty vec when nothing is embedded.
pub async fn search_with_vector(
    pool: &SqlitePool,
    query_vec: &[f32],
    model: &str,
    k: i64,
) -> Result<Vec<SearchHit>, Error> {
    let rows = sqlx::query(
        r#"
        SELECT id, htsnumber, indent, description, unitquantity,
               generalrateofduty, specialrateofduty, extrarateofduty,
               quotaquantity, additionalduties, embeddings, embedding_model
        FROM hts
        WHERE embeddings IS NOT NULL
        "#,
    )
    .fetch_all(pool)
    .await?;

    struct Candidate {
        id: i64,
        hit: SearchHit,
    }

    let mut candidates = Vec::with_capacity(rows.len());
    for row in &rows {
        let stored_model: Option<String> = row.get("embedding_model");
        match stored_model.as_deref() {
            Some(m) if m == model => {}
            other => {
                return Err(Error::ModelMismatch {
                    stored: other.unwrap_or("(untagged)").to_string(),
                    query: model.to_string(),
                });
            }
        }

        let blob: Vec<u8> = row.get("embeddings");
        let vector = embedding::blob_to_vec(&blob);
        let distance = embedding::cosine_distance(query_vec, &vector);

        candidates.push(Candidate {
            id: row.get("id"),
            hit: SearchHit {
                record: db::record_from_row(row),
                distance,
            },
        });
    }

    // Deterministic: distance, then htsnumber, then row id
    candidates.sort_by(|a, b| {
        a.hit
            .distance
            .partial_cmp(&b.hit.distance)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| a.hit.record.htsnumber.cmp(&b.hit.record.htsnumber))
            .then(a.id.cmp(&b.id))
    });
    candidates.truncate(k.max(0) as usize);

    Ok(candidates.into_iter().map(|c| c.hit).collect())
}

/// Substring lookup on `htsnumber`, the non-embedding search path.
///
/// Matches anywhere in the number, case-insensitively, ordered by
/// `htsnumber` then row id.
pub async fn exact_match(
    pool: &SqlitePool,
    partial: &str,
    limit: i64,
) -> Result<Vec<ExactMatch>, Error> {
    let partial = partial.trim();
    if partial.is_empty() {
        return Err(Error::InvalidQuery);
    }

    let pattern = format!("%{}%", escape_like(partial));
    let rows = sqlx::query(
        r#"
        SELECT htsnumber, description, generalrateofduty
        FROM hts
        WHERE htsnumber LIKE ? ESCAPE '\'
        ORDER BY htsnumber, id
        LIMIT ?
        "#,
    )
    .bind(&pattern)
    .bind(limit)
    .fetch_all(pool)
    .await?;

    Ok(rows
        .iter()
        .map(|row| ExactMatch {
            htsnumber: row.get("htsnumber"),
            description: row.get("description"),
            generalrateofduty: row.get("generalrateofduty"),
        })
        .collect())
}

/// Escape LIKE wildcards in user input so they match literally.
fn escape_like(input: &str) -> String {
    input
        .replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_")
}

// ============ CLI entry points ============

pub async fn run_search(config: &Config, query: &str, limit: Option<i64>) -> Result<()> {
    if !config.embedding.is_enabled() {
        anyhow::bail!("Search requires embeddings. Set [embedding] provider in config.");
    }

    let pool = db::connect(config).await?;
    let k = limit.unwrap_or(config.retrieval.top_k);
    let hits = match search(config, &pool, query, k).await {
        Ok(hits) => hits,
        Err(e) => {
            pool.close().await;
            return Err(e.into());
        }
    };

    if hits.is_empty() {
        println!("No results.");
        pool.close().await;
        return Ok(());
    }

    for (i, hit) in hits.iter().enumerate() {
        println!(
            "{}. [{:.4}] {}",
            i + 1,
            hit.distance,
            hit.record.htsnumber.as_deref().unwrap_or("(no HTS number)")
        );
        if let Some(ref description) = hit.record.description {
            println!("    {}", description);
        }
        if let Some(ref rate) = hit.record.generalrateofduty {
            println!("    general rate: {}", rate);
        }
        println!();
    }

    pool.close().await;
    Ok(())
}

pub async fn run_lookup(config: &Config, partial: &str, limit: Option<i64>) -> Result<()> {
    let pool = db::connect(config).await?;
    let limit = limit.unwrap_or(config.retrieval.lookup_limit);
    let matches = match exact_match(&pool, partial, limit).await {
        Ok(m) => m,
        Err(e) => {
            pool.close().await;
            return Err(e.into());
        }
    };

    if matches.is_empty() {
        println!("No results.");
        pool.close().await;
        return Ok(());
    }

    for m in &matches {
        println!(
            "{}  {}  [{}]",
            m.htsnumber.as_deref().unwrap_or("(none)"),
            m.description.as_deref().unwrap_or(""),
            m.generalrateofduty.as_deref().unwrap_or("")
        );
    }

    pool.close().await;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embedding::vec_to_blob;

    async fn test_pool() -> SqlitePool {
        let pool = sqlx::sqlite::SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .unwrap();
        sqlx::query(
            r#"
            CREATE TABLE hts (
                id INTEGER PRIMARY KEY,
                htsnumber TEXT, indent INTEGER, description TEXT, unitquantity TEXT,
                generalrateofduty TEXT, specialrateofduty TEXT, extrarateofduty TEXT,
                quotaquantity TEXT, additionalduties TEXT,
                embeddings BLOB, embedding_model TEXT, embedding_dims INTEGER,
                embedding_hash TEXT, embedded_at INTEGER
            )
            "#,
        )
        .execute(&pool)
        .await
        .unwrap();
        pool
    }

    async fn insert_row(
        pool: &SqlitePool,
        hts: &str,
        description: &str,
        embedding: Option<&[f32]>,
        model: Option<&str>,
    ) {
        let blob = embedding.map(vec_to_blob);
        sqlx::query(
            r#"
            INSERT INTO hts (htsnumber, indent, description, embeddings, embedding_model)
            VALUES (?, 0, ?, ?, ?)
            "#,
        )
        .bind(hts)
        .bind(description)
        .bind(blob)
        .bind(model)
        .execute(pool)
        .await
        .unwrap();
    }

    const MODEL: &str = "test-model";

    #[tokio::test]
    async fn test_top_k_ordering() {
        let pool = test_pool().await;
        // Distances from [1, 0]: a = 0, b ≈ 0.29, c = 1
        insert_row(&pool, "0101", "nearest", Some(&[1.0, 0.0]), Some(MODEL)).await;
        insert_row(&pool, "0102", "middle", Some(&[1.0, 1.0]), Some(MODEL)).await;
        insert_row(&pool, "0103", "farthest", Some(&[0.0, 1.0]), Some(MODEL)).await;

        let hits = search_with_vector(&pool, &[1.0, 0.0], MODEL, 3).await.unwrap();
        assert_eq!(hits.len(), 3);
        let numbers: Vec<_> = hits
            .iter()
            .map(|h| h.record.htsnumber.as_deref().unwrap())
            .collect();
        assert_eq!(numbers, vec!["0101", "0102", "0103"]);
        assert!(hits[0].distance <= hits[1].distance);
        assert!(hits[1].distance <= hits[2].distance);
    }

    #[tokio::test]
    async fn test_k_truncates() {
        let pool = test_pool().await;
        insert_row(&pool, "0101", "a", Some(&[1.0, 0.0]), Some(MODEL)).await;
        insert_row(&pool, "0102", "b", Some(&[1.0, 1.0]), Some(MODEL)).await;
        insert_row(&pool, "0103", "c", Some(&[0.0, 1.0]), Some(MODEL)).await;

        let hits = search_with_vector(&pool, &[1.0, 0.0], MODEL, 2).await.unwrap();
        assert_eq!(hits.len(), 2);
    }

    #[tokio::test]
    async fn test_rows_without_embedding_excluded() {
        let pool = test_pool().await;
        insert_row(&pool, "0101", "close", Some(&[1.0, 0.0]), Some(MODEL)).await;
        insert_row(&pool, "0102", "far", Some(&[0.0, 1.0]), Some(MODEL)).await;
        insert_row(&pool, "0103", "unembedded", None, None).await;

        let hits = search_with_vector(&pool, &[1.0, 0.0], MODEL, 2).await.unwrap();
        let numbers: Vec<_> = hits
            .iter()
            .map(|h| h.record.htsnumber.as_deref().unwrap())
            .collect();
        assert_eq!(numbers, vec!["0101", "0102"]);
    }

    #[tokio::test]
    async fn test_empty_store_returns_empty() {
        let pool = test_pool().await;
        insert_row(&pool, "0101", "unembedded", None, None).await;

        let hits = search_with_vector(&pool, &[1.0, 0.0], MODEL, 5).await.unwrap();
        assert!(hits.is_empty());
    }

    #[tokio::test]
    async fn test_equal_distance_tie_break_by_htsnumber_then_id() {
        let pool = test_pool().await;
        // Same vector — identical distance; inserted out of numeric order
        insert_row(&pool, "0202", "b", Some(&[1.0, 0.0]), Some(MODEL)).await;
        insert_row(&pool, "0101", "a", Some(&[1.0, 0.0]), Some(MODEL)).await;
        insert_row(&pool, "0101", "a again", Some(&[1.0, 0.0]), Some(MODEL)).await;

        let hits = search_with_vector(&pool, &[1.0, 0.0], MODEL, 3).await.unwrap();
        let order: Vec<_> = hits
            .iter()
            .map(|h| {
                (
                    h.record.htsnumber.as_deref().unwrap(),
                    h.record.description.as_deref().unwrap(),
                )
            })
            .collect();
        assert_eq!(
            order,
            vec![("0101", "a"), ("0101", "a again"), ("0202", "b")]
        );
    }

    #[tokio::test]
    async fn test_foreign_model_tag_rejected() {
        let pool = test_pool().await;
        insert_row(&pool, "0101", "a", Some(&[1.0, 0.0]), Some("other-model")).await;

        let err = search_with_vector(&pool, &[1.0, 0.0], MODEL, 5).await.unwrap_err();
        assert!(matches!(err, Error::ModelMismatch { .. }));
    }

    #[tokio::test]
    async fn test_untagged_embedding_rejected() {
        let pool = test_pool().await;
        insert_row(&pool, "0101", "a", Some(&[1.0, 0.0]), None).await;

        let err = search_with_vector(&pool, &[1.0, 0.0], MODEL, 5).await.unwrap_err();
        assert!(matches!(err, Error::ModelMismatch { .. }));
    }

    #[tokio::test]
    async fn test_exact_match_substring() {
        let pool = test_pool().await;
        insert_row(&pool, "0101.21.00", "Purebred horses", None, None).await;
        insert_row(&pool, "8471.30.01", "Portable computers", None, None).await;

        let matches = exact_match(&pool, "8471", 50).await.unwrap();
        assert_eq!(matches.len(), 1);
        assert_eq!(matches[0].htsnumber.as_deref(), Some("8471.30.01"));

        let matches = exact_match(&pool, "01", 50).await.unwrap();
        assert_eq!(matches.len(), 2);
    }

    #[tokio::test]
    async fn test_exact_match_escapes_wildcards() {
        let pool = test_pool().await;
        insert_row(&pool, "0101.21.00", "Horses", None, None).await;

        let matches = exact_match(&pool, "%", 50).await.unwrap();
        assert!(matches.is_empty());
    }

    #[tokio::test]
    async fn test_exact_match_empty_query_rejected() {
        let pool = test_pool().await;
        let err = exact_match(&pool, "   ", 50).await.unwrap_err();
        assert!(matches!(err, Error::InvalidQuery));
    }

    #[tokio::test]
    async fn test_search_rejects_empty_query() {
        let pool = test_pool().await;
        let config = empty_config();

        let err = search(&config, &pool, "", 5).await.unwrap_err();
        assert!(matches!(err, Error::InvalidQuery));
        let err = search(&config, &pool, "   ", 5).await.unwrap_err();
        assert!(matches!(err, Error::InvalidQuery));
    }

    fn empty_config() -> Config {
        Config {
            db: crate::config::DbConfig {
                path: std::path::PathBuf::from(":memory:"),
            },
            embedding: Default::default(),
            retrieval: Default::default(),
            answer: Default::default(),
            server: crate::config::ServerConfig {
                bind: "127.0.0.1:0".to_string(),
            },
        }
    }
}
