//! Schema creation for the tariff store.
//!
//! A single `hts` table holds both the source tariff columns and the
//! embedding state. `embeddings` is NULL until the indexer has processed a
//! row; `embedding_model`, `embedding_dims`, and `embedding_hash` record
//! which model produced the vector and the canonical text it was computed
//! from, so staleness and model drift are detectable.

use anyhow::Result;

use crate::config::Config;
use crate::db;

pub async fn run_migrations(config: &Config) -> Result<()> {
    let pool = db::connect(config).await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS hts (
            id INTEGER PRIMARY KEY,
            htsnumber TEXT,
            indent INTEGER,
            description TEXT,
            unitquantity TEXT,
            generalrateofduty TEXT,
            specialrateofduty TEXT,
            extrarateofduty TEXT,
            quotaquantity TEXT,
            additionalduties TEXT,
            embeddings BLOB,
            embedding_model TEXT,
            embedding_dims INTEGER,
            embedding_hash TEXT,
            embedded_at INTEGER
        )
        "#,
    )
    .execute(&pool)
    .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_hts_htsnumber ON hts(htsnumber)")
        .execute(&pool)
        .await?;
    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_hts_embedded ON hts(embedding_model) WHERE embeddings IS NOT NULL",
    )
    .execute(&pool)
    .await?;

    pool.close().await;
    Ok(())
}
