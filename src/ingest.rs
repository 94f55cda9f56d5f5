//! Tariff record loading.
//!
//! Reads a JSON array of tariff records (the lowercase column spellings,
//! e.g. `{"htsnumber": "0101.21.00", "indent": 2, ...}`) and inserts them
//! into the `hts` table in a single transaction. Loaded rows start with a
//! NULL embedding; the indexer fills them in.

use anyhow::{Context, Result};
use sqlx::SqlitePool;
use std::path::Path;

use crate::config::Config;
use crate::db;
use crate::models::TariffRecord;

pub async fn run_load(config: &Config, file: &Path, replace: bool) -> Result<()> {
    let content = std::fs::read_to_string(file)
        .with_context(|| format!("Failed to read records file: {}", file.display()))?;
    let records: Vec<TariffRecord> = serde_json::from_str(&content)
        .with_context(|| format!("Failed to parse records file: {}", file.display()))?;

    let pool = db::connect(config).await?;
    let replaced = insert_records(&pool, &records, replace).await?;

    println!("load {}", file.display());
    if replace {
        println!("  replaced existing rows: {}", replaced);
    }
    println!("  inserted records: {}", records.len());
    println!("ok");

    pool.close().await;
    Ok(())
}

/// Insert records in one transaction; nothing is visible until commit.
/// Returns the number of pre-existing rows deleted when `replace` is set.
pub async fn insert_records(
    pool: &SqlitePool,
    records: &[TariffRecord],
    replace: bool,
) -> Result<u64, sqlx::Error> {
    let mut tx = pool.begin().await?;

    let mut replaced = 0u64;
    if replace {
        replaced = sqlx::query("DELETE FROM hts").execute(&mut *tx).await?.rows_affected();
    }

    for record in records {
        sqlx::query(
            r#"
            INSERT INTO hts (htsnumber, indent, description, unitquantity,
                             generalrateofduty, specialrateofduty, extrarateofduty,
                             quotaquantity, additionalduties)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&record.htsnumber)
        .bind(record.indent)
        .bind(&record.description)
        .bind(&record.unitofquantity)
        .bind(&record.generalrateofduty)
        .bind(&record.specialrateofduty)
        .bind(&record.extrarateofduty)
        .bind(&record.quotaquantity)
        .bind(&record.additionalduties)
        .execute(&mut *tx)
        .await?;
    }

    tx.commit().await?;
    Ok(replaced)
}
