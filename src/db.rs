//! SQLite connection handling.
//!
//! Every command opens its own short-lived pool against the configured
//! database path and closes it before exiting; the server does the same per
//! request scope.

use anyhow::Result;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use sqlx::Row;
use std::str::FromStr;
use std::time::Duration;

use crate::config::Config;
use crate::models::TariffRecord;

pub async fn connect(config: &Config) -> Result<SqlitePool> {
    let db_path = &config.db.path;

    if let Some(parent) = db_path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let options = SqliteConnectOptions::from_str(&format!("sqlite:{}", db_path.display()))?
        .create_if_missing(true)
        .journal_mode(sqlx::sqlite::SqliteJournalMode::Wal)
        .busy_timeout(Duration::from_secs(5));

    let pool = SqlitePoolOptions::new()
        .max_connections(5)
        .connect_with(options)
        .await?;

    Ok(pool)
}

/// Map an `hts` row's source columns into a [`TariffRecord`].
///
/// The table keeps the historical `unitquantity` column spelling; the
/// canonical field name is `unitofquantity`.
pub fn record_from_row(row: &sqlx::sqlite::SqliteRow) -> TariffRecord {
    TariffRecord {
        htsnumber: row.get("htsnumber"),
        indent: row.get("indent"),
        description: row.get("description"),
        unitofquantity: row.get("unitquantity"),
        generalrateofduty: row.get("generalrateofduty"),
        specialrateofduty: row.get("specialrateofduty"),
        extrarateofduty: row.get("extrarateofduty"),
        quotaquantity: row.get("quotaquantity"),
        additionalduties: row.get("additionalduties"),
    }
}
