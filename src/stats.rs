//! Table statistics (`tarix stats`).

use anyhow::Result;
use sqlx::Row;

use crate::config::Config;
use crate::db;

pub async fn run_stats(config: &Config) -> Result<()> {
    let pool = db::connect(config).await?;

    let total: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM hts")
        .fetch_one(&pool)
        .await?;
    let embedded: i64 =
        sqlx::query_scalar("SELECT COUNT(*) FROM hts WHERE embeddings IS NOT NULL")
            .fetch_one(&pool)
            .await?;

    println!("stats");
    println!("  records: {}", total);
    println!("  embedded: {}", embedded);
    println!("  unembedded: {}", total - embedded);

    let models = sqlx::query(
        r#"
        SELECT embedding_model, COUNT(*) AS n
        FROM hts
        WHERE embeddings IS NOT NULL
        GROUP BY embedding_model
        ORDER BY n DESC
        "#,
    )
    .fetch_all(&pool)
    .await?;

    for row in &models {
        let model: Option<String> = row.get("embedding_model");
        let n: i64 = row.get("n");
        println!("  model {}: {}", model.as_deref().unwrap_or("(untagged)"), n);
    }

    pool.close().await;
    Ok(())
}
