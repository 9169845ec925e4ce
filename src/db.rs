use anyhow::Context;
use sqlx::{SqlitePool, sqlite::SqlitePoolOptions};

pub async fn connect(url: &str) -> anyhow::Result<SqlitePool> {
    SqlitePoolOptions::new()
        .max_connections(16)
        .connect(url)
        .await
        .with_context(|| format!("connecting to {url}"))
}

pub async fn init_tables(db_pool: &SqlitePool) -> anyhow::Result<()> {
    sqlx::query(
        "CREATE TABLE IF NOT EXISTS users (
            id TEXT PRIMARY KEY,
            created_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP
        )",
    )
    .execute(db_pool)
    .await
    .context("creating users table")?;

    Ok(())
}
