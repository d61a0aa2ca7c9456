//! Settings table access (key-value store)

use crate::error::Result;
use sqlx::SqlitePool;

const ACTIVE_MODE_KEY: &str = "active_mode";

/// Get a setting value, or None if unset.
pub async fn get(pool: &SqlitePool, key: &str) -> Result<Option<String>> {
    let row: Option<(String,)> = sqlx::query_as("SELECT value FROM settings WHERE key = ?")
        .bind(key)
        .fetch_optional(pool)
        .await?;
    Ok(row.map(|(value,)| value))
}

/// Set a setting value, inserting or overwriting.
pub async fn set(pool: &SqlitePool, key: &str, value: &str) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO settings (key, value) VALUES (?, ?)
        ON CONFLICT(key) DO UPDATE SET value = excluded.value
        "#,
    )
    .bind(key)
    .bind(value)
    .execute(pool)
    .await?;
    Ok(())
}

/// Whether continuous ingestion is expected; defaults to false when unset.
pub async fn active_mode(pool: &SqlitePool) -> Result<bool> {
    Ok(get(pool, ACTIVE_MODE_KEY)
        .await?
        .map(|v| v == "true")
        .unwrap_or(false))
}

pub async fn set_active_mode(pool: &SqlitePool, on: bool) -> Result<()> {
    set(pool, ACTIVE_MODE_KEY, if on { "true" } else { "false" }).await
}

/// Seed the active-mode flag from configuration unless already persisted.
pub async fn init_active_mode(pool: &SqlitePool, default: bool) -> Result<()> {
    if get(pool, ACTIVE_MODE_KEY).await?.is_none() {
        set_active_mode(pool, default).await?;
    }
    Ok(())
}
