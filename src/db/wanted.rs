//! Wanted-list table operations

use crate::db::jobs::parse_timestamp;
use crate::db::now_rfc3339;
use crate::error::{Error, Result};
use crate::models::{ContentType, WantedItem};
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};

/// Add an item to the wanted list. Returns the new row id.
pub async fn add(
    pool: &SqlitePool,
    title: &str,
    year: Option<i32>,
    content_type: ContentType,
    catalog_id: Option<i64>,
    poster_ref: Option<&str>,
    notes: Option<&str>,
) -> Result<i64> {
    let result = sqlx::query(
        r#"
        INSERT INTO wanted (title, year, content_type, catalog_id, poster_ref, notes, added_at)
        VALUES (?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(title)
    .bind(year)
    .bind(content_type.as_str())
    .bind(catalog_id)
    .bind(poster_ref)
    .bind(notes)
    .bind(now_rfc3339())
    .execute(pool)
    .await?;

    Ok(result.last_insert_rowid())
}

/// All wanted items, most recently added first.
pub async fn list(pool: &SqlitePool) -> Result<Vec<WantedItem>> {
    let rows = sqlx::query("SELECT * FROM wanted ORDER BY added_at DESC, id DESC")
        .fetch_all(pool)
        .await?;
    rows.iter().map(item_from_row).collect()
}

/// Remove an item. Returns false if the id does not exist.
pub async fn remove(pool: &SqlitePool, item_id: i64) -> Result<bool> {
    let result = sqlx::query("DELETE FROM wanted WHERE id = ?")
        .bind(item_id)
        .execute(pool)
        .await?;
    Ok(result.rows_affected() > 0)
}

fn item_from_row(row: &SqliteRow) -> Result<WantedItem> {
    let content_type: String = row.try_get("content_type")?;
    Ok(WantedItem {
        id: row.try_get("id")?,
        title: row.try_get("title")?,
        year: row.try_get("year")?,
        content_type: ContentType::parse(&content_type)
            .ok_or_else(|| Error::Internal(format!("unknown content type '{content_type}'")))?,
        catalog_id: row.try_get("catalog_id")?,
        poster_ref: row.try_get("poster_ref")?,
        notes: row.try_get("notes")?,
        added_at: parse_timestamp(row.try_get("added_at")?)?,
    })
}
