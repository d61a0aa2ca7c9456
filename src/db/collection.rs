//! Collection table operations
//!
//! Rows are written by the file mover when a job completes and never mutated.

use crate::db::jobs::parse_timestamp;
use crate::db::now_rfc3339;
use crate::error::{Error, Result};
use crate::models::{CollectionItem, ContentType};
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};

/// Record a successfully filed title. Returns the new row id.
pub async fn add(
    pool: &SqlitePool,
    content_type: ContentType,
    title: &str,
    year: Option<i32>,
    catalog_id: Option<i64>,
    file_path: &str,
) -> Result<i64> {
    let result = sqlx::query(
        r#"
        INSERT INTO collection (title, year, content_type, catalog_id, file_path, added_at)
        VALUES (?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(title)
    .bind(year)
    .bind(content_type.as_str())
    .bind(catalog_id)
    .bind(file_path)
    .bind(now_rfc3339())
    .execute(pool)
    .await?;

    Ok(result.last_insert_rowid())
}

/// All collection items, most recent first.
pub async fn list(pool: &SqlitePool) -> Result<Vec<CollectionItem>> {
    let rows = sqlx::query("SELECT * FROM collection ORDER BY id DESC")
        .fetch_all(pool)
        .await?;
    rows.iter().map(item_from_row).collect()
}

/// Remove an item. Returns false if the id does not exist.
pub async fn remove(pool: &SqlitePool, item_id: i64) -> Result<bool> {
    let result = sqlx::query("DELETE FROM collection WHERE id = ?")
        .bind(item_id)
        .execute(pool)
        .await?;
    Ok(result.rows_affected() > 0)
}

fn item_from_row(row: &SqliteRow) -> Result<CollectionItem> {
    let content_type: String = row.try_get("content_type")?;
    Ok(CollectionItem {
        id: row.try_get("id")?,
        title: row.try_get("title")?,
        year: row.try_get("year")?,
        content_type: ContentType::parse(&content_type)
            .ok_or_else(|| Error::Internal(format!("unknown content type '{content_type}'")))?,
        catalog_id: row.try_get("catalog_id")?,
        file_path: row.try_get("file_path")?,
        added_at: parse_timestamp(row.try_get("added_at")?)?,
    })
}
