//! Job table operations
//!
//! Status changes go through [`update_status`], which validates the requested
//! edge against the transition graph inside a transaction.

use crate::db::now_rfc3339;
use crate::error::{Error, Result};
use crate::models::{ContentType, Job, JobStatus, PathField};
use chrono::{DateTime, Utc};
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};

/// Create a new pending job for a disc in a drive.
pub async fn create_job(pool: &SqlitePool, drive_id: &str, disc_label: &str) -> Result<Job> {
    let now = now_rfc3339();
    let result = sqlx::query(
        r#"
        INSERT INTO jobs (drive_id, disc_label, content_type, status, created_at, updated_at)
        VALUES (?, ?, 'unknown', 'pending', ?, ?)
        "#,
    )
    .bind(drive_id)
    .bind(disc_label)
    .bind(&now)
    .bind(&now)
    .execute(pool)
    .await?;

    get_job(pool, result.last_insert_rowid()).await
}

/// Fetch a job by id.
pub async fn get_job(pool: &SqlitePool, job_id: i64) -> Result<Job> {
    let row = sqlx::query("SELECT * FROM jobs WHERE id = ?")
        .bind(job_id)
        .fetch_optional(pool)
        .await?;

    match row {
        Some(row) => job_from_row(&row),
        None => Err(Error::NotFound(format!("job {job_id}"))),
    }
}

/// All jobs, newest first.
pub async fn get_all_jobs(pool: &SqlitePool) -> Result<Vec<Job>> {
    let rows = sqlx::query("SELECT * FROM jobs ORDER BY id DESC")
        .fetch_all(pool)
        .await?;
    rows.iter().map(job_from_row).collect()
}

/// Jobs with the given status, oldest progress first for pipeline fairness.
pub async fn get_jobs_by_status(pool: &SqlitePool, status: JobStatus) -> Result<Vec<Job>> {
    let rows = sqlx::query("SELECT * FROM jobs WHERE status = ? ORDER BY updated_at ASC, id ASC")
        .bind(status.as_str())
        .fetch_all(pool)
        .await?;
    rows.iter().map(job_from_row).collect()
}

/// The oldest pending job bound to a drive, if any.
pub async fn get_pending_job_for_drive(pool: &SqlitePool, drive_id: &str) -> Result<Option<Job>> {
    let row = sqlx::query(
        r#"
        SELECT * FROM jobs
        WHERE drive_id = ? AND status = 'pending'
        ORDER BY created_at ASC, id ASC
        LIMIT 1
        "#,
    )
    .bind(drive_id)
    .fetch_optional(pool)
    .await?;

    row.as_ref().map(job_from_row).transpose()
}

/// The oldest pending or ripping job bound to a drive.
///
/// Used by the watcher to avoid creating a duplicate job while the drive is
/// still working on the previous disc.
pub async fn get_active_job_for_drive(pool: &SqlitePool, drive_id: &str) -> Result<Option<Job>> {
    let row = sqlx::query(
        r#"
        SELECT * FROM jobs
        WHERE drive_id = ? AND status IN ('pending', 'ripping')
        ORDER BY created_at ASC, id ASC
        LIMIT 1
        "#,
    )
    .bind(drive_id)
    .fetch_optional(pool)
    .await?;

    row.as_ref().map(job_from_row).transpose()
}

/// Most recently touched jobs, optionally hiding archived ones.
pub async fn get_recent_jobs(
    pool: &SqlitePool,
    limit: i64,
    exclude_archived: bool,
) -> Result<Vec<Job>> {
    let query = if exclude_archived {
        r#"
        SELECT * FROM jobs
        WHERE status != 'archived'
        ORDER BY updated_at DESC, id DESC
        LIMIT ?
        "#
    } else {
        r#"
        SELECT * FROM jobs
        ORDER BY updated_at DESC, id DESC
        LIMIT ?
        "#
    };

    let rows = sqlx::query(query).bind(limit).fetch_all(pool).await?;
    rows.iter().map(job_from_row).collect()
}

/// Transition a job to `new_status`, rejecting edges absent from the graph.
///
/// `error_message` is only written when provided; an existing message is
/// preserved otherwise.
pub async fn update_status(
    pool: &SqlitePool,
    job_id: i64,
    new_status: JobStatus,
    error_message: Option<&str>,
) -> Result<()> {
    let mut tx = pool.begin().await?;

    let row: Option<(String,)> = sqlx::query_as("SELECT status FROM jobs WHERE id = ?")
        .bind(job_id)
        .fetch_optional(&mut *tx)
        .await?;

    let current = match row {
        Some((s,)) => JobStatus::parse(&s)
            .ok_or_else(|| Error::Internal(format!("job {job_id} has unknown status '{s}'")))?,
        None => return Err(Error::NotFound(format!("job {job_id}"))),
    };

    if !current.can_transition(new_status) {
        return Err(Error::InvalidTransition {
            from: current,
            to: new_status,
        });
    }

    sqlx::query(
        r#"
        UPDATE jobs
        SET status = ?,
            error_message = COALESCE(?, error_message),
            updated_at = ?
        WHERE id = ?
        "#,
    )
    .bind(new_status.as_str())
    .bind(error_message)
    .bind(now_rfc3339())
    .bind(job_id)
    .execute(&mut *tx)
    .await?;

    tx.commit().await?;
    Ok(())
}

/// Write a job's identification fields. Does not change status.
#[allow(clippy::too_many_arguments)]
pub async fn update_identification(
    pool: &SqlitePool,
    job_id: i64,
    content_type: ContentType,
    title: &str,
    year: Option<i32>,
    catalog_id: Option<i64>,
    confidence: f64,
    poster_ref: Option<&str>,
) -> Result<()> {
    let result = sqlx::query(
        r#"
        UPDATE jobs
        SET content_type = ?, identified_title = ?, identified_year = ?,
            catalog_id = ?, confidence = ?, poster_ref = ?, updated_at = ?
        WHERE id = ?
        "#,
    )
    .bind(content_type.as_str())
    .bind(title)
    .bind(year)
    .bind(catalog_id)
    .bind(confidence)
    .bind(poster_ref)
    .bind(now_rfc3339())
    .bind(job_id)
    .execute(pool)
    .await?;

    if result.rows_affected() == 0 {
        return Err(Error::NotFound(format!("job {job_id}")));
    }
    Ok(())
}

/// Set one of the artifact path fields on a job.
pub async fn set_path(
    pool: &SqlitePool,
    job_id: i64,
    field: PathField,
    value: &str,
) -> Result<()> {
    let query = format!(
        "UPDATE jobs SET {} = ?, updated_at = ? WHERE id = ?",
        field.column()
    );
    let result = sqlx::query(&query)
        .bind(value)
        .bind(now_rfc3339())
        .bind(job_id)
        .execute(pool)
        .await?;

    if result.rows_affected() == 0 {
        return Err(Error::NotFound(format!("job {job_id}")));
    }
    Ok(())
}

pub(crate) fn job_from_row(row: &SqliteRow) -> Result<Job> {
    let status: String = row.try_get("status")?;
    let content_type: String = row.try_get("content_type")?;

    Ok(Job {
        id: row.try_get("id")?,
        drive_id: row.try_get("drive_id")?,
        disc_label: row.try_get("disc_label")?,
        content_type: ContentType::parse(&content_type)
            .ok_or_else(|| Error::Internal(format!("unknown content type '{content_type}'")))?,
        status: JobStatus::parse(&status)
            .ok_or_else(|| Error::Internal(format!("unknown job status '{status}'")))?,
        identified_title: row.try_get("identified_title")?,
        identified_year: row.try_get("identified_year")?,
        catalog_id: row.try_get("catalog_id")?,
        confidence: row.try_get("confidence")?,
        poster_ref: row.try_get("poster_ref")?,
        rip_path: row.try_get("rip_path")?,
        encode_path: row.try_get("encode_path")?,
        final_path: row.try_get("final_path")?,
        error_message: row.try_get("error_message")?,
        created_at: parse_timestamp(row.try_get("created_at")?)?,
        updated_at: parse_timestamp(row.try_get("updated_at")?)?,
    })
}

pub(crate) fn parse_timestamp(value: String) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(&value)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| Error::Internal(format!("bad timestamp '{value}': {e}")))
}
