//! Shared helpers for integration tests

#![allow(dead_code)]

use ripshelf::db;
use ripshelf::models::JobStatus;
use sqlx::sqlite::SqlitePoolOptions;
use sqlx::SqlitePool;

/// Canonical forward path through the pipeline
const CHAIN: &[JobStatus] = &[
    JobStatus::Ripping,
    JobStatus::Ripped,
    JobStatus::Encoding,
    JobStatus::Encoded,
    JobStatus::Identifying,
    JobStatus::Review,
    JobStatus::Moving,
    JobStatus::Complete,
];

/// In-memory single-connection pool with the schema applied.
pub async fn test_pool() -> SqlitePool {
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect("sqlite::memory:")
        .await
        .expect("should open in-memory database");
    db::init_schema(&pool).await.expect("schema should initialize");
    pool
}

/// Walk a job forward along the canonical path until it reaches `target`.
pub async fn advance_to(pool: &SqlitePool, job_id: i64, target: JobStatus) {
    let forward_target = if target == JobStatus::Archived {
        JobStatus::Complete
    } else {
        target
    };

    let current = db::jobs::get_job(pool, job_id)
        .await
        .expect("job should exist")
        .status;
    let already_passed = CHAIN.iter().position(|s| *s == current).map_or(0, |i| i + 1);

    let mut reached = false;
    for status in &CHAIN[already_passed..] {
        db::jobs::update_status(pool, job_id, *status, None)
            .await
            .expect("transition should succeed");
        if *status == forward_target {
            reached = true;
            break;
        }
    }
    if current == forward_target {
        reached = true;
    }
    assert!(reached, "status {target} is not on the forward path");

    if target == JobStatus::Archived {
        db::jobs::update_status(pool, job_id, JobStatus::Archived, None)
            .await
            .expect("archive should succeed");
    }
}

/// Rewrite a job's updated_at to `hours` hours in the past.
pub async fn backdate_job(pool: &SqlitePool, job_id: i64, hours: i64) {
    let timestamp = (chrono::Utc::now() - chrono::Duration::hours(hours)).to_rfc3339();
    sqlx::query("UPDATE jobs SET updated_at = ? WHERE id = ?")
        .bind(timestamp)
        .bind(job_id)
        .execute(pool)
        .await
        .expect("backdate should succeed");
}
