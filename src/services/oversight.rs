//! Oversight: detect and repair impossible job states
//!
//! Startup cleanup runs once before workers accept work and resets transient
//! states left over from a previous run. The runtime consistency check is
//! read-only; the only automatic repair is bounded to the duplicate-encoding
//! case.

use crate::db;
use crate::error::Result;
use crate::models::JobStatus;
use chrono::{Duration, Utc};
use sqlx::SqlitePool;
use std::collections::HashMap;
use tracing::info;

pub const RIPPING_TIMEOUT_HOURS: i64 = 4;
pub const ENCODING_TIMEOUT_HOURS: i64 = 8;
pub const IDENTIFYING_TIMEOUT_HOURS: i64 = 1;

/// Counts of jobs reset by startup cleanup
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct CleanupReport {
    pub reset_ripping: usize,
    pub reset_encoding: usize,
    pub reset_identifying: usize,
}

/// Reset transient states left behind by a previous run.
///
/// Ripping jobs fail outright: the disc was likely ejected and the drive
/// state is unknown. Encoding jobs go back to ripped (the partial output is
/// unusable), identifying jobs back to encoded; both are re-picked by their
/// workers.
pub async fn startup_cleanup(pool: &SqlitePool) -> Result<CleanupReport> {
    let mut report = CleanupReport::default();

    for job in db::jobs::get_jobs_by_status(pool, JobStatus::Ripping).await? {
        db::jobs::update_status(pool, job.id, JobStatus::Failed, Some("Reset on startup")).await?;
        report.reset_ripping += 1;
    }
    for job in db::jobs::get_jobs_by_status(pool, JobStatus::Encoding).await? {
        db::jobs::update_status(pool, job.id, JobStatus::Ripped, None).await?;
        report.reset_encoding += 1;
    }
    for job in db::jobs::get_jobs_by_status(pool, JobStatus::Identifying).await? {
        db::jobs::update_status(pool, job.id, JobStatus::Encoded, None).await?;
        report.reset_identifying += 1;
    }

    if report != CleanupReport::default() {
        info!(
            reset_ripping = report.reset_ripping,
            reset_encoding = report.reset_encoding,
            reset_identifying = report.reset_identifying,
            "Startup cleanup reset stale jobs"
        );
    }

    Ok(report)
}

/// Check for impossible or stuck states. Returns issue descriptions.
pub async fn check_state_consistency(pool: &SqlitePool) -> Result<Vec<String>> {
    let mut issues = Vec::new();

    let all_jobs = db::jobs::get_all_jobs(pool).await?;
    let active: Vec<_> = all_jobs
        .into_iter()
        .filter(|job| !job.status.is_terminal())
        .collect();

    let encoding: Vec<_> = active
        .iter()
        .filter(|job| job.status == JobStatus::Encoding)
        .collect();
    if encoding.len() > 1 {
        let ids: Vec<String> = encoding.iter().map(|j| j.id.to_string()).collect();
        issues.push(format!(
            "Multiple jobs in encoding status ({} jobs: {}); only one job should encode at a time",
            encoding.len(),
            ids.join(", ")
        ));
    }

    let mut ripping_by_drive: HashMap<&str, Vec<i64>> = HashMap::new();
    for job in active.iter().filter(|j| j.status == JobStatus::Ripping) {
        ripping_by_drive
            .entry(job.drive_id.as_str())
            .or_default()
            .push(job.id);
    }
    for (drive_id, ids) in &ripping_by_drive {
        if ids.len() > 1 {
            let ids: Vec<String> = ids.iter().map(|id| id.to_string()).collect();
            issues.push(format!(
                "Multiple jobs ripping on drive {drive_id} ({} jobs: {}); a drive hosts one rip at a time",
                ids.len(),
                ids.join(", ")
            ));
        }
    }

    let now = Utc::now();
    for job in &active {
        let timeout_hours = match job.status {
            JobStatus::Ripping => RIPPING_TIMEOUT_HOURS,
            JobStatus::Encoding => ENCODING_TIMEOUT_HOURS,
            JobStatus::Identifying => IDENTIFYING_TIMEOUT_HOURS,
            _ => continue,
        };
        if job.updated_at < now - Duration::hours(timeout_hours) {
            let hours_stuck = (now - job.updated_at).num_minutes() as f64 / 60.0;
            issues.push(format!(
                "Job {} appears stuck in {} for {hours_stuck:.1} hours (threshold: {timeout_hours} hours)",
                job.id, job.status
            ));
        }
    }

    Ok(issues)
}

/// Revert all but the most recently touched encoding job to ripped.
///
/// Returns the number of jobs repaired. This is the only automatic repair.
pub async fn fix_stuck_encoding_jobs(pool: &SqlitePool) -> Result<usize> {
    let mut encoding = db::jobs::get_jobs_by_status(pool, JobStatus::Encoding).await?;
    if encoding.len() <= 1 {
        return Ok(0);
    }

    // Keep the newest; get_jobs_by_status returns oldest-first.
    encoding.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
    let mut fixed = 0;
    for job in &encoding[1..] {
        db::jobs::update_status(pool, job.id, JobStatus::Ripped, None).await?;
        fixed += 1;
    }

    info!(fixed, "Reverted duplicate encoding jobs to ripped");
    Ok(fixed)
}
