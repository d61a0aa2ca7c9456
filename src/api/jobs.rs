//! Job mutation endpoints: approve, identify, pre-identify, skip, archive

use crate::api::{failure, map_store_error, valid_year, ApiResult};
use crate::db;
use crate::models::{ContentType, Job, JobStatus};
use crate::services::identifier;
use crate::AppState;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use serde::Deserialize;
use serde_json::json;

/// Body for identify and pre-identify
#[derive(Debug, Deserialize)]
pub struct IdentifyRequest {
    pub title: String,
    #[serde(default)]
    pub year: Option<i32>,
    #[serde(default)]
    pub catalog_id: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub struct RecentJobsQuery {
    #[serde(default)]
    pub limit: Option<i64>,
}

async fn fetch_job(state: &AppState, job_id: i64) -> Result<Job, (StatusCode, Json<serde_json::Value>)> {
    db::jobs::get_job(&state.db, job_id)
        .await
        .map_err(map_store_error)
}

/// Recent non-archived jobs for the dashboard.
pub async fn recent_jobs(
    State(state): State<AppState>,
    Query(query): Query<RecentJobsQuery>,
) -> ApiResult {
    let limit = query.limit.unwrap_or(20).clamp(1, 200);
    let jobs = db::jobs::get_recent_jobs(&state.db, limit, true)
        .await
        .map_err(map_store_error)?;
    let count = jobs.len();
    Ok(Json(json!({ "jobs": jobs, "count": count })))
}

/// Accept a reviewed identification and queue the move.
pub async fn approve_job(State(state): State<AppState>, Path(job_id): Path<i64>) -> ApiResult {
    let job = fetch_job(&state, job_id).await?;
    if job.status != JobStatus::Review {
        return Err(failure(
            StatusCode::BAD_REQUEST,
            format!("job is not in review status (current: {})", job.status),
        ));
    }

    db::jobs::update_status(&state.db, job_id, JobStatus::Moving, None)
        .await
        .map_err(map_store_error)?;

    Ok(Json(json!({
        "success": true,
        "job_id": job_id,
        "status": "moving",
    })))
}

/// Replace a reviewed identification with an operator-supplied one.
pub async fn identify_job(
    State(state): State<AppState>,
    Path(job_id): Path<i64>,
    Json(body): Json<IdentifyRequest>,
) -> ApiResult {
    let job = fetch_job(&state, job_id).await?;
    if job.status != JobStatus::Review {
        return Err(failure(
            StatusCode::BAD_REQUEST,
            format!("job is not in review status (current: {})", job.status),
        ));
    }
    if !valid_year(body.year) {
        return Err(failure(
            StatusCode::BAD_REQUEST,
            format!("year out of range: {:?}", body.year),
        ));
    }

    let (catalog_id, poster_ref) = identifier::lookup_poster(
        state.catalog.as_ref(),
        &body.title,
        body.year,
        body.catalog_id,
    )
    .await;

    // Manual identification carries full confidence.
    db::jobs::update_identification(
        &state.db,
        job_id,
        ContentType::Movie,
        &body.title,
        body.year,
        catalog_id,
        1.0,
        poster_ref.as_deref(),
    )
    .await
    .map_err(map_store_error)?;

    db::jobs::update_status(&state.db, job_id, JobStatus::Moving, None)
        .await
        .map_err(map_store_error)?;

    Ok(Json(json!({
        "success": true,
        "job_id": job_id,
        "status": "moving",
        "identified_title": body.title,
        "identified_year": body.year,
        "catalog_id": catalog_id,
    })))
}

/// Identify a job before it reaches review; status is left unchanged.
pub async fn pre_identify_job(
    State(state): State<AppState>,
    Path(job_id): Path<i64>,
    Json(body): Json<IdentifyRequest>,
) -> ApiResult {
    let job = fetch_job(&state, job_id).await?;
    let allowed = matches!(
        job.status,
        JobStatus::Pending
            | JobStatus::Ripping
            | JobStatus::Ripped
            | JobStatus::Encoding
            | JobStatus::Encoded
            | JobStatus::Identifying
    );
    if !allowed {
        return Err(failure(
            StatusCode::BAD_REQUEST,
            format!("pre-identify not allowed for jobs in {} status", job.status),
        ));
    }
    if !valid_year(body.year) {
        return Err(failure(
            StatusCode::BAD_REQUEST,
            format!("year out of range: {:?}", body.year),
        ));
    }

    let (catalog_id, poster_ref) = identifier::lookup_poster(
        state.catalog.as_ref(),
        &body.title,
        body.year,
        body.catalog_id,
    )
    .await;

    db::jobs::update_identification(
        &state.db,
        job_id,
        ContentType::Movie,
        &body.title,
        body.year,
        catalog_id,
        1.0,
        poster_ref.as_deref(),
    )
    .await
    .map_err(map_store_error)?;

    Ok(Json(json!({
        "success": true,
        "job_id": job_id,
        "status": job.status,
        "identified_title": body.title,
        "identified_year": body.year,
        "catalog_id": catalog_id,
    })))
}

/// Reject a reviewed job.
pub async fn skip_job(State(state): State<AppState>, Path(job_id): Path<i64>) -> ApiResult {
    let job = fetch_job(&state, job_id).await?;
    if job.status != JobStatus::Review {
        return Err(failure(
            StatusCode::BAD_REQUEST,
            format!("job is not in review status (current: {})", job.status),
        ));
    }

    db::jobs::update_status(&state.db, job_id, JobStatus::Failed, Some("Skipped by user"))
        .await
        .map_err(map_store_error)?;

    Ok(Json(json!({
        "success": true,
        "job_id": job_id,
        "status": "failed",
        "error_message": "Skipped by user",
    })))
}

/// Hide a finished job from the active dashboard.
pub async fn archive_job(State(state): State<AppState>, Path(job_id): Path<i64>) -> ApiResult {
    let job = fetch_job(&state, job_id).await?;
    if !matches!(job.status, JobStatus::Complete | JobStatus::Failed) {
        return Err(failure(
            StatusCode::BAD_REQUEST,
            format!(
                "can only archive complete or failed jobs (current: {})",
                job.status
            ),
        ));
    }

    db::jobs::update_status(&state.db, job_id, JobStatus::Archived, None)
        .await
        .map_err(map_store_error)?;

    Ok(Json(json!({
        "success": true,
        "job_id": job_id,
        "status": "archived",
    })))
}
