//! Oversight endpoints: consistency check and bounded repair

use crate::api::{map_store_error, ApiResult};
use crate::services::oversight;
use crate::AppState;
use axum::extract::State;
use axum::Json;
use serde_json::json;

pub async fn check(State(state): State<AppState>) -> ApiResult {
    let issues = oversight::check_state_consistency(&state.db)
        .await
        .map_err(map_store_error)?;
    let count = issues.len();
    Ok(Json(json!({ "issues": issues, "count": count })))
}

pub async fn fix_encoding(State(state): State<AppState>) -> ApiResult {
    let fixed_count = oversight::fix_stuck_encoding_jobs(&state.db)
        .await
        .map_err(map_store_error)?;
    Ok(Json(json!({ "success": true, "fixed_count": fixed_count })))
}
