//! Active-mode endpoints

use crate::api::{map_store_error, ApiResult};
use crate::db;
use crate::AppState;
use axum::extract::State;
use axum::Json;
use serde::Deserialize;
use serde_json::json;

#[derive(Debug, Deserialize)]
pub struct ActiveModeRequest {
    #[serde(default)]
    pub active_mode: Option<bool>,
}

pub async fn get_active_mode(State(state): State<AppState>) -> ApiResult {
    let active = db::settings::active_mode(&state.db)
        .await
        .map_err(map_store_error)?;
    Ok(Json(json!({ "active_mode": active })))
}

/// Set active mode to the supplied value, or toggle it when no body is given.
pub async fn set_active_mode(
    State(state): State<AppState>,
    body: Option<Json<ActiveModeRequest>>,
) -> ApiResult {
    let current = db::settings::active_mode(&state.db)
        .await
        .map_err(map_store_error)?;
    let new_value = body
        .and_then(|Json(request)| request.active_mode)
        .unwrap_or(!current);

    db::settings::set_active_mode(&state.db, new_value)
        .await
        .map_err(map_store_error)?;

    Ok(Json(json!({ "success": true, "active_mode": new_value })))
}
