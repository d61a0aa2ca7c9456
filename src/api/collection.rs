//! Collection endpoints

use crate::api::{failure, map_store_error, ApiResult};
use crate::db;
use crate::AppState;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use serde_json::json;

pub async fn list_collection(State(state): State<AppState>) -> ApiResult {
    let items = db::collection::list(&state.db)
        .await
        .map_err(map_store_error)?;
    let count = items.len();
    Ok(Json(json!({ "items": items, "count": count })))
}

pub async fn remove_collection_item(
    State(state): State<AppState>,
    Path(item_id): Path<i64>,
) -> ApiResult {
    let removed = db::collection::remove(&state.db, item_id)
        .await
        .map_err(map_store_error)?;
    if !removed {
        return Err(failure(
            StatusCode::NOT_FOUND,
            format!("collection item {item_id} not found"),
        ));
    }
    Ok(Json(json!({ "success": true, "id": item_id })))
}
