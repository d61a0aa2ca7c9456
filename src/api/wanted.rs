//! Wanted-list endpoints

use crate::api::{failure, map_store_error, valid_year, ApiResult};
use crate::db;
use crate::models::ContentType;
use crate::AppState;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use serde::Deserialize;
use serde_json::json;

#[derive(Debug, Deserialize)]
pub struct WantedRequest {
    pub title: String,
    #[serde(default)]
    pub year: Option<i32>,
    #[serde(default = "default_content_type")]
    pub content_type: String,
    #[serde(default)]
    pub catalog_id: Option<i64>,
    #[serde(default)]
    pub poster_ref: Option<String>,
    #[serde(default)]
    pub notes: Option<String>,
}

fn default_content_type() -> String {
    "movie".to_string()
}

pub async fn list_wanted(State(state): State<AppState>) -> ApiResult {
    let items = db::wanted::list(&state.db).await.map_err(map_store_error)?;
    let count = items.len();
    Ok(Json(json!({ "items": items, "count": count })))
}

pub async fn add_wanted(
    State(state): State<AppState>,
    Json(body): Json<WantedRequest>,
) -> ApiResult {
    let content_type = match ContentType::parse(&body.content_type) {
        Some(ct @ (ContentType::Movie | ContentType::TvSeason)) => ct,
        _ => {
            return Err(failure(
                StatusCode::BAD_REQUEST,
                format!("invalid content_type: {}", body.content_type),
            ))
        }
    };
    if !valid_year(body.year) {
        return Err(failure(
            StatusCode::BAD_REQUEST,
            format!("year out of range: {:?}", body.year),
        ));
    }

    let id = db::wanted::add(
        &state.db,
        &body.title,
        body.year,
        content_type,
        body.catalog_id,
        body.poster_ref.as_deref(),
        body.notes.as_deref(),
    )
    .await
    .map_err(map_store_error)?;

    Ok(Json(json!({
        "success": true,
        "id": id,
        "title": body.title,
        "year": body.year,
        "content_type": content_type,
    })))
}

pub async fn remove_wanted(State(state): State<AppState>, Path(item_id): Path<i64>) -> ApiResult {
    let removed = db::wanted::remove(&state.db, item_id)
        .await
        .map_err(map_store_error)?;
    if !removed {
        return Err(failure(
            StatusCode::NOT_FOUND,
            format!("wanted item {item_id} not found"),
        ));
    }
    Ok(Json(json!({ "success": true, "id": item_id })))
}
