//! JSON control surface
//!
//! Thin wrappers over store operations plus guard logic. Successful responses
//! carry `{"success": true, ...}`; failures carry `{"detail": ...}` with a
//! 404 for unknown ids and a 400 for guard violations.

pub mod collection;
pub mod health;
pub mod jobs;
pub mod oversight;
pub mod settings;
pub mod wanted;

use crate::error::Error;
use axum::http::StatusCode;
use axum::Json;
use serde_json::{json, Value};

/// Handler result: JSON body or an error status with a detail body
pub type ApiResult = std::result::Result<Json<Value>, (StatusCode, Json<Value>)>;

pub(crate) fn failure(status: StatusCode, detail: impl Into<String>) -> (StatusCode, Json<Value>) {
    (status, Json(json!({ "detail": detail.into() })))
}

/// Map store errors onto HTTP status codes.
pub(crate) fn map_store_error(error: Error) -> (StatusCode, Json<Value>) {
    match &error {
        Error::NotFound(_) => failure(StatusCode::NOT_FOUND, error.to_string()),
        Error::InvalidTransition { .. } => failure(StatusCode::BAD_REQUEST, error.to_string()),
        _ => {
            tracing::error!(error = %error, "Control surface operation failed");
            failure(StatusCode::INTERNAL_SERVER_ERROR, "internal error")
        }
    }
}

/// Accept absent years, reject nonsense ones.
pub(crate) fn valid_year(year: Option<i32>) -> bool {
    year.map_or(true, |y| (1800..=2100).contains(&y))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn year_guard_accepts_range_and_absence() {
        assert!(valid_year(None));
        assert!(valid_year(Some(1800)));
        assert!(valid_year(Some(1999)));
        assert!(valid_year(Some(2100)));
        assert!(!valid_year(Some(1799)));
        assert!(!valid_year(Some(2101)));
        assert!(!valid_year(Some(-5)));
    }
}
