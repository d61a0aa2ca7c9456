//! ripshelf - unattended optical disc ingestion pipeline
//!
//! Discs inserted into the configured drives are ripped per drive in
//! parallel, transcoded strictly one at a time, identified against an
//! external catalog with a confidence score, optionally human-reviewed, then
//! filed into the media library and recorded in the local collection.

use axum::Router;
use sqlx::SqlitePool;
use std::sync::Arc;

pub mod api;
pub mod catalog;
pub mod config;
pub mod db;
pub mod disc;
pub mod error;
pub mod models;
pub mod notify;
pub mod services;
pub mod transcode;

/// Application state shared across HTTP handlers
#[derive(Clone)]
pub struct AppState {
    /// Database connection pool
    pub db: SqlitePool,
    /// Application configuration
    pub config: Arc<config::Config>,
    /// External catalog used for manual-identification poster lookups
    pub catalog: Arc<dyn catalog::Catalog>,
}

impl AppState {
    pub fn new(
        db: SqlitePool,
        config: Arc<config::Config>,
        catalog: Arc<dyn catalog::Catalog>,
    ) -> Self {
        Self {
            db,
            config,
            catalog,
        }
    }
}

/// Build the control-surface router.
pub fn build_router(state: AppState) -> Router {
    use axum::routing::{delete, get, post};

    Router::new()
        .route("/health", get(api::health::health_check))
        .route("/api/jobs/recent", get(api::jobs::recent_jobs))
        .route("/api/jobs/:id/approve", post(api::jobs::approve_job))
        .route("/api/jobs/:id/identify", post(api::jobs::identify_job))
        .route("/api/jobs/:id/pre-identify", post(api::jobs::pre_identify_job))
        .route("/api/jobs/:id/skip", post(api::jobs::skip_job))
        .route("/api/jobs/:id/archive", post(api::jobs::archive_job))
        .route("/api/oversight/check", get(api::oversight::check))
        .route("/api/oversight/fix-encoding", post(api::oversight::fix_encoding))
        .route(
            "/api/active-mode",
            get(api::settings::get_active_mode).post(api::settings::set_active_mode),
        )
        .route(
            "/api/wanted",
            get(api::wanted::list_wanted).post(api::wanted::add_wanted),
        )
        .route("/api/wanted/:id", delete(api::wanted::remove_wanted))
        .route("/api/collection", get(api::collection::list_collection))
        .route(
            "/api/collection/:id",
            delete(api::collection::remove_collection_item),
        )
        .with_state(state)
}
