//! Common error types for ripshelf

use crate::models::JobStatus;
use thiserror::Error;

/// Common result type for ripshelf operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error kinds distinguished by the pipeline core
#[derive(Error, Debug)]
pub enum Error {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Invalid status transition: {from} -> {to}")]
    InvalidTransition { from: JobStatus, to: JobStatus },

    #[error("Disc read error on drive {drive_id}: {details}")]
    DiscRead { drive_id: String, details: String },

    #[error("Rip error on drive {drive_id}, title {title_index}: {details}")]
    Rip {
        drive_id: String,
        title_index: u32,
        details: String,
    },

    #[error("Encode error: {0}")]
    Encode(String),

    #[error("Move error: {0}")]
    Move(String),

    #[error("Catalog error: {0}")]
    Catalog(String),

    #[error("Internal error: {0}")]
    Internal(String),
}
