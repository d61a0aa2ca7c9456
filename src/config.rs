//! Configuration loading from environment variables

use crate::error::{Error, Result};
use std::path::PathBuf;
use std::time::Duration;

/// Confidence at or above which identification is auto-approved
pub const DEFAULT_AUTO_APPROVE_THRESHOLD: f64 = 0.85;

/// Default probe cadence in seconds
pub const DEFAULT_DRIVE_POLL_INTERVAL: f64 = 15.0;

/// Application configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Parent of the staging/encoding/logs/data directories
    pub workspace_dir: PathBuf,
    /// Movie library root (typically an external volume)
    pub movies_dir: PathBuf,
    /// TV library root
    pub tv_dir: PathBuf,
    /// Drive identifiers to poll
    pub drive_ids: Vec<String>,
    /// Probe cadence per drive
    pub drive_poll_interval: Duration,
    /// Confidence threshold for auto-approving identifications
    pub auto_approve_threshold: f64,
    /// TMDb bearer token; empty disables the catalog
    pub tmdb_api_token: String,
    /// Pushover credentials; empty disables notifications
    pub pushover_user_key: String,
    pub pushover_api_token: String,
    /// Control surface bind address
    pub web_host: String,
    pub web_port: u16,
    /// Initial active-mode flag, persisted to settings on first start
    pub active_mode: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            workspace_dir: default_workspace_dir(),
            movies_dir: PathBuf::from("/Volumes/Media/Movies"),
            tv_dir: PathBuf::from("/Volumes/Media/TV Shows"),
            drive_ids: vec!["0".to_string(), "1".to_string()],
            drive_poll_interval: Duration::from_secs_f64(DEFAULT_DRIVE_POLL_INTERVAL),
            auto_approve_threshold: DEFAULT_AUTO_APPROVE_THRESHOLD,
            tmdb_api_token: String::new(),
            pushover_user_key: String::new(),
            pushover_api_token: String::new(),
            web_host: "127.0.0.1".to_string(),
            web_port: 8080,
            active_mode: false,
        }
    }
}

impl Config {
    /// Load configuration from environment variables, falling back to defaults.
    pub fn load() -> Result<Self> {
        let defaults = Config::default();

        let auto_approve_threshold = std::env::var("AUTO_APPROVE_THRESHOLD")
            .ok()
            .and_then(|s| s.parse::<f64>().ok())
            .unwrap_or(DEFAULT_AUTO_APPROVE_THRESHOLD);
        if !(0.0..=1.0).contains(&auto_approve_threshold) {
            return Err(Error::Config(format!(
                "AUTO_APPROVE_THRESHOLD must be between 0.0 and 1.0, got {auto_approve_threshold}"
            )));
        }

        let drive_ids: Vec<String> = std::env::var("DRIVE_IDS")
            .unwrap_or_else(|_| "0,1".to_string())
            .split(',')
            .map(|d| d.trim().to_string())
            .filter(|d| !d.is_empty())
            .collect();

        let drive_poll_interval = std::env::var("DRIVE_POLL_INTERVAL")
            .ok()
            .and_then(|s| s.parse::<f64>().ok())
            .filter(|v| *v > 0.0)
            .unwrap_or(DEFAULT_DRIVE_POLL_INTERVAL);

        Ok(Self {
            workspace_dir: env_path("WORKSPACE_DIR").unwrap_or(defaults.workspace_dir),
            movies_dir: env_path("MOVIES_DIR").unwrap_or(defaults.movies_dir),
            tv_dir: env_path("TV_DIR").unwrap_or(defaults.tv_dir),
            drive_ids,
            drive_poll_interval: Duration::from_secs_f64(drive_poll_interval),
            auto_approve_threshold,
            tmdb_api_token: std::env::var("TMDB_API_TOKEN").unwrap_or_default(),
            pushover_user_key: std::env::var("PUSHOVER_USER_KEY").unwrap_or_default(),
            pushover_api_token: std::env::var("PUSHOVER_API_TOKEN").unwrap_or_default(),
            web_host: std::env::var("WEB_HOST").unwrap_or(defaults.web_host),
            web_port: std::env::var("WEB_PORT")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.web_port),
            active_mode: std::env::var("ACTIVE_MODE")
                .map(|v| v.eq_ignore_ascii_case("true"))
                .unwrap_or(false),
        })
    }

    /// Directory for in-progress rips, one subdirectory per job
    pub fn staging_dir(&self) -> PathBuf {
        self.workspace_dir.join("staging")
    }

    /// Directory for in-progress encodes, one subdirectory per job
    pub fn encoding_dir(&self) -> PathBuf {
        self.workspace_dir.join("encoding")
    }

    pub fn logs_dir(&self) -> PathBuf {
        self.workspace_dir.join("logs")
    }

    pub fn data_dir(&self) -> PathBuf {
        self.workspace_dir.join("data")
    }

    /// URL of the review page, included in review notifications
    pub fn review_url(&self) -> String {
        format!("http://{}:{}/review", self.web_host, self.web_port)
    }

    /// Create the workspace directory tree if missing.
    pub fn ensure_directories(&self) -> Result<()> {
        for dir in [
            self.workspace_dir.clone(),
            self.staging_dir(),
            self.encoding_dir(),
            self.logs_dir(),
            self.data_dir(),
        ] {
            std::fs::create_dir_all(&dir)?;
        }
        Ok(())
    }
}

fn env_path(name: &str) -> Option<PathBuf> {
    std::env::var(name).ok().map(PathBuf::from)
}

fn default_workspace_dir() -> PathBuf {
    dirs::home_dir()
        .map(|home| home.join("DVDWorkspace"))
        .unwrap_or_else(|| PathBuf::from("./DVDWorkspace"))
}
