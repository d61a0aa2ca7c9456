//! File mover: file encoded artifacts into the library
//!
//! Moving jobs are processed oldest-first. When the library root is missing
//! (external volume unmounted) the job simply stays in moving and is retried
//! on the next pass. A successful move records a collection row and clears
//! the per-job staging directories.

use crate::config::Config;
use crate::db;
use crate::error::Result;
use crate::models::{ContentType, Job, JobStatus, PathField};
use crate::notify::Notifier;
use regex::Regex;
use sqlx::SqlitePool;
use std::path::{Path, PathBuf};
use std::sync::{Arc, OnceLock};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

/// Remove characters disallowed by common library filesystems.
///
/// Strips `<>:"/\|?*` and control characters, collapses runs of whitespace,
/// and trims leading/trailing whitespace and dots.
pub fn sanitize_filename(name: &str) -> String {
    static RE: OnceLock<Regex> = OnceLock::new();
    let re = RE.get_or_init(|| Regex::new(r#"[<>:"/\\|?*\x00-\x1f]"#).unwrap());

    let stripped = re.replace_all(name, "");
    let collapsed = stripped.split_whitespace().collect::<Vec<_>>().join(" ");
    collapsed
        .trim_matches(|c: char| c == ' ' || c == '.')
        .to_string()
}

/// Folder name for a movie: "Title (Year)", or just "Title" without a year.
pub fn movie_folder(title: &str, year: Option<i32>) -> String {
    let title = sanitize_filename(title);
    match year {
        Some(year) => format!("{title} ({year})"),
        None => title,
    }
}

/// Filename for a movie: "Title (Year).ext".
pub fn movie_filename(title: &str, year: Option<i32>, ext: &str) -> String {
    format!("{}.{ext}", movie_folder(title, year))
}

/// Filename for a TV episode: "Show - SnnEnn - Title.ext".
pub fn episode_filename(
    show: &str,
    season: u32,
    episode: u32,
    episode_title: Option<&str>,
    ext: &str,
) -> String {
    let show = sanitize_filename(show);
    let code = format!("S{season:02}E{episode:02}");
    match episode_title {
        Some(title) => format!("{show} - {code} - {}.{ext}", sanitize_filename(title)),
        None => format!("{show} - {code}.{ext}"),
    }
}

enum MoveOutcome {
    Moved(PathBuf),
    /// Destination root is unavailable; keep the job queued and retry later.
    Deferred(String),
    Failed(String),
}

pub struct FileMover {
    db: SqlitePool,
    config: Arc<Config>,
    notifier: Arc<Notifier>,
}

impl FileMover {
    pub fn new(db: SqlitePool, config: Arc<Config>, notifier: Arc<Notifier>) -> Self {
        Self {
            db,
            config,
            notifier,
        }
    }

    /// Process moving jobs until cancelled.
    pub async fn run(self, shutdown: CancellationToken) {
        info!("File mover started");
        let mut interval = tokio::time::interval(self.config.drive_poll_interval);

        loop {
            tokio::select! {
                _ = interval.tick() => {
                    if let Err(e) = process_jobs(&self.db, &self.config, &self.notifier).await {
                        error!(error = %e, "File mover iteration failed");
                    }
                }
                _ = shutdown.cancelled() => {
                    info!("File mover shutting down");
                    break;
                }
            }
        }
    }
}

/// One pass over all jobs currently in moving, oldest first.
pub async fn process_jobs(pool: &SqlitePool, config: &Config, notifier: &Notifier) -> Result<()> {
    let jobs = db::jobs::get_jobs_by_status(pool, JobStatus::Moving).await?;
    for job in jobs {
        let job_id = job.id;
        if let Err(e) = process_job(pool, config, notifier, job).await {
            let message = e.to_string();
            error!(job_id, error = %message, "Move failed");
            db::jobs::update_status(pool, job_id, JobStatus::Failed, Some(&message)).await?;
        }
    }
    Ok(())
}

async fn process_job(
    pool: &SqlitePool,
    config: &Config,
    notifier: &Notifier,
    job: Job,
) -> Result<()> {
    let Some(encode_path) = job.encode_path.clone() else {
        return fail_job(pool, job.id, "job has no encoded file").await;
    };
    let source = PathBuf::from(&encode_path);
    if tokio::fs::metadata(&source).await.is_err() {
        return fail_job(pool, job.id, &format!("encoded file not found: {encode_path}")).await;
    }
    let Some(title) = job.identified_title.clone() else {
        return fail_job(pool, job.id, "job has no identified title").await;
    };

    let ext = source
        .extension()
        .map(|e| e.to_string_lossy().into_owned())
        .unwrap_or_else(|| "mkv".to_string());

    let outcome = match job.content_type {
        ContentType::TvSeason => {
            move_episode(config, &source, &title, 1, 1, None, &ext).await
        }
        _ => move_movie(config, &source, &title, job.identified_year, &ext).await,
    };

    match outcome {
        MoveOutcome::Deferred(reason) => {
            warn!(job_id = job.id, %reason, "Library unavailable, leaving job queued");
            Ok(())
        }
        MoveOutcome::Failed(message) => fail_job(pool, job.id, &message).await,
        MoveOutcome::Moved(final_path) => {
            db::jobs::set_path(
                pool,
                job.id,
                PathField::Final,
                &final_path.display().to_string(),
            )
            .await?;
            db::jobs::update_status(pool, job.id, JobStatus::Complete, None).await?;

            db::collection::add(
                pool,
                job.content_type,
                &title,
                job.identified_year,
                job.catalog_id,
                &final_path.display().to_string(),
            )
            .await?;

            cleanup_staging(&source, job.rip_path.as_deref()).await;

            info!(
                job_id = job.id,
                title = %title,
                path = %final_path.display(),
                "Job complete"
            );

            if db::settings::active_mode(pool).await.unwrap_or(false) {
                notifier
                    .disc_complete(&job.disc_label, Some(&title), job.identified_year)
                    .await;
            }
            Ok(())
        }
    }
}

async fn fail_job(pool: &SqlitePool, job_id: i64, message: &str) -> Result<()> {
    error!(job_id, error = %message, "Move failed");
    db::jobs::update_status(pool, job_id, JobStatus::Failed, Some(message)).await
}

async fn move_movie(
    config: &Config,
    source: &Path,
    title: &str,
    year: Option<i32>,
    ext: &str,
) -> MoveOutcome {
    let root = &config.movies_dir;
    if tokio::fs::metadata(root).await.is_err() {
        return MoveOutcome::Deferred(format!("movies root not found: {}", root.display()));
    }

    let movie_dir = root.join(movie_folder(title, year));
    if let Err(e) = tokio::fs::create_dir_all(&movie_dir).await {
        return MoveOutcome::Failed(format!("failed to create {}: {e}", movie_dir.display()));
    }

    let dest = movie_dir.join(movie_filename(title, year, ext));
    match move_file(source, &dest).await {
        Ok(()) => MoveOutcome::Moved(dest),
        Err(e) => MoveOutcome::Failed(format!("failed to move to {}: {e}", dest.display())),
    }
}

async fn move_episode(
    config: &Config,
    source: &Path,
    show: &str,
    season: u32,
    episode: u32,
    episode_title: Option<&str>,
    ext: &str,
) -> MoveOutcome {
    let root = &config.tv_dir;
    if tokio::fs::metadata(root).await.is_err() {
        return MoveOutcome::Deferred(format!("tv root not found: {}", root.display()));
    }

    let season_dir = root
        .join(sanitize_filename(show))
        .join(format!("Season {season:02}"));
    if let Err(e) = tokio::fs::create_dir_all(&season_dir).await {
        return MoveOutcome::Failed(format!("failed to create {}: {e}", season_dir.display()));
    }

    let dest = season_dir.join(episode_filename(show, season, episode, episode_title, ext));
    match move_file(source, &dest).await {
        Ok(()) => MoveOutcome::Moved(dest),
        Err(e) => MoveOutcome::Failed(format!("failed to move to {}: {e}", dest.display())),
    }
}

/// Rename, falling back to copy-and-delete across filesystems.
async fn move_file(source: &Path, dest: &Path) -> std::io::Result<()> {
    if tokio::fs::rename(source, dest).await.is_ok() {
        return Ok(());
    }
    tokio::fs::copy(source, dest).await?;
    tokio::fs::remove_file(source).await
}

/// Remove the per-job encoding and staging directories.
///
/// Failures are logged at error severity but never fail the job; the files
/// have already been delivered.
async fn cleanup_staging(encode_path: &Path, rip_path: Option<&str>) {
    if let Some(encode_dir) = encode_path.parent() {
        if let Err(e) = tokio::fs::remove_dir_all(encode_dir).await {
            error!(dir = %encode_dir.display(), error = %e, "Failed to clean up encode directory");
        }
    }
    if let Some(rip_path) = rip_path {
        if let Some(rip_dir) = Path::new(rip_path).parent() {
            if let Err(e) = tokio::fs::remove_dir_all(rip_dir).await {
                error!(dir = %rip_dir.display(), error = %e, "Failed to clean up rip directory");
            }
        }
    }
}
