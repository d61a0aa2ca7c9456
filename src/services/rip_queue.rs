//! Rip worker: one per drive, pending jobs processed in creation order
//!
//! The worker claims a pending job by transitioning it to ripping, extracts
//! the main title into `staging/job_<id>/`, then ejects the disc. Failures
//! mark the job failed and are not retried.

use crate::config::Config;
use crate::db;
use crate::disc::{probe, ripper};
use crate::error::{Error, Result};
use crate::models::{JobStatus, PathField};
use crate::notify::Notifier;
use sqlx::SqlitePool;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Settle time after claiming a job, giving the disc a chance to spin up
const DISC_SPINUP_WAIT: Duration = Duration::from_secs(8);

pub struct RipWorker {
    db: SqlitePool,
    config: Arc<Config>,
    drive_id: String,
    notifier: Arc<Notifier>,
}

impl RipWorker {
    pub fn new(
        db: SqlitePool,
        config: Arc<Config>,
        drive_id: String,
        notifier: Arc<Notifier>,
    ) -> Self {
        Self {
            db,
            config,
            drive_id,
            notifier,
        }
    }

    /// Process pending jobs for this drive until cancelled.
    pub async fn run(self, shutdown: CancellationToken) {
        info!(drive_id = %self.drive_id, "Rip worker started");
        let mut interval = tokio::time::interval(self.config.drive_poll_interval);

        loop {
            tokio::select! {
                _ = interval.tick() => {
                    if let Err(e) = self.process_next(&shutdown).await {
                        error!(drive_id = %self.drive_id, error = %e, "Rip worker iteration failed");
                    }
                }
                _ = shutdown.cancelled() => {
                    info!(drive_id = %self.drive_id, "Rip worker shutting down");
                    break;
                }
            }
        }
    }

    /// Claim and rip the oldest pending job for this drive, if any.
    pub async fn process_next(&self, shutdown: &CancellationToken) -> Result<()> {
        let Some(job) = db::jobs::get_pending_job_for_drive(&self.db, &self.drive_id).await? else {
            return Ok(());
        };

        // Claiming can race a concurrent transition; losing is not an error.
        match db::jobs::update_status(&self.db, job.id, JobStatus::Ripping, None).await {
            Err(Error::InvalidTransition { .. }) => return Ok(()),
            other => other?,
        }

        info!(
            drive_id = %self.drive_id,
            job_id = job.id,
            disc_label = %job.disc_label,
            "Starting rip"
        );

        if let Err(e) = self.rip_job(job.id, shutdown).await {
            let message = e.to_string();
            error!(job_id = job.id, error = %message, "Rip failed");
            db::jobs::update_status(&self.db, job.id, JobStatus::Failed, Some(&message)).await?;
            if db::settings::active_mode(&self.db).await.unwrap_or(false) {
                self.notifier
                    .processing_error(&job.disc_label, &message)
                    .await;
            }
            probe::eject_drive(&self.drive_id).await;
        }

        Ok(())
    }

    async fn rip_job(&self, job_id: i64, shutdown: &CancellationToken) -> Result<()> {
        tokio::select! {
            _ = tokio::time::sleep(DISC_SPINUP_WAIT) => {}
            // Cancelled mid-rip: leave the job in ripping, startup cleanup
            // resets it on the next run.
            _ = shutdown.cancelled() => return Ok(()),
        }

        let titles = ripper::disc_titles(&self.drive_id).await?;
        let main_title = ripper::select_main_title(&titles).ok_or_else(|| Error::DiscRead {
            drive_id: self.drive_id.clone(),
            details: "no titles found on disc".to_string(),
        })?;

        info!(
            job_id,
            title_index = main_title.index,
            duration_min = main_title.duration_seconds / 60,
            "Selected main title"
        );

        let output_dir = self.config.staging_dir().join(format!("job_{job_id}"));
        let rip = ripper::rip_title(&self.drive_id, main_title.index, &output_dir, |fraction| {
            debug!(job_id, percent = fraction * 100.0, "Rip progress");
        });

        let ripped_path = tokio::select! {
            result = rip => result?,
            _ = shutdown.cancelled() => return Ok(()),
        };

        db::jobs::set_path(
            &self.db,
            job_id,
            PathField::Rip,
            &ripped_path.display().to_string(),
        )
        .await?;
        db::jobs::update_status(&self.db, job_id, JobStatus::Ripped, None).await?;

        info!(job_id, path = %ripped_path.display(), "Rip complete");

        if !probe::eject_drive(&self.drive_id).await {
            warn!(drive_id = %self.drive_id, "Could not eject disc after rip");
        }

        Ok(())
    }
}
