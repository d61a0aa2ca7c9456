//! Drive watcher: disc-insertion edge detection
//!
//! One watcher task per drive. A job is created only on an absent-to-present
//! edge, so repeated probes of the same disc never create duplicates.

use crate::config::Config;
use crate::db;
use crate::disc::probe::{self, DriveStatus};
use crate::error::Result;
use sqlx::SqlitePool;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

pub struct DriveWatcher {
    db: SqlitePool,
    config: Arc<Config>,
    drive_id: String,
}

impl DriveWatcher {
    pub fn new(db: SqlitePool, config: Arc<Config>, drive_id: String) -> Self {
        Self {
            db,
            config,
            drive_id,
        }
    }

    /// Watch the drive until cancelled.
    pub async fn run(self, shutdown: CancellationToken) {
        info!(drive_id = %self.drive_id, "Drive watcher started");
        let mut interval = tokio::time::interval(self.config.drive_poll_interval);
        let mut disc_present = false;

        loop {
            tokio::select! {
                _ = interval.tick() => {
                    let status = probe::probe_drive(&self.drive_id).await;
                    if status.has_disc && !disc_present {
                        if let Err(e) = self.on_disc_inserted(&status).await {
                            error!(drive_id = %self.drive_id, error = %e, "Failed to handle disc insertion");
                        }
                    } else if !status.has_disc && disc_present {
                        info!(drive_id = %self.drive_id, "Disc removed");
                    }
                    disc_present = status.has_disc;
                }
                _ = shutdown.cancelled() => {
                    info!(drive_id = %self.drive_id, "Drive watcher shutting down");
                    break;
                }
            }
        }
    }

    async fn on_disc_inserted(&self, status: &DriveStatus) -> Result<()> {
        info!(
            drive_id = %self.drive_id,
            disc_label = %status.disc_label,
            "Disc inserted"
        );

        // The drive may still be working through the previous disc.
        if let Some(existing) = db::jobs::get_active_job_for_drive(&self.db, &self.drive_id).await? {
            info!(
                drive_id = %self.drive_id,
                job_id = existing.id,
                "Drive already has an active job, skipping job creation"
            );
            return Ok(());
        }

        let job = db::jobs::create_job(&self.db, &self.drive_id, &status.disc_label).await?;
        info!(
            drive_id = %self.drive_id,
            job_id = job.id,
            disc_label = %status.disc_label,
            "Created job"
        );
        Ok(())
    }
}
