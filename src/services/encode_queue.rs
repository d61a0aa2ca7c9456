//! Encode worker: strictly one transcode in flight, globally
//!
//! Ripped jobs are picked oldest-first. On shutdown a job caught mid-encode
//! is reverted to ripped so the next run re-picks it; the partial output is
//! unusable anyway. This reversion is the one place a worker retracts
//! progress.

use crate::config::Config;
use crate::db;
use crate::error::{Error, Result};
use crate::models::{JobStatus, PathField};
use crate::transcode;
use sqlx::SqlitePool;
use std::path::Path;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

pub struct EncodeWorker {
    db: SqlitePool,
    config: Arc<Config>,
}

impl EncodeWorker {
    pub fn new(db: SqlitePool, config: Arc<Config>) -> Self {
        Self { db, config }
    }

    /// Process ripped jobs one at a time until cancelled.
    pub async fn run(self, shutdown: CancellationToken) {
        info!("Encode worker started");
        let mut interval = tokio::time::interval(self.config.drive_poll_interval);

        loop {
            tokio::select! {
                _ = interval.tick() => {
                    if let Err(e) = self.process_next(&shutdown).await {
                        error!(error = %e, "Encode worker iteration failed");
                    }
                }
                _ = shutdown.cancelled() => {
                    info!("Encode worker shutting down");
                    break;
                }
            }
        }
    }

    /// Claim and transcode the oldest ripped job, if any.
    pub async fn process_next(&self, shutdown: &CancellationToken) -> Result<()> {
        let jobs = db::jobs::get_jobs_by_status(&self.db, JobStatus::Ripped).await?;
        let Some(job) = jobs.into_iter().next() else {
            return Ok(());
        };

        // Another encode may already hold the slot; losing the claim is fine.
        match db::jobs::update_status(&self.db, job.id, JobStatus::Encoding, None).await {
            Err(Error::InvalidTransition { .. }) => return Ok(()),
            other => other?,
        }

        let Some(rip_path) = job.rip_path.clone() else {
            return self.fail_job(job.id, "job has no rip path").await;
        };
        let input = Path::new(&rip_path);
        if tokio::fs::metadata(input).await.is_err() {
            return self
                .fail_job(job.id, &format!("rip file not found: {rip_path}"))
                .await;
        }

        info!(job_id = job.id, disc_label = %job.disc_label, "Starting encode");

        let output_dir = self.config.encoding_dir().join(format!("job_{}", job.id));
        let stem = input
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "title".to_string());
        let output = output_dir.join(format!("{stem}.mkv"));

        let job_id = job.id;
        let encode = transcode::encode_file(input, &output, |report| {
            debug!(
                job_id,
                percent = report.percent,
                fps = report.fps,
                eta = report.eta.as_deref(),
                "Encode progress"
            );
        });

        tokio::select! {
            result = encode => match result {
                Ok(()) => {
                    db::jobs::set_path(
                        &self.db,
                        job.id,
                        PathField::Encode,
                        &output.display().to_string(),
                    )
                    .await?;
                    db::jobs::update_status(&self.db, job.id, JobStatus::Encoded, None).await?;
                    info!(job_id = job.id, path = %output.display(), "Encode complete");
                }
                Err(e) => {
                    let message = e.to_string();
                    error!(job_id = job.id, error = %message, "Encode failed");
                    db::jobs::update_status(&self.db, job.id, JobStatus::Failed, Some(&message))
                        .await?;
                }
            },
            _ = shutdown.cancelled() => {
                // Checkpoint: put the job back so the next run re-picks it.
                warn!(job_id = job.id, "Encode cancelled, reverting job to ripped");
                db::jobs::update_status(&self.db, job.id, JobStatus::Ripped, None).await?;
            }
        }

        Ok(())
    }

    async fn fail_job(&self, job_id: i64, message: &str) -> Result<()> {
        error!(job_id, error = %message, "Encode failed");
        db::jobs::update_status(&self.db, job_id, JobStatus::Failed, Some(message)).await
    }
}
