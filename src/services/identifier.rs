//! Identifier: resolve encoded jobs to catalog matches
//!
//! Confidence combines title similarity, catalog popularity and a
//! first-result bonus, clamped below 1.0: full confidence is reserved for a
//! human saying so. Jobs pre-identified by the operator skip the catalog
//! entirely.

use crate::catalog::{clean_disc_label, Catalog};
use crate::config::Config;
use crate::db;
use crate::error::Result;
use crate::models::{ContentType, Job, JobStatus};
use crate::notify::Notifier;
use regex::Regex;
use sqlx::SqlitePool;
use std::collections::HashSet;
use std::sync::{Arc, OnceLock};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

/// Ceiling for automatically computed confidence; 1.0 means a human asserted it
pub const MAX_AUTO_CONFIDENCE: f64 = 0.99;

/// Popularity value that maps to a full popularity score
const POPULARITY_SCALE: f64 = 100.0;

/// Similarity between a search query and a candidate title, in [0, 1].
///
/// Exact match after punctuation stripping scores 1.0, containment scores the
/// length ratio, anything else falls back to Jaccard token overlap.
pub fn title_similarity(query: &str, title: &str) -> f64 {
    fn normalize(s: &str) -> String {
        static RE: OnceLock<Regex> = OnceLock::new();
        let re = RE.get_or_init(|| Regex::new(r"[^\w\s]").unwrap());
        re.replace_all(&s.to_lowercase(), "").trim().to_string()
    }

    let query = normalize(query);
    let title = normalize(title);

    if query.is_empty() && title.is_empty() {
        return 1.0;
    }
    if query.is_empty() || title.is_empty() {
        return 0.0;
    }
    if query == title {
        return 1.0;
    }

    if query.contains(&title) || title.contains(&query) {
        let shorter = query.len().min(title.len()) as f64;
        let longer = query.len().max(title.len()) as f64;
        return shorter / longer;
    }

    let query_words: HashSet<&str> = query.split_whitespace().collect();
    let title_words: HashSet<&str> = title.split_whitespace().collect();
    let overlap = query_words.intersection(&title_words).count() as f64;
    let total = query_words.union(&title_words).count() as f64;
    if total > 0.0 {
        overlap / total
    } else {
        0.0
    }
}

/// Linear popularity contribution, capped at 1.0.
pub fn popularity_score(popularity: f64) -> f64 {
    if popularity <= 0.0 {
        0.0
    } else {
        (popularity / POPULARITY_SCALE).min(1.0)
    }
}

/// Confidence for one candidate: 60% title match, 25% popularity, 15% bonus
/// for the catalog's top-ranked result.
pub fn match_confidence(query: &str, title: &str, popularity: f64, is_first: bool) -> f64 {
    let rank_bonus = if is_first { 0.15 } else { 0.0 };
    let confidence =
        title_similarity(query, title) * 0.60 + popularity_score(popularity) * 0.25 + rank_bonus;
    confidence.clamp(0.0, MAX_AUTO_CONFIDENCE)
}

pub struct IdentifierService {
    db: SqlitePool,
    config: Arc<Config>,
    catalog: Arc<dyn Catalog>,
    notifier: Arc<Notifier>,
}

impl IdentifierService {
    pub fn new(
        db: SqlitePool,
        config: Arc<Config>,
        catalog: Arc<dyn Catalog>,
        notifier: Arc<Notifier>,
    ) -> Self {
        Self {
            db,
            config,
            catalog,
            notifier,
        }
    }

    /// Identify encoded jobs until cancelled, one job per pass.
    pub async fn run(self, shutdown: CancellationToken) {
        info!("Identifier started");
        let mut interval = tokio::time::interval(self.config.drive_poll_interval);

        loop {
            tokio::select! {
                _ = interval.tick() => {
                    if let Err(e) =
                        process_next(&self.db, &self.config, self.catalog.as_ref(), &self.notifier).await
                    {
                        error!(error = %e, "Identifier iteration failed");
                    }
                }
                _ = shutdown.cancelled() => {
                    info!("Identifier shutting down");
                    break;
                }
            }
        }
    }
}

/// Identify the oldest encoded job, if any.
pub async fn process_next(
    pool: &SqlitePool,
    config: &Config,
    catalog: &dyn Catalog,
    notifier: &Notifier,
) -> Result<()> {
    let jobs = db::jobs::get_jobs_by_status(pool, JobStatus::Encoded).await?;
    let Some(job) = jobs.into_iter().next() else {
        return Ok(());
    };

    let job_id = job.id;
    let disc_label = job.disc_label.clone();
    if let Err(e) = identify_job(pool, config, catalog, notifier, job).await {
        let message = e.to_string();
        error!(job_id, error = %message, "Identification failed");
        if let Err(store_err) =
            db::jobs::update_status(pool, job_id, JobStatus::Failed, Some(&message)).await
        {
            error!(job_id, error = %store_err, "Could not mark job failed");
        }
        if db::settings::active_mode(pool).await.unwrap_or(false) {
            notifier.processing_error(&disc_label, &message).await;
        }
    }
    Ok(())
}

async fn identify_job(
    pool: &SqlitePool,
    config: &Config,
    catalog: &dyn Catalog,
    notifier: &Notifier,
    job: Job,
) -> Result<()> {
    db::jobs::update_status(pool, job.id, JobStatus::Identifying, None).await?;

    // Operator got there first: title plus full confidence means skip the catalog.
    let job = db::jobs::get_job(pool, job.id).await?;
    if job.identified_title.is_some() && job.confidence == Some(1.0) {
        info!(
            job_id = job.id,
            title = job.identified_title.as_deref(),
            "Job pre-identified, skipping catalog lookup"
        );
        db::jobs::update_status(pool, job.id, JobStatus::Moving, None).await?;
        return Ok(());
    }

    let query = clean_disc_label(&job.disc_label);
    info!(job_id = job.id, disc_label = %job.disc_label, query = %query, "Identifying content");

    let candidates = match catalog.search_movie(&query, None).await {
        Ok(candidates) => candidates,
        Err(e) => {
            warn!(job_id = job.id, error = %e, "Catalog unavailable, routing to review");
            Vec::new()
        }
    };

    let best = candidates
        .iter()
        .enumerate()
        .map(|(rank, candidate)| {
            (
                match_confidence(&query, &candidate.title, candidate.popularity, rank == 0),
                candidate,
            )
        })
        .max_by(|a, b| a.0.total_cmp(&b.0));

    let Some((confidence, candidate)) = best else {
        info!(job_id = job.id, "No catalog candidates, needs manual review");
        db::jobs::update_status(pool, job.id, JobStatus::Review, None).await?;
        notify_review(pool, config, notifier, &job.disc_label, 0.0).await;
        return Ok(());
    };

    db::jobs::update_identification(
        pool,
        job.id,
        ContentType::Movie,
        &candidate.title,
        candidate.year,
        Some(candidate.catalog_id),
        confidence,
        candidate.poster_ref.as_deref(),
    )
    .await?;

    if confidence >= config.auto_approve_threshold {
        db::jobs::update_status(pool, job.id, JobStatus::Moving, None).await?;
        info!(
            job_id = job.id,
            title = %candidate.title,
            confidence,
            "Identification auto-approved"
        );
    } else {
        db::jobs::update_status(pool, job.id, JobStatus::Review, None).await?;
        info!(
            job_id = job.id,
            title = %candidate.title,
            confidence,
            "Identification needs review"
        );
        notify_review(pool, config, notifier, &job.disc_label, confidence).await;
    }

    Ok(())
}

/// Look up a poster (and missing catalog id) for a manual identification.
///
/// Best effort: catalog failures are logged and leave the fields untouched.
pub async fn lookup_poster(
    catalog: &dyn Catalog,
    title: &str,
    year: Option<i32>,
    catalog_id: Option<i64>,
) -> (Option<i64>, Option<String>) {
    match catalog.search_movie(title, year).await {
        Ok(results) if !results.is_empty() => {
            let resolved_id = catalog_id.or(Some(results[0].catalog_id));
            let poster = results
                .iter()
                .find(|m| Some(m.catalog_id) == resolved_id)
                .or(results.first())
                .and_then(|m| m.poster_ref.clone());
            (resolved_id, poster)
        }
        Ok(_) => (catalog_id, None),
        Err(e) => {
            warn!(title, error = %e, "Poster lookup failed");
            (catalog_id, None)
        }
    }
}

async fn notify_review(
    pool: &SqlitePool,
    config: &Config,
    notifier: &Notifier,
    disc_label: &str,
    confidence: f64,
) {
    // Alerts are suppressed outside active mode.
    if db::settings::active_mode(pool).await.unwrap_or(false) {
        notifier
            .review_needed(disc_label, confidence, &config.review_url())
            .await;
    }
}
