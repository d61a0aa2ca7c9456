//! Pipeline scenarios at the store/worker seam
//!
//! The subprocess boundaries (ripper, transcoder) are exercised by seeding
//! their artifacts on disk; identification and filing run for real against a
//! stub catalog.

mod common;

use async_trait::async_trait;
use common::{advance_to, test_pool};
use ripshelf::catalog::{Catalog, MovieDetails, MovieMatch};
use ripshelf::config::Config;
use ripshelf::db;
use ripshelf::error::{Error, Result};
use ripshelf::models::{ContentType, JobStatus, PathField};
use ripshelf::notify::Notifier;
use ripshelf::services::encode_queue::EncodeWorker;
use ripshelf::services::{file_mover, identifier};
use sqlx::SqlitePool;
use tokio_util::sync::CancellationToken;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tempfile::TempDir;

struct StubCatalog {
    results: Vec<MovieMatch>,
    fail: bool,
    called: Arc<AtomicBool>,
}

impl StubCatalog {
    fn returning(results: Vec<MovieMatch>) -> Self {
        Self {
            results,
            fail: false,
            called: Arc::new(AtomicBool::new(false)),
        }
    }

    fn unavailable() -> Self {
        Self {
            results: Vec::new(),
            fail: true,
            called: Arc::new(AtomicBool::new(false)),
        }
    }

    fn was_called(&self) -> bool {
        self.called.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Catalog for StubCatalog {
    async fn search_movie(&self, _query: &str, _year: Option<i32>) -> Result<Vec<MovieMatch>> {
        self.called.store(true, Ordering::SeqCst);
        if self.fail {
            return Err(Error::Catalog("catalog token not configured".to_string()));
        }
        Ok(self.results.clone())
    }

    async fn movie_details(&self, _catalog_id: i64) -> Result<Option<MovieDetails>> {
        Ok(None)
    }
}

fn movie(catalog_id: i64, title: &str, year: i32, popularity: f64) -> MovieMatch {
    MovieMatch {
        catalog_id,
        title: title.to_string(),
        year: Some(year),
        overview: String::new(),
        poster_ref: Some("/poster.jpg".to_string()),
        popularity,
    }
}

struct Fixture {
    _workspace: TempDir,
    config: Config,
    notifier: Notifier,
}

impl Fixture {
    fn new() -> Self {
        let workspace = TempDir::new().unwrap();
        let config = Config {
            workspace_dir: workspace.path().to_path_buf(),
            movies_dir: workspace.path().join("Movies"),
            tv_dir: workspace.path().join("TV Shows"),
            ..Config::default()
        };
        config.ensure_directories().unwrap();
        std::fs::create_dir_all(&config.movies_dir).unwrap();
        std::fs::create_dir_all(&config.tv_dir).unwrap();
        Self {
            _workspace: workspace,
            config,
            notifier: Notifier::new("", ""),
        }
    }
}

/// Create a job that has been ripped and encoded, with artifacts on disk.
async fn encoded_job(pool: &SqlitePool, config: &Config, disc_label: &str) -> i64 {
    let job = db::jobs::create_job(pool, "1", disc_label).await.unwrap();

    advance_to(pool, job.id, JobStatus::Ripping).await;
    let staging = config.staging_dir().join(format!("job_{}", job.id));
    std::fs::create_dir_all(&staging).unwrap();
    let rip_path = staging.join("title_t00.mkv");
    std::fs::write(&rip_path, b"raw").unwrap();
    db::jobs::set_path(pool, job.id, PathField::Rip, &rip_path.display().to_string())
        .await
        .unwrap();
    advance_to(pool, job.id, JobStatus::Encoding).await;

    let encoding = config.encoding_dir().join(format!("job_{}", job.id));
    std::fs::create_dir_all(&encoding).unwrap();
    let encode_path = encoding.join("title_t00.mkv");
    std::fs::write(&encode_path, b"encoded").unwrap();
    db::jobs::set_path(
        pool,
        job.id,
        PathField::Encode,
        &encode_path.display().to_string(),
    )
    .await
    .unwrap();
    db::jobs::update_status(pool, job.id, JobStatus::Encoded, None)
        .await
        .unwrap();

    job.id
}

#[tokio::test]
async fn happy_path_movie_lands_in_the_library() {
    let fixture = Fixture::new();
    let pool = test_pool().await;
    let catalog = StubCatalog::returning(vec![movie(603, "The Matrix", 1999, 100.0)]);

    let job_id = encoded_job(&pool, &fixture.config, "THE_MATRIX").await;
    let staging_dir: PathBuf = fixture.config.staging_dir().join(format!("job_{job_id}"));
    let encoding_dir: PathBuf = fixture.config.encoding_dir().join(format!("job_{job_id}"));

    identifier::process_next(&pool, &fixture.config, &catalog, &fixture.notifier)
        .await
        .unwrap();

    let job = db::jobs::get_job(&pool, job_id).await.unwrap();
    assert_eq!(job.status, JobStatus::Moving);
    assert_eq!(job.identified_title.as_deref(), Some("The Matrix"));
    assert_eq!(job.identified_year, Some(1999));
    assert_eq!(job.catalog_id, Some(603));
    let confidence = job.confidence.unwrap();
    assert!(confidence >= fixture.config.auto_approve_threshold);
    assert!(confidence < 1.0);

    file_mover::process_jobs(&pool, &fixture.config, &fixture.notifier)
        .await
        .unwrap();

    let job = db::jobs::get_job(&pool, job_id).await.unwrap();
    assert_eq!(job.status, JobStatus::Complete);
    let expected = fixture
        .config
        .movies_dir
        .join("The Matrix (1999)")
        .join("The Matrix (1999).mkv");
    assert_eq!(job.final_path.as_deref(), Some(expected.to_str().unwrap()));
    assert!(expected.exists());

    let items = db::collection::list(&pool).await.unwrap();
    assert_eq!(items.len(), 1);
    assert_eq!(items[0].content_type, ContentType::Movie);
    assert_eq!(items[0].title, "The Matrix");
    assert_eq!(items[0].year, Some(1999));
    assert_eq!(items[0].catalog_id, Some(603));

    assert!(!staging_dir.exists());
    assert!(!encoding_dir.exists());
}

#[tokio::test]
async fn low_confidence_routes_to_review_and_approval_completes() {
    let fixture = Fixture::new();
    let pool = test_pool().await;
    // Nothing like the label: low similarity, low popularity.
    let catalog = StubCatalog::returning(vec![movie(777, "Unrelated Title", 1984, 5.0)]);

    let job_id = encoded_job(&pool, &fixture.config, "MYSTERY_DISC").await;

    identifier::process_next(&pool, &fixture.config, &catalog, &fixture.notifier)
        .await
        .unwrap();

    let job = db::jobs::get_job(&pool, job_id).await.unwrap();
    assert_eq!(job.status, JobStatus::Review);
    let confidence = job.confidence.unwrap();
    assert!(confidence < fixture.config.auto_approve_threshold);
    // The best guess is preserved for the review page.
    assert_eq!(job.identified_title.as_deref(), Some("Unrelated Title"));

    // Operator approves the guess.
    db::jobs::update_status(&pool, job_id, JobStatus::Moving, None)
        .await
        .unwrap();
    file_mover::process_jobs(&pool, &fixture.config, &fixture.notifier)
        .await
        .unwrap();

    let job = db::jobs::get_job(&pool, job_id).await.unwrap();
    assert_eq!(job.status, JobStatus::Complete);
    assert_eq!(job.identified_title.as_deref(), Some("Unrelated Title"));
    assert_eq!(job.confidence, Some(confidence));
}

#[tokio::test]
async fn pre_identified_jobs_skip_the_catalog() {
    let fixture = Fixture::new();
    let pool = test_pool().await;
    let catalog = StubCatalog::returning(vec![movie(999, "Wrong Movie", 1950, 100.0)]);

    let job_id = encoded_job(&pool, &fixture.config, "UNLABELED_DISC").await;
    // Operator pre-identified while the job was still encoding.
    db::jobs::update_identification(
        &pool,
        job_id,
        ContentType::Movie,
        "Dune",
        Some(2021),
        Some(438631),
        1.0,
        None,
    )
    .await
    .unwrap();

    identifier::process_next(&pool, &fixture.config, &catalog, &fixture.notifier)
        .await
        .unwrap();

    assert!(!catalog.was_called());
    let job = db::jobs::get_job(&pool, job_id).await.unwrap();
    assert_eq!(job.status, JobStatus::Moving);

    file_mover::process_jobs(&pool, &fixture.config, &fixture.notifier)
        .await
        .unwrap();

    let job = db::jobs::get_job(&pool, job_id).await.unwrap();
    assert_eq!(job.status, JobStatus::Complete);
    assert_eq!(job.identified_title.as_deref(), Some("Dune"));
    assert_eq!(job.identified_year, Some(2021));
    assert!(fixture
        .config
        .movies_dir
        .join("Dune (2021)")
        .join("Dune (2021).mkv")
        .exists());
}

#[tokio::test]
async fn partial_identification_still_consults_the_catalog() {
    // A title without full confidence is not a pre-identification.
    let fixture = Fixture::new();
    let pool = test_pool().await;
    let catalog = StubCatalog::returning(vec![movie(603, "The Matrix", 1999, 100.0)]);

    let job_id = encoded_job(&pool, &fixture.config, "THE_MATRIX").await;
    db::jobs::update_identification(
        &pool,
        job_id,
        ContentType::Movie,
        "Some Guess",
        None,
        None,
        0.4,
        None,
    )
    .await
    .unwrap();

    identifier::process_next(&pool, &fixture.config, &catalog, &fixture.notifier)
        .await
        .unwrap();

    assert!(catalog.was_called());
    let job = db::jobs::get_job(&pool, job_id).await.unwrap();
    assert_eq!(job.identified_title.as_deref(), Some("The Matrix"));
}

#[tokio::test]
async fn empty_catalog_results_route_to_review() {
    let fixture = Fixture::new();
    let pool = test_pool().await;
    let catalog = StubCatalog::returning(Vec::new());

    let job_id = encoded_job(&pool, &fixture.config, "HOME_VIDEO_2003").await;

    identifier::process_next(&pool, &fixture.config, &catalog, &fixture.notifier)
        .await
        .unwrap();

    let job = db::jobs::get_job(&pool, job_id).await.unwrap();
    assert_eq!(job.status, JobStatus::Review);
    assert!(job.identified_title.is_none());
    assert!(job.confidence.is_none());
}

#[tokio::test]
async fn catalog_outage_degrades_to_review() {
    let fixture = Fixture::new();
    let pool = test_pool().await;
    let catalog = StubCatalog::unavailable();

    let job_id = encoded_job(&pool, &fixture.config, "THE_MATRIX").await;

    identifier::process_next(&pool, &fixture.config, &catalog, &fixture.notifier)
        .await
        .unwrap();

    let job = db::jobs::get_job(&pool, job_id).await.unwrap();
    assert_eq!(job.status, JobStatus::Review);
}

#[tokio::test]
async fn encode_worker_fails_jobs_whose_rip_artifact_is_gone() {
    let fixture = Fixture::new();
    let pool = test_pool().await;

    let no_path = db::jobs::create_job(&pool, "1", "NO_PATH").await.unwrap();
    advance_to(&pool, no_path.id, JobStatus::Ripped).await;

    let worker = EncodeWorker::new(pool.clone(), Arc::new(fixture.config.clone()));
    worker.process_next(&CancellationToken::new()).await.unwrap();

    let job = db::jobs::get_job(&pool, no_path.id).await.unwrap();
    assert_eq!(job.status, JobStatus::Failed);
    assert!(job.error_message.unwrap().contains("rip path"));

    // Path recorded but the file vanished from staging.
    let stale = db::jobs::create_job(&pool, "1", "STALE").await.unwrap();
    advance_to(&pool, stale.id, JobStatus::Ripping).await;
    db::jobs::set_path(
        &pool,
        stale.id,
        PathField::Rip,
        &fixture
            .config
            .staging_dir()
            .join("job_gone/title.mkv")
            .display()
            .to_string(),
    )
    .await
    .unwrap();
    db::jobs::update_status(&pool, stale.id, JobStatus::Ripped, None)
        .await
        .unwrap();

    worker.process_next(&CancellationToken::new()).await.unwrap();

    let job = db::jobs::get_job(&pool, stale.id).await.unwrap();
    assert_eq!(job.status, JobStatus::Failed);
    assert!(job.error_message.unwrap().contains("not found"));
}

#[tokio::test]
async fn identifier_takes_one_job_per_pass_oldest_first() {
    let fixture = Fixture::new();
    let pool = test_pool().await;
    let catalog = StubCatalog::returning(vec![movie(603, "The Matrix", 1999, 100.0)]);

    let first = encoded_job(&pool, &fixture.config, "THE_MATRIX").await;
    let second = encoded_job(&pool, &fixture.config, "THE_MATRIX").await;

    identifier::process_next(&pool, &fixture.config, &catalog, &fixture.notifier)
        .await
        .unwrap();

    assert_eq!(
        db::jobs::get_job(&pool, first).await.unwrap().status,
        JobStatus::Moving
    );
    assert_eq!(
        db::jobs::get_job(&pool, second).await.unwrap().status,
        JobStatus::Encoded
    );
}
