//! File mover behavior against a real (temporary) filesystem

mod common;

use common::{advance_to, test_pool};
use ripshelf::config::Config;
use ripshelf::db;
use ripshelf::models::{ContentType, JobStatus, PathField};
use ripshelf::notify::Notifier;
use ripshelf::services::file_mover;
use sqlx::SqlitePool;
use std::path::PathBuf;
use tempfile::TempDir;

struct Fixture {
    _workspace: TempDir,
    config: Config,
}

impl Fixture {
    fn new() -> Self {
        let workspace = TempDir::new().unwrap();
        let config = Config {
            workspace_dir: workspace.path().to_path_buf(),
            movies_dir: workspace.path().join("library").join("Movies"),
            tv_dir: workspace.path().join("library").join("TV Shows"),
            ..Config::default()
        };
        config.ensure_directories().unwrap();
        Self {
            _workspace: workspace,
            config,
        }
    }

    fn mount_library(&self) {
        std::fs::create_dir_all(&self.config.movies_dir).unwrap();
        std::fs::create_dir_all(&self.config.tv_dir).unwrap();
    }
}

/// Create a job in moving status with real staging artifacts on disk.
async fn moving_job(
    pool: &SqlitePool,
    config: &Config,
    title: &str,
    year: Option<i32>,
    content_type: ContentType,
) -> (i64, PathBuf, PathBuf) {
    let job = db::jobs::create_job(pool, "1", "SOME_DISC").await.unwrap();

    let staging = config.staging_dir().join(format!("job_{}", job.id));
    std::fs::create_dir_all(&staging).unwrap();
    let rip_path = staging.join("title_t00.mkv");
    std::fs::write(&rip_path, b"raw rip").unwrap();

    let encoding = config.encoding_dir().join(format!("job_{}", job.id));
    std::fs::create_dir_all(&encoding).unwrap();
    let encode_path = encoding.join("title_t00.mkv");
    std::fs::write(&encode_path, b"encoded movie").unwrap();

    db::jobs::set_path(pool, job.id, PathField::Rip, &rip_path.display().to_string())
        .await
        .unwrap();
    db::jobs::set_path(
        pool,
        job.id,
        PathField::Encode,
        &encode_path.display().to_string(),
    )
    .await
    .unwrap();
    db::jobs::update_identification(pool, job.id, content_type, title, year, Some(603), 1.0, None)
        .await
        .unwrap();
    advance_to(pool, job.id, JobStatus::Moving).await;

    (job.id, rip_path, encode_path)
}

fn silent_notifier() -> Notifier {
    Notifier::new("", "")
}

#[tokio::test]
async fn missing_library_root_defers_without_failing() {
    let fixture = Fixture::new();
    let pool = test_pool().await;
    let (job_id, _, encode_path) = moving_job(
        &pool,
        &fixture.config,
        "The Matrix",
        Some(1999),
        ContentType::Movie,
    )
    .await;

    // Several passes with the library unmounted: nothing changes.
    for _ in 0..3 {
        file_mover::process_jobs(&pool, &fixture.config, &silent_notifier())
            .await
            .unwrap();
        let job = db::jobs::get_job(&pool, job_id).await.unwrap();
        assert_eq!(job.status, JobStatus::Moving);
        assert!(job.final_path.is_none());
    }
    assert!(encode_path.exists());

    // The volume comes back; the next pass delivers.
    fixture.mount_library();
    file_mover::process_jobs(&pool, &fixture.config, &silent_notifier())
        .await
        .unwrap();

    let job = db::jobs::get_job(&pool, job_id).await.unwrap();
    assert_eq!(job.status, JobStatus::Complete);
}

#[tokio::test]
async fn successful_move_files_records_and_cleans_up() {
    let fixture = Fixture::new();
    fixture.mount_library();
    let pool = test_pool().await;
    let (job_id, rip_path, encode_path) = moving_job(
        &pool,
        &fixture.config,
        "The Matrix",
        Some(1999),
        ContentType::Movie,
    )
    .await;

    file_mover::process_jobs(&pool, &fixture.config, &silent_notifier())
        .await
        .unwrap();

    let expected = fixture
        .config
        .movies_dir
        .join("The Matrix (1999)")
        .join("The Matrix (1999).mkv");
    assert!(expected.exists());

    let job = db::jobs::get_job(&pool, job_id).await.unwrap();
    assert_eq!(job.status, JobStatus::Complete);
    assert_eq!(job.final_path.as_deref(), Some(expected.to_str().unwrap()));

    let items = db::collection::list(&pool).await.unwrap();
    assert_eq!(items.len(), 1);
    assert_eq!(items[0].title, "The Matrix");
    assert_eq!(items[0].year, Some(1999));
    assert_eq!(items[0].content_type, ContentType::Movie);
    assert_eq!(items[0].catalog_id, Some(603));
    assert_eq!(items[0].file_path, expected.display().to_string());

    // Per-job staging directories are gone.
    assert!(!rip_path.parent().unwrap().exists());
    assert!(!encode_path.parent().unwrap().exists());
}

#[tokio::test]
async fn filenames_are_sanitized_on_the_way_in() {
    let fixture = Fixture::new();
    fixture.mount_library();
    let pool = test_pool().await;
    let (job_id, _, _) = moving_job(
        &pool,
        &fixture.config,
        "What/If: Part?2",
        Some(2020),
        ContentType::Movie,
    )
    .await;

    file_mover::process_jobs(&pool, &fixture.config, &silent_notifier())
        .await
        .unwrap();

    let expected = fixture
        .config
        .movies_dir
        .join("WhatIf Part2 (2020)")
        .join("WhatIf Part2 (2020).mkv");
    assert!(expected.exists());
    assert_eq!(
        db::jobs::get_job(&pool, job_id).await.unwrap().status,
        JobStatus::Complete
    );
}

#[tokio::test]
async fn tv_season_jobs_use_episode_layout() {
    let fixture = Fixture::new();
    fixture.mount_library();
    let pool = test_pool().await;
    let (job_id, _, _) = moving_job(
        &pool,
        &fixture.config,
        "Breaking Bad",
        Some(2011),
        ContentType::TvSeason,
    )
    .await;

    file_mover::process_jobs(&pool, &fixture.config, &silent_notifier())
        .await
        .unwrap();

    let expected = fixture
        .config
        .tv_dir
        .join("Breaking Bad")
        .join("Season 01")
        .join("Breaking Bad - S01E01.mkv");
    assert!(expected.exists());
    assert_eq!(
        db::jobs::get_job(&pool, job_id).await.unwrap().status,
        JobStatus::Complete
    );
}

#[tokio::test]
async fn missing_encoded_file_fails_the_job() {
    let fixture = Fixture::new();
    fixture.mount_library();
    let pool = test_pool().await;
    let (job_id, _, encode_path) = moving_job(
        &pool,
        &fixture.config,
        "The Matrix",
        Some(1999),
        ContentType::Movie,
    )
    .await;
    std::fs::remove_file(&encode_path).unwrap();

    file_mover::process_jobs(&pool, &fixture.config, &silent_notifier())
        .await
        .unwrap();

    let job = db::jobs::get_job(&pool, job_id).await.unwrap();
    assert_eq!(job.status, JobStatus::Failed);
    assert!(job.error_message.unwrap().contains("not found"));
}

#[tokio::test]
async fn unidentified_job_fails_instead_of_moving() {
    let fixture = Fixture::new();
    fixture.mount_library();
    let pool = test_pool().await;

    let job = db::jobs::create_job(&pool, "1", "DISC").await.unwrap();
    let encoding = fixture.config.encoding_dir().join(format!("job_{}", job.id));
    std::fs::create_dir_all(&encoding).unwrap();
    let encode_path = encoding.join("out.mkv");
    std::fs::write(&encode_path, b"encoded").unwrap();
    db::jobs::set_path(
        &pool,
        job.id,
        PathField::Encode,
        &encode_path.display().to_string(),
    )
    .await
    .unwrap();
    advance_to(&pool, job.id, JobStatus::Moving).await;

    file_mover::process_jobs(&pool, &fixture.config, &silent_notifier())
        .await
        .unwrap();

    let job = db::jobs::get_job(&pool, job.id).await.unwrap();
    assert_eq!(job.status, JobStatus::Failed);
    assert!(job.error_message.unwrap().contains("title"));
}

#[tokio::test]
async fn delivered_file_survives_cleanup_failures() {
    // Rip path pointing at a directory that is already gone: cleanup logs
    // and the job still completes.
    let fixture = Fixture::new();
    fixture.mount_library();
    let pool = test_pool().await;
    let (job_id, rip_path, _) = moving_job(
        &pool,
        &fixture.config,
        "The Matrix",
        Some(1999),
        ContentType::Movie,
    )
    .await;
    std::fs::remove_dir_all(rip_path.parent().unwrap()).unwrap();

    file_mover::process_jobs(&pool, &fixture.config, &silent_notifier())
        .await
        .unwrap();

    assert_eq!(
        db::jobs::get_job(&pool, job_id).await.unwrap().status,
        JobStatus::Complete
    );
}

#[tokio::test]
async fn extension_follows_the_encoded_artifact() {
    let fixture = Fixture::new();
    fixture.mount_library();
    let pool = test_pool().await;

    let job = db::jobs::create_job(&pool, "1", "DISC").await.unwrap();
    let encoding = fixture.config.encoding_dir().join(format!("job_{}", job.id));
    std::fs::create_dir_all(&encoding).unwrap();
    let encode_path = encoding.join("out.m4v");
    std::fs::write(&encode_path, b"encoded").unwrap();
    db::jobs::set_path(
        &pool,
        job.id,
        PathField::Encode,
        &encode_path.display().to_string(),
    )
    .await
    .unwrap();
    db::jobs::update_identification(
        &pool,
        job.id,
        ContentType::Movie,
        "Up",
        Some(2009),
        None,
        1.0,
        None,
    )
    .await
    .unwrap();
    advance_to(&pool, job.id, JobStatus::Moving).await;

    file_mover::process_jobs(&pool, &fixture.config, &silent_notifier())
        .await
        .unwrap();

    assert!(fixture
        .config
        .movies_dir
        .join("Up (2009)")
        .join("Up (2009).m4v")
        .exists());
}
