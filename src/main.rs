//! ripshelf supervisor
//!
//! Startup order: configuration, workspace directories, store, startup
//! cleanup, workers, control surface. On SIGINT/SIGTERM the cancellation
//! token propagates to every worker; the encode worker checkpoints its job
//! back to ripped before exiting.

use clap::Parser;
use ripshelf::catalog::{Catalog, TmdbClient};
use ripshelf::config::Config;
use ripshelf::db;
use ripshelf::notify::Notifier;
use ripshelf::services::drive_watcher::DriveWatcher;
use ripshelf::services::encode_queue::EncodeWorker;
use ripshelf::services::file_mover::FileMover;
use ripshelf::services::identifier::IdentifierService;
use ripshelf::services::oversight;
use ripshelf::services::rip_queue::RipWorker;
use ripshelf::AppState;
use std::path::PathBuf;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Unattended optical disc ingestion pipeline
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Workspace root (overrides WORKSPACE_DIR)
    #[arg(short, long, value_name = "PATH")]
    workspace: Option<PathBuf>,

    /// Host address to bind the control surface to
    #[arg(long, value_name = "HOST")]
    host: Option<String>,

    /// Port to bind the control surface to
    #[arg(short, long, value_name = "PORT")]
    port: Option<u16>,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let log_level = if args.verbose { "debug" } else { "info" };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| format!("ripshelf={log_level}").into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("ripshelf starting...");
    info!("Version: {}", env!("CARGO_PKG_VERSION"));

    let mut config = Config::load()?;
    if let Some(workspace) = args.workspace {
        config.workspace_dir = workspace;
    }
    if let Some(host) = args.host {
        config.web_host = host;
    }
    if let Some(port) = args.port {
        config.web_port = port;
    }

    config.ensure_directories()?;
    info!("Workspace: {}", config.workspace_dir.display());

    let db_path = config.data_dir().join("ripshelf.db");
    let pool = db::init_database(&db_path).await?;
    info!("Database ready at {}", db_path.display());

    db::settings::init_active_mode(&pool, config.active_mode).await?;

    // Repair transient states before any worker accepts work.
    let report = oversight::startup_cleanup(&pool).await?;
    info!(
        reset_ripping = report.reset_ripping,
        reset_encoding = report.reset_encoding,
        reset_identifying = report.reset_identifying,
        "Startup cleanup complete"
    );

    let config = Arc::new(config);
    let catalog: Arc<dyn Catalog> = Arc::new(TmdbClient::new(config.tmdb_api_token.clone()));
    let notifier = Arc::new(Notifier::new(
        config.pushover_user_key.clone(),
        config.pushover_api_token.clone(),
    ));

    let shutdown = CancellationToken::new();
    let mut workers = Vec::new();

    for drive_id in &config.drive_ids {
        workers.push(tokio::spawn(
            DriveWatcher::new(pool.clone(), config.clone(), drive_id.clone())
                .run(shutdown.child_token()),
        ));
        workers.push(tokio::spawn(
            RipWorker::new(
                pool.clone(),
                config.clone(),
                drive_id.clone(),
                notifier.clone(),
            )
            .run(shutdown.child_token()),
        ));
    }
    workers.push(tokio::spawn(
        EncodeWorker::new(pool.clone(), config.clone()).run(shutdown.child_token()),
    ));
    workers.push(tokio::spawn(
        IdentifierService::new(
            pool.clone(),
            config.clone(),
            catalog.clone(),
            notifier.clone(),
        )
        .run(shutdown.child_token()),
    ));
    workers.push(tokio::spawn(
        FileMover::new(pool.clone(), config.clone(), notifier.clone())
            .run(shutdown.child_token()),
    ));

    let state = AppState::new(pool.clone(), config.clone(), catalog);
    let app = ripshelf::build_router(state);

    let bind_addr = format!("{}:{}", config.web_host, config.web_port);
    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    info!("Control surface listening on http://{bind_addr}");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(shutdown.clone()))
        .await?;

    // The signal handler already cancelled the token; make sure of it in
    // case the server stopped for another reason.
    shutdown.cancel();
    for worker in workers {
        let _ = worker.await;
    }

    pool.close().await;
    info!("ripshelf stopped");
    Ok(())
}

async fn shutdown_signal(shutdown: CancellationToken) {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }

    info!("Shutdown signal received");
    shutdown.cancel();
}
