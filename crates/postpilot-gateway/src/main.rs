use clap::Parser;
use postpilot_core::{config::PostpilotConfig, Platform};
use postpilot_notify::{ConnectionRegistry, NotificationStore, Notifier};
use postpilot_scheduler::{
    Executor, ImageGenerator, MediaPreparer, MediaUploader, PostStore, PreAlertNotifier,
    Publishers, SchedulerControl, SchedulerEngine, UnsupportedVideoGenerator,
};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{error, info, warn};

mod app;
mod auth;
mod collab;
mod http;
mod ws;

use collab::{
    cloudinary::CloudinaryUploader, facebook::FacebookPublisher, instagram::InstagramPublisher,
    stability::StabilityImageGenerator, Unconfigured,
};

#[derive(Parser)]
#[command(name = "postpilot-gateway", version, about = "Post scheduler and live notification gateway")]
struct Cli {
    /// Path to postpilot.toml.
    #[arg(long)]
    config: Option<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "postpilot_gateway=info,postpilot_scheduler=info,postpilot_notify=info,tower_http=debug"
                    .into()
            }),
        )
        .init();

    // load config: --config > POSTPILOT_CONFIG env > ~/.postpilot/postpilot.toml
    let cli = Cli::parse();
    let config_path = cli.config.or_else(|| std::env::var("POSTPILOT_CONFIG").ok());
    let config = PostpilotConfig::load(config_path.as_deref()).unwrap_or_else(|e| {
        warn!("Config load failed ({}), using defaults", e);
        PostpilotConfig::default()
    });

    // one SQLite file shared by all subsystems
    let db_path = config.database.path.clone();
    ensure_parent_dir(&db_path);
    info!(path = %db_path, "opening SQLite database");

    let db = rusqlite::Connection::open(&db_path)?;
    db.execute_batch("PRAGMA journal_mode=WAL; PRAGMA foreign_keys=ON;")?;
    postpilot_notify::db::init_db(&db)?;
    postpilot_scheduler::db::init_db(&db)?;
    info!("database migrations complete");

    // each subsystem gets its own connection
    let notifications = Arc::new(NotificationStore::new(rusqlite::Connection::open(&db_path)?)?);
    let posts = Arc::new(PostStore::new(rusqlite::Connection::open(&db_path)?)?);
    let registry = Arc::new(ConnectionRegistry::new());
    let notifier = Notifier::new(Arc::clone(&notifications), Arc::clone(&registry));

    let engine = build_engine(&config, posts, notifier);
    let (control, shutdown_rx) = SchedulerControl::new();
    let engine_task = tokio::spawn(engine.run(shutdown_rx));

    tokio::spawn(retention_loop(
        Arc::clone(&notifications),
        config.notifications.retention_days,
        config.notifications.cleanup_interval_hours,
        control.subscribe(),
    ));

    let addr: SocketAddr = format!("{}:{}", config.gateway.bind, config.gateway.port).parse()?;
    let state = Arc::new(app::AppState::new(config, notifications, registry));
    let router = app::build_router(state);

    info!("Postpilot gateway listening on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    // let the tick in progress finish
    control.stop();
    join_engine(engine_task).await;
    info!("Postpilot gateway stopped");
    Ok(())
}

/// Wire the scheduler to the configured collaborators.
fn build_engine(config: &PostpilotConfig, posts: Arc<PostStore>, notifier: Notifier) -> SchedulerEngine {
    let images: Box<dyn ImageGenerator> = match config.stability.clone() {
        Some(cfg) => {
            info!(engine = %cfg.engine, "image generation: Stability");
            Box::new(StabilityImageGenerator::new(cfg))
        }
        None => {
            warn!("[stability] not configured; posts without images will fail");
            Box::new(Unconfigured("image generation"))
        }
    };
    let uploader: Box<dyn MediaUploader> = match config.cloudinary.clone() {
        Some(cfg) => {
            info!(cloud = %cfg.cloud_name, "media host: Cloudinary");
            Box::new(CloudinaryUploader::new(cfg))
        }
        None => {
            warn!("[cloudinary] not configured; generated and inline images cannot be hosted");
            Box::new(Unconfigured("media upload"))
        }
    };
    let media = MediaPreparer::new(images, Box::new(UnsupportedVideoGenerator), uploader);

    let publishers = Publishers::new()
        .with(
            Platform::Instagram,
            Arc::new(InstagramPublisher::new(&config.instagram.graph_base_url)),
        )
        .with(
            Platform::Facebook,
            Arc::new(FacebookPublisher::new(&config.facebook.graph_base_url)),
        );

    info!(
        publishers = ?publishers.platforms().collect::<Vec<_>>(),
        "platform publishers registered"
    );

    let prealert = PreAlertNotifier::new(Arc::clone(&posts), notifier.clone(), &config.scheduler);
    let executor = Executor::new(
        posts,
        notifier,
        media,
        publishers,
        config.scheduler.platforms.clone(),
    );
    info!(
        tick_secs = config.scheduler.tick_secs,
        platforms = ?config.scheduler.platforms,
        "scheduler configured"
    );
    SchedulerEngine::new(prealert, executor, config.scheduler.tick_secs)
}

/// Delete old notifications every `interval_hours` until shutdown.
async fn retention_loop(
    store: Arc<NotificationStore>,
    retention_days: i64,
    interval_hours: u64,
    mut shutdown: watch::Receiver<bool>,
) {
    let mut interval = tokio::time::interval(Duration::from_secs(interval_hours.max(1) * 3600));
    loop {
        tokio::select! {
            _ = interval.tick() => {
                if let Err(e) = store.cleanup_older_than(retention_days) {
                    warn!("notification cleanup failed: {e}");
                }
            }
            changed = shutdown.changed() => {
                if changed.is_err() || *shutdown.borrow() {
                    break;
                }
            }
        }
    }
}

/// Wait for the engine task; a panic or cancellation is logged. Returns
/// whether it exited cleanly.
async fn join_engine(task: tokio::task::JoinHandle<()>) -> bool {
    match task.await {
        Ok(()) => true,
        Err(e) => {
            error!("scheduler engine task failed: {e}");
            false
        }
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("failed to listen for ctrl-c: {e}");
        std::future::pending::<()>().await;
    }
    info!("shutdown requested");
}

/// Ensure the parent directory for a file path exists.
fn ensure_parent_dir(path: &str) {
    if let Some(parent) = std::path::Path::new(path).parent() {
        let _ = std::fs::create_dir_all(parent);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn engine_panic_is_reported() {
        let task = tokio::spawn(async { panic!("tick exploded") });
        assert!(!join_engine(task).await);
    }

    #[tokio::test]
    async fn clean_engine_exit() {
        assert!(join_engine(tokio::spawn(async {})).await);
    }
}
