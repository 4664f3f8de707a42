use clap::Parser;
use std::path::Path;
use std::sync::Arc;
use tokio::sync::{mpsc, watch};
use tokio::time::Duration;
use tracing::{error, info};
use tracing_appender::rolling;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use uptime_monitor::db::memory::InMemoryStore;
use uptime_monitor::db::services::SeaOrmStore;
use uptime_monitor::db::MonitorStore;
use uptime_monitor::engine::MonitorEngine;
use uptime_monitor::ingestion::telegram_listener::{run_chat_consumer, TelegramConnector};
use uptime_monitor::notifications::senders::webhook::HttpWebhookSender;
use uptime_monitor::probes::NetworkProber;
use uptime_monitor::scheduler::start_periodic_schedule;
use uptime_monitor::server::config::ServerConfig;
use uptime_monitor::web::create_axum_router;

/// Buffered chat messages between the update loop and the matcher.
const INBOUND_CHANNEL_CAPACITY: usize = 256;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to the configuration file
    #[arg(short, long)]
    config: Option<String>,
}

fn init_logging(log_dir: &str) {
    // JSON to a daily rotated file, human-readable to stdout
    let file_appender = rolling::daily(log_dir, "server.log");
    let file_layer = fmt::layer()
        .with_writer(file_appender)
        .with_ansi(false)
        .json();

    let stdout_layer = fmt::layer().with_writer(std::io::stdout);

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,sea_orm=warn,sqlx::query=warn"));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(file_layer)
        .with(stdout_layer)
        .init();
}

/// Creates the parent directory of a file-backed sqlite database.
fn ensure_sqlite_dir(database_url: &str) -> std::io::Result<()> {
    let Some(rest) = database_url.strip_prefix("sqlite://") else {
        return Ok(());
    };
    let file = rest.split('?').next().unwrap_or_default();
    match Path::new(file).parent() {
        Some(dir) if !dir.as_os_str().is_empty() => std::fs::create_dir_all(dir),
        _ => Ok(()),
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!(error = %e, "Failed to listen for shutdown signal.");
    }
    info!("Shutdown signal received.");
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let args = Args::parse();

    let config = ServerConfig::load(args.config.as_deref())?;
    init_logging(&config.log_dir);
    info!(listen_addr = %config.listen_addr, tick_seconds = config.tick_interval_seconds, "Starting uptime monitor.");

    let store: Arc<dyn MonitorStore> = if config.uses_memory_store() {
        info!("Using the in-memory store; nothing will be persisted.");
        Arc::new(InMemoryStore::new())
    } else {
        ensure_sqlite_dir(&config.database_url)?;
        Arc::new(SeaOrmStore::connect(&config.database_url).await?)
    };

    let (inbound_tx, inbound_rx) = mpsc::channel(INBOUND_CHANNEL_CAPACITY);
    let engine = Arc::new(MonitorEngine::new(
        store,
        Arc::new(NetworkProber::new()?),
        Arc::new(HttpWebhookSender::new()?),
        Arc::new(TelegramConnector::new(&config.telegram_api_base, inbound_tx)),
        config.max_concurrent_probes,
    ));

    if let Err(e) = engine.restore_bot(config.telegram_bot_token.as_deref()).await {
        error!(error = %e, "Failed to restore chat bot.");
    }

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let scheduler_handle = tokio::spawn(start_periodic_schedule(
        engine.clone(),
        Duration::from_secs(config.tick_interval_seconds),
        shutdown_rx,
    ));
    tokio::spawn(run_chat_consumer(engine.clone(), inbound_rx));

    let listener = tokio::net::TcpListener::bind(&config.listen_addr).await?;
    info!(addr = %config.listen_addr, "HTTP server listening.");
    axum::serve(listener, create_axum_router(engine.clone()))
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    let _ = shutdown_tx.send(true);
    if let Err(e) = scheduler_handle.await {
        error!(error = %e, "Scheduler task ended abnormally.");
    }
    engine.flush_notifications().await;
    info!("Server stopped.");
    Ok(())
}
