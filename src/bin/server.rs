use anyhow::{Context, Result};
use clap::Parser;
use engram::collection::{Collection, CollectionOptions};
use engram::config::{self, CliArgs, Config};
use engram::repo::SqliteStore;
use engram::{StudySession, create_app, db};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::info;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{EnvFilter, Layer, layer::SubscriberExt, util::SubscriberInitExt};

/// Sets up console logging and, when a log directory is configured, a
/// daily-rotated log file
///
/// ### Returns
///
/// The worker guard of the file writer, if any. Buffered lines are flushed
/// when it is dropped, so it must live as long as `main`.
fn setup_logging(config: &Config, debug: bool) -> Result<Option<WorkerGuard>> {
    use tracing_subscriber::fmt;

    // Configure log level from environment variable
    let default_log_level = if debug { "debug" } else { "info,engram=debug" };
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_log_level));

    let console_layer = if config.json_logs {
        fmt::layer().json().with_target(true).boxed()
    } else {
        fmt::layer().with_target(true).with_ansi(true).boxed()
    };

    let (file_layer, guard) = match &config.log_dir {
        Some(dir) => {
            std::fs::create_dir_all(dir).with_context(|| format!("Could not create log directory {}", dir))?;
            let file_appender = tracing_appender::rolling::daily(dir, "engram.log");
            let (non_blocking_file, guard) = tracing_appender::non_blocking(file_appender);
            let layer = fmt::layer()
                .with_target(true)
                .with_thread_ids(true)
                .with_ansi(false)
                .with_writer(non_blocking_file);
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(console_layer)
        .with(file_layer)
        .with(env_filter)
        .init();

    Ok(guard)
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment variables
    dotenv::dotenv().ok();

    let args = CliArgs::parse();
    let debug = args.debug;
    let config = config::get_config(args);
    let _guard = setup_logging(&config, debug)?;

    info!("Starting engram server");
    info!(database_url = %config.database_url, log_dir = ?config.log_dir, "Using configuration");

    // Open the collection
    let pool = db::init_pool(&config.database_url)?;
    let store = SqliteStore::open(&pool)?;
    let options = CollectionOptions { scheduler: config.scheduler.clone(), ..CollectionOptions::default() };
    let col = Collection::open(store, options).context("Failed to open collection")?;
    let session = Arc::new(Mutex::new(StudySession::new(col)));

    let app = create_app(session);

    let listener = tokio::net::TcpListener::bind(&config.listen_addr)
        .await
        .with_context(|| format!("Could not bind {}", config.listen_addr))?;
    info!("Listening on {}", config.listen_addr);
    axum::serve(listener, app).await?;

    Ok(())
}
