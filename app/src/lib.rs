pub mod app;
pub mod bridge;
pub mod channel;
pub mod config;
pub mod events;
pub mod ingest;
pub mod notification;
pub mod shutdown;
pub mod supervisor;

use std::sync::Arc;

use notify_client::NotifyClient;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use app::SharedState;
use channel::SseChannel;
use config::{AppConfig, SettingsManager};

const DELIVERY_CAPACITY: usize = 100;

/// Load .env from multiple candidate paths.
pub fn load_dotenv() {
    let candidates = [".env", "../.env", "../../.env"];
    for path in &candidates {
        if dotenvy::from_filename(path).is_ok() {
            tracing::info!("Loaded .env from: {path}");
            return;
        }
    }
    tracing::info!("No .env file found, using system environment variables");
}

/// Load settings from the environment and build the runtime config.
pub fn init_config() -> Result<AppConfig, anyhow::Error> {
    load_dotenv();

    let sm = SettingsManager::from_env();
    let overridden = sm.overridden_keys();
    if !overridden.is_empty() {
        tracing::info!("Settings from environment: {overridden:?}");
    }

    let config = AppConfig::load(&sm)?;
    tracing::info!(
        server_url = %config.server_url,
        auto_connect = config.auto_connect,
        "Settings loaded"
    );
    Ok(config)
}

/// Run the client until Ctrl+C or end of command input.
pub async fn run(config: AppConfig) -> Result<(), anyhow::Error> {
    let shutdown = CancellationToken::new();

    let client = NotifyClient::new(&config.server_url, config.http_connect_timeout)?;
    let (delivery_tx, delivery_rx) = mpsc::channel(DELIVERY_CAPACITY);
    let channel = Arc::new(SseChannel::new(client, delivery_tx, shutdown.clone()));

    let (queue, queue_task) = notification::spawn(config.queue_timings(), shutdown.clone());
    let (supervisor, supervisor_task) =
        supervisor::spawn(channel, config.supervisor_timings(), shutdown.clone());

    let state = SharedState::new(config, supervisor.clone(), queue.clone(), shutdown.clone());

    tokio::spawn(ingest::run(
        delivery_rx,
        queue,
        supervisor.clone(),
        shutdown.clone(),
    ));

    let writer_stop = CancellationToken::new();
    let s = state.clone();
    let stop = writer_stop.clone();
    let writer = tokio::spawn(async move { bridge::write_stdout_events(s, stop).await });

    let s = state.clone();
    tokio::spawn(async move { bridge::forward_display_changes(s).await });

    let s = state.clone();
    let connection_events =
        tokio::spawn(async move { bridge::forward_connection_state(s).await });

    let s = state.clone();
    tokio::spawn(async move { bridge::read_stdin_commands(s).await });

    if state.config().auto_connect {
        supervisor.connect().await?;
    } else {
        tracing::info!("Auto-connect disabled, waiting for a connect command");
    }

    tracing::info!("Notification client running. Press Ctrl+C to stop.");
    tokio::select! {
        result = tokio::signal::ctrl_c() => {
            if let Err(e) = result {
                tracing::error!(error = %e, "Failed to listen for Ctrl+C");
            }
            tracing::info!("Shutting down...");
        }
        _ = shutdown.cancelled() => {}
    }

    let tasks = shutdown::BackgroundTasks {
        supervisor: supervisor_task,
        queue: queue_task,
        connection_events,
        writer,
        writer_stop,
    };
    shutdown::graceful_shutdown(&state, tasks).await;
    Ok(())
}
