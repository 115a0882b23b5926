//! Notification source binary.

use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

use notify_server::ServerConfig;

fn load_dotenv() {
    let candidates = [".env", "../.env", "../../.env"];
    for path in &candidates {
        if dotenvy::from_filename(path).is_ok() {
            tracing::info!("Loaded .env from: {path}");
            return;
        }
    }
    tracing::info!("No .env file found, using system environment variables");
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    load_dotenv();
    let config = ServerConfig::from_env();
    tracing::info!(?config, "Starting notification server");

    let shutdown = CancellationToken::new();
    let signal_token = shutdown.clone();
    tokio::spawn(async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to listen for Ctrl+C: {e}");
            return;
        }
        tracing::info!("Shutting down...");
        signal_token.cancel();
    });

    notify_server::start_server(config, shutdown).await
}
