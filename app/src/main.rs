//! Headless notification client.
//!
//! Presentation events are written to stdout as JSON lines and commands are
//! read from stdin, so logs go to stderr.

use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    tracing::info!("Starting notification client");

    let config = notify_app_lib::init_config()?;
    notify_app_lib::run(config).await
}
