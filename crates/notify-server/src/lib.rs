//! Notification source: accepts new events over HTTP and pushes them to
//! subscribers via Server-Sent Events, with a polling fallback endpoint.

pub mod broadcaster;
pub mod config;
pub mod routes;

use std::sync::Arc;

use anyhow::Result;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;

pub use broadcaster::EventBroadcaster;
pub use config::ServerConfig;
pub use routes::{AppState, create_router};

/// Start the axum HTTP server and run until `shutdown` is cancelled.
pub async fn start_server(config: ServerConfig, shutdown: CancellationToken) -> Result<()> {
    let state = AppState {
        broadcaster: Arc::new(EventBroadcaster::new(config.recent_capacity)),
        keepalive: config.keepalive,
        shutdown,
    };

    let addr = format!("0.0.0.0:{}", config.port);
    let listener = TcpListener::bind(&addr).await?;
    tracing::info!("Notification server listening on http://{}", addr);

    serve(listener, state).await
}

/// Serve on an already-bound listener until `state.shutdown` is cancelled.
pub async fn serve(listener: TcpListener, state: AppState) -> Result<()> {
    let shutdown = state.shutdown.clone();
    let app = create_router(state);

    axum::serve(listener, app.into_make_service())
        .with_graceful_shutdown(async move { shutdown.cancelled().await })
        .await?;

    tracing::info!("Notification server stopped");
    Ok(())
}
