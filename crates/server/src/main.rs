//! blog2pod-server: accepts `!blog2pod <url>` commands over HTTP.
//!
//! Settings come from the environment (see `blog2pod_core::config`), plus
//! `BLOG2POD_BIND` for the listen address (default `127.0.0.1:8080`).

use anyhow::{Context, Result};
use blog2pod_core::{Blog2Pod, Blog2PodConfig};
use blog2pod_server::{AppState, build_router};
use tracing::info;

const DEFAULT_BIND: &str = "127.0.0.1:8080";

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info,tower_http=debug")),
        )
        .init();

    info!("Starting blog2pod-server v{}", env!("CARGO_PKG_VERSION"));

    let config = Blog2PodConfig::from_env().context("Failed to load configuration from the environment")?;
    info!(
        completed_dir = %config.pipeline.completed_dir.display(),
        render = config.fetch.browser.is_some(),
        cleaning = config.chat.is_some(),
        "configuration loaded"
    );
    let pipeline = Blog2Pod::new(config).context("Failed to initialize service clients")?;

    let bind = std::env::var("BLOG2POD_BIND").unwrap_or_else(|_| DEFAULT_BIND.to_string());
    let listener = tokio::net::TcpListener::bind(&bind)
        .await
        .with_context(|| format!("Failed to bind {}", bind))?;
    info!("Listening on http://{}", listener.local_addr()?);

    axum::serve(listener, build_router(AppState::new(pipeline)))
        .with_graceful_shutdown(async {
            tokio::signal::ctrl_c().await.ok();
            info!("Shutting down");
        })
        .await
        .context("Server error")?;

    Ok(())
}
