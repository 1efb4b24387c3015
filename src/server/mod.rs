//! HTTP server support (standalone + embeddable).
//!
//! - **Standalone**: `agentdesk-server` binary calls `run()`
//! - **Embedded**: host Axum app calls `router(state)` (and may nest it)

mod http;
mod http_agents;
mod http_auth;
mod http_errors;
mod http_parse;
mod http_payments;
mod http_types;
mod state;
mod ws;

pub use http::router;
pub use state::{build_state_from_env, build_state_with_pool, AppState};

use crate::infrastructure::AppConfig;
use anyhow::Context;
use std::net::SocketAddr;
use tokio::net::TcpListener;
use tracing::info;
use tracing_subscriber::EnvFilter;

/// Standalone entrypoint for the `agentdesk-server` binary.
pub async fn run() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = AppConfig::from_env().context("load config")?;
    let state = build_state_from_env(config.clone()).await?;

    let addr: SocketAddr = format!("{}:{}", config.server_host, config.server_port)
        .parse()
        .context("parse listen address")?;
    let listener = TcpListener::bind(addr).await.context("bind listener")?;

    info!(
        host = %config.server_host,
        port = config.server_port,
        "Server running"
    );
    info!(
        docs = %format!("http://{}:{}/docs", config.server_host, config.server_port),
        "API docs"
    );

    // Peer addresses feed the per-IP auth throttle
    let app = router(state).into_make_service_with_connect_info::<SocketAddr>();
    axum::serve(listener, app).await.context("serve")?;
    Ok(())
}
