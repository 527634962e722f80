//! taiga-daemon — serves the shared-context API.
//!
//! Thin wiring only: config + logging + store + bridge router + axum serve.
//! The action loop itself is a library (`taiga-router`) embedded by the
//! orchestrator; this binary exposes the collaboration surface agents and
//! UIs talk to.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use tracing::info;

use taiga_bridge::{bead_router, BridgeState};
use taiga_context::SharedContextStore;
use taiga_core::config::Config;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    taiga_telemetry::init_logging("taiga-daemon", "info");

    let config = match config_path_from_args() {
        Some(path) => Config::load_from(&path)
            .with_context(|| format!("loading config from {path}"))?,
        None => Config::load().context("loading default config")?,
    };

    let store = Arc::new(SharedContextStore::new(
        config.context.activity_capacity,
        config.context.subscriber_buffer,
    ));
    let state = Arc::new(
        BridgeState::new(store)
            .with_keepalive(Duration::from_secs(config.context.keepalive_secs)),
    );
    let app = bead_router(state);

    let bind_addr = std::env::var("TAIGA_BIND").unwrap_or(config.daemon.bind_addr);
    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .with_context(|| format!("binding {bind_addr}"))?;
    info!(addr = %bind_addr, "shared-context API listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("serving")?;

    info!("daemon stopped");
    Ok(())
}

/// `taiga-daemon [--config <path>]`
fn config_path_from_args() -> Option<String> {
    let mut args = std::env::args().skip(1);
    while let Some(arg) = args.next() {
        if arg == "--config" {
            return args.next();
        }
    }
    None
}

async fn shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
    info!("shutdown signal received");
}
