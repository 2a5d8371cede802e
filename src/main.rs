//! Codelab · Experiment Progress Backend
//!
//! - Axum HTTP + WebSocket API
//! - In-memory experiment repository and progress store
//! - Static SPA fallback (./static/index.html)
//!
//! Important env variables:
//!   PORT            : u16 (default 3000)
//!   LAB_CONFIG_PATH : path to TOML config (session tuning + optional experiment bank)
//!   LOG_LEVEL       : tracing filter, e.g. "debug" or full directives
//!   LOG_FORMAT      : "pretty" (default) or "json"

use std::{net::SocketAddr, sync::Arc};
use tokio::net::TcpListener;
use tracing::{info, warn};

use codelab_backend::routes::build_router;
use codelab_backend::state::AppState;
use codelab_backend::telemetry;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
  telemetry::init_tracing();

  let state = Arc::new(AppState::new());
  let app = build_router(state.clone());

  let addr: SocketAddr = std::env::var("PORT")
    .ok()
    .and_then(|p| p.parse::<u16>().ok())
    .map(|port| SocketAddr::from(([0, 0, 0, 0], port)))
    .unwrap_or_else(|| SocketAddr::from(([0, 0, 0, 0], 3000)));

  let listener = TcpListener::bind(addr).await?;
  info!(target: "codelab_backend", %addr, debounce_ms = state.settings.debounce.as_millis() as u64, "HTTP server listening");
  axum::serve(listener, app)
    .with_graceful_shutdown(shutdown_signal())
    .await?;
  Ok(())
}

async fn shutdown_signal() {
  if let Err(e) = tokio::signal::ctrl_c().await {
    warn!(target: "codelab_backend", error = %e, "Could not listen for ctrl-c; serving until killed");
    std::future::pending::<()>().await;
  }
  info!(target: "codelab_backend", "Shutdown requested, draining connections");
}
