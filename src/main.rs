//! ClassDesk · teacher dashboard backend
//!
//! - Axum HTTP API under /api/v1
//! - Remote REST tables with a local JSON cache fallback
//! - Static SPA fallback (./static/index.html)
//!
//! Important env variables:
//!   PORT                   : u16 (default 3000)
//!   CLASSDESK_CONFIG_PATH  : path to TOML config
//!   REMOTE_URL             : base URL of the hosted REST tables
//!   REMOTE_API_KEY         : anon/service key sent with every remote call
//!   DATA_DIR               : directory for the local JSON cache (memory if unset)
//!   LOG_LEVEL              : tracing filter, e.g. "debug" or full directives
//!   LOG_FORMAT             : "pretty" (default) or "json"

use std::{net::SocketAddr, sync::Arc, time::Duration};

use tokio::net::TcpListener;
use tracing::{info, instrument};

use classdesk::routes::build_router;
use classdesk::state::AppState;
use classdesk::telemetry;

const CLOCK_INTERVAL: Duration = Duration::from_secs(1);

/// Drives runner timers and notification expiry.
fn spawn_clock(state: Arc<AppState>) {
  tokio::spawn(async move {
    let mut interval = tokio::time::interval(CLOCK_INTERVAL);
    interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
    // The first tick completes immediately.
    interval.tick().await;
    loop {
      interval.tick().await;
      state.tick(CLOCK_INTERVAL).await;
    }
  });
}

async fn shutdown_signal() {
  if let Err(e) = tokio::signal::ctrl_c().await {
    tracing::error!(target: "classdesk", error = %e, "Cannot listen for shutdown signal");
    std::future::pending::<()>().await;
  }
  info!(target: "classdesk", "Shutdown signal received");
}

#[instrument(level = "info", skip_all)]
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
  telemetry::init_tracing();

  // Config, local cache, remote client, per-entity collections.
  let state = Arc::new(AppState::new());
  spawn_clock(state.clone());

  let app = build_router(state.clone());

  let addr: SocketAddr = std::env::var("PORT")
    .ok()
    .and_then(|p| p.parse::<u16>().ok())
    .map(|port| SocketAddr::from(([0, 0, 0, 0], port)))
    .unwrap_or_else(|| SocketAddr::from(([0, 0, 0, 0], 3000)));

  let listener = TcpListener::bind(addr).await?;
  info!(target: "classdesk", %addr, "HTTP server listening");
  axum::serve(listener, app).with_graceful_shutdown(shutdown_signal()).await?;
  Ok(())
}
