use std::{net::SocketAddr, sync::Arc};

use axum::Router;
use configs::AppConfig;
use models::counter::CounterId;
use service::{retry::RetryPolicy, runtime, CounterService};
use tower_http::cors::CorsLayer;
use tracing::{info, warn};

use crate::errors::StartupError;
use crate::observability;
use crate::routes::{self, AppState};

fn build_cors() -> CorsLayer {
    CorsLayer::very_permissive()
}

/// Build handler state. The store client is created here, once; if it cannot
/// be created the state still builds and every request reports it.
pub async fn build_state(cfg: &AppConfig) -> Result<AppState, StartupError> {
    let counter_id = CounterId::new(cfg.store.counter_id.clone())
        .map_err(|e| StartupError::InvalidConfig(e.to_string()))?;
    let store = runtime::connect_store(&cfg.store).await;
    if !store.is_ready() {
        warn!("starting without a document store; increments will fail until settings are fixed");
    }
    let counter = CounterService::new(store, RetryPolicy::from_config(&cfg.retry));
    Ok(AppState { counter: Arc::new(counter), counter_id })
}

pub async fn build_app(cfg: &AppConfig) -> Result<Router, StartupError> {
    let state = build_state(cfg).await?;
    Ok(routes::build_router(state, build_cors()))
}

fn bind_addr(cfg: &AppConfig) -> anyhow::Result<SocketAddr> {
    Ok(format!("{}:{}", cfg.server.host, cfg.server.port).parse()?)
}

/// Build the app from a loaded configuration and serve until the listener fails.
pub async fn run_with_config(cfg: AppConfig) -> anyhow::Result<()> {
    observability::init_metrics();
    let app = build_app(&cfg).await?;

    let addr = bind_addr(&cfg)?;
    info!(%addr, counter_id = %cfg.store.counter_id, "starting visit counter server");
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}
