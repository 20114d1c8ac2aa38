use axum::{http::StatusCode, routing::get, Router};
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{info, warn};
use tracing_subscriber::FmtSubscriber;

mod backends;
mod config;
mod grid;
mod hypervisors;
mod numa;
mod palette;
mod stats;
mod topology;

use backends::{ComputeApi, ContainerApi, HttpCompute, HttpContainer};
use config::DashboardConfig;

// -----------------------------------------------------------------------------
// Shared state
// -----------------------------------------------------------------------------

/// Backend clients shared by all handlers. Nothing computed per request is kept.
pub struct AppState {
    pub compute: Arc<dyn ComputeApi>,
    pub container: Arc<dyn ContainerApi>,
}

pub type SharedState = Arc<AppState>;

// -----------------------------------------------------------------------------
// Main entry
// -----------------------------------------------------------------------------

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cfg = DashboardConfig::from_env()?;

    let subscriber = FmtSubscriber::builder()
        .with_max_level(cfg.log_level)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    if cfg.compute_url.is_none() {
        warn!("HVDASH_COMPUTE_URL not set; hypervisor data will be unavailable");
    }
    if cfg.container_url.is_none() {
        warn!("HVDASH_CONTAINER_URL not set; container host data will be unavailable");
    }

    let state: SharedState = Arc::new(AppState {
        compute: Arc::new(HttpCompute::new(&cfg)?),
        container: Arc::new(HttpContainer::new(&cfg)?),
    });

    let app = router(state);

    info!("hypervisor dashboard listening on {}", cfg.listen);
    let listener = TcpListener::bind(cfg.listen).await?;

    axum::serve(listener, app.into_make_service()).await?;

    Ok(())
}

/// API routes consumed by the admin hypervisor pages.
pub fn router(state: SharedState) -> Router {
    Router::new()
        .route("/healthz", get(healthz))
        .route("/api/hypervisors/stats", get(hypervisors::stats))
        .route("/api/hypervisors/:hypervisor/servers", get(hypervisors::servers))
        .route("/api/hypervisors/:hypervisor/numa", get(hypervisors::numa))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

async fn healthz() -> StatusCode {
    StatusCode::NO_CONTENT
}
