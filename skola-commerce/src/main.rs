//! skola-commerce - commerce and settlement service
//!
//! HTTP service owning payments, bookings, coupons, entitlements,
//! teacher earnings, and payouts.

use anyhow::Result;
use tracing::info;
use tracing_subscriber::EnvFilter;

use skola_common::config::ServiceConfig;
use skola_common::events::EventBus;
use skola_commerce::{build_router, AppState};

#[tokio::main]
async fn main() -> Result<()> {
    let config = ServiceConfig::load();

    // RUST_LOG wins over the configured filter
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.log_filter.clone()));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    info!(
        "Starting skola-commerce v{}",
        env!("CARGO_PKG_VERSION")
    );
    info!("Database path: {}", config.database_path.display());

    let pool = skola_common::db::init_database(&config.database_path).await?;
    info!("Database ready");

    let event_bus = EventBus::new(100);
    let state = AppState::new(pool, event_bus);
    let app = build_router(state);

    let listener = tokio::net::TcpListener::bind(config.bind_address()).await?;
    info!("skola-commerce listening on http://{}", config.bind_address());

    axum::serve(listener, app).await?;

    Ok(())
}
