//! ==============================================================================
//! main.rs - sensor dashboard hub entry point
//! ==============================================================================
//!
//! responsibilities:
//!     - load configuration (config/dashboard.toml, env overrides)
//!     - initialize logging
//!     - build the aggregator, the external feed and the push channel
//!     - optionally spawn the simulated device
//!     - serve the json api
//!
//! architecture:
//!
//!     ┌──────────────┐  POST /api/sensor-data   ┌──────────────────────────┐
//!     │ device / sim │ ───────────────────────▶ │        web server        │
//!     └──────────────┘                          │   (api.rs, port 3000)    │
//!                                               └────────────┬─────────────┘
//!     ┌──────────────┐  GET /api/dashboard, /ws              │
//!     │  dashboard   │ ◀─────────────────────────────────────┤
//!     └──────────────┘                                       │
//!                                               ┌────────────┴─────────────┐
//!                                               │  aggregator (store.rs)   │
//!                                               └────────────┬─────────────┘
//!                                                            │ fetch (bounded)
//!                                               ┌────────────┴─────────────┐
//!                                               │ external feed (feed.rs)  │
//!                                               └──────────────────────────┘
//!
//! ==============================================================================

use std::sync::Arc;

use anyhow::{Context, Result};
use tower_http::timeout::TimeoutLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use sensor_dashboard::api::{self, AppState};
use sensor_dashboard::config::{ConfigOrigin, DashboardConfig};
use sensor_dashboard::events::EventBus;
use sensor_dashboard::feed::{ExternalSource, HttpFeed, NoFeed};
use sensor_dashboard::simulator;
use sensor_dashboard::store::Aggregator;

#[tokio::main]
async fn main() -> Result<()> {
    // step 1: load configuration
    let (mut config, origin) = DashboardConfig::discover();
    config.apply_env();

    // step 2: logging (RUST_LOG wins over the config file)
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.logging.level)))
        .with(tracing_subscriber::fmt::layer())
        .init();

    match &origin {
        ConfigOrigin::File(path) => tracing::info!(path = %path.display(), "Loaded config"),
        ConfigOrigin::Invalid { path, error } => {
            tracing::warn!(path = %path.display(), error = %error, "Failed to load config, using defaults")
        }
        ConfigOrigin::Defaults => tracing::warn!("No config file found, using defaults"),
    }
    config.log_summary();

    // step 3: shared state
    let feed: Arc<dyn ExternalSource> = if config.feed.enabled {
        let timeout = std::time::Duration::from_millis(config.feed.timeout_ms);
        Arc::new(HttpFeed::new(config.feed.url.clone(), timeout).context("Failed to set up external feed")?)
    } else {
        Arc::new(NoFeed)
    };

    let mut state = AppState::new(Aggregator::new(config.aggregator_settings()), feed, EventBus::new());
    state.show_sensor_data = config.logging.show_sensor_data;

    // step 4: simulated device in background
    if config.simulator.enabled {
        tokio::spawn(simulator::run(config.simulator.clone()));
    }

    // step 5: serve
    let app = api::router(state).layer(TimeoutLayer::new(config.request_timeout()));
    let addr = config.bind_addr();
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    tracing::info!(addr = %addr, "Dashboard API listening");

    axum::serve(listener, app).await.context("Web server error")?;
    Ok(())
}
