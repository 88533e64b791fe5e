//! REST API and WebSocket server for the telemetry hub
//!
//! Thin glue over the core's query surface plus the WebSocket entry point
//! for viewer sessions. Everything here is swappable; the design lives in
//! the hub, registry and pipeline.
//!
//! ## Endpoints
//!
//! - `GET /api/v1/health` - Health check
//! - `GET /api/v1/stats` - Realtime overview
//! - `GET /api/v1/devices` - All device statuses
//! - `GET /api/v1/devices/{id}` - One device status
//! - `GET /api/v1/readings/latest` - Most recent readings
//! - `GET /api/v1/readings` - Readings within a time range
//! - `WS /api/v1/stream` - Live reading/alert stream

pub mod error;
pub mod routes;
pub mod state;
pub mod websocket;

pub use error::{ApiError, ApiResult};
pub use state::ApiState;

use std::net::SocketAddr;

use axum::{Router, routing::get};
use tracing::info;

use crate::config::ApiConfig;

/// Spawn the API server in a background task and return the bound address.
pub async fn spawn_api_server(config: ApiConfig, state: ApiState) -> anyhow::Result<SocketAddr> {
    use tower_http::cors::{Any, CorsLayer};
    use tower_http::trace::TraceLayer;

    info!("starting API server on {}", config.bind_addr);

    let mut app = Router::new()
        .route("/api/v1/health", get(routes::health_check))
        .route("/api/v1/stats", get(routes::get_stats))
        .route("/api/v1/devices", get(routes::list_devices))
        .route("/api/v1/devices/:id", get(routes::get_device))
        .route("/api/v1/readings/latest", get(routes::latest_readings))
        .route("/api/v1/readings", get(routes::readings_range))
        .route("/api/v1/stream", get(websocket::websocket_handler))
        .with_state(state)
        .layer(TraceLayer::new_for_http());

    if config.enable_cors {
        let cors = CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any);
        app = app.layer(cors);
    }

    let listener = tokio::net::TcpListener::bind(config.bind_addr).await?;
    let addr = listener.local_addr()?;

    info!("API server listening on {}", addr);

    tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, app).await {
            tracing::error!("API server error: {}", e);
        }
    });

    Ok(addr)
}
