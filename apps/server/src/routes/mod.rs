//! # HTTP Routes
//!
//! Route table for the device protocol and the customer SSE feeds.

use axum::routing::{get, post};
use axum::Router;

use crate::state::SharedState;

pub mod devices;
pub mod stream;

/// Builds the application router.
pub fn router(state: SharedState) -> Router {
    Router::new()
        .route("/health", get(health))
        // Device protocol (POST JSON, token in body)
        .route("/api/devices/verify", post(devices::verify))
        .route("/api/devices/action", post(devices::action))
        .route("/api/devices/progress", post(devices::progress))
        .route("/api/devices/error", post(devices::error))
        .route("/api/devices/weight", post(devices::weight))
        .route("/api/devices/cancel/order", post(devices::cancel_order))
        .route("/api/devices/token", post(devices::token))
        // Customer SSE feeds (profile id resolved by the session layer upstream)
        .route("/api/stream/my-bar/{customer_id}", get(stream::my_bar))
        .route(
            "/api/stream/calibration/{profile_id}/{device_id}",
            get(stream::calibration),
        )
        .with_state(state)
}

/// Liveness probe.
async fn health() -> &'static str {
    "OK"
}
