//! HTTP handlers for the read side
//!
//! - `GET /price`: latest snapshot as JSON
//! - `GET /health`: 200 while fresh, 503 while stale
//! - `GET /metrics`: Prometheus text exposition

use std::sync::Arc;

use axum::extract::State;
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Json, Response};
use axum::routing::get;
use axum::Router;
use tracing::error;

use oracle_core::ConsensusSnapshot;
use oracle_price_feed::{PriceState, PrometheusMetrics};

/// Shared application state for axum handlers
#[derive(Clone)]
pub struct AppState {
    prices: Arc<PriceState>,
    metrics: Arc<PrometheusMetrics>,
}

impl AppState {
    pub fn new(prices: Arc<PriceState>, metrics: Arc<PrometheusMetrics>) -> Self {
        Self { prices, metrics }
    }

    pub fn snapshot(&self) -> ConsensusSnapshot {
        self.prices.read()
    }
}

/// Create the axum router
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/price", get(get_price))
        .route("/health", get(health))
        .route("/metrics", get(metrics))
        .with_state(state)
}

async fn get_price(State(state): State<AppState>) -> Json<ConsensusSnapshot> {
    Json(state.snapshot())
}

async fn health(State(state): State<AppState>) -> (StatusCode, &'static str) {
    if state.snapshot().is_fresh() {
        (StatusCode::OK, "OK")
    } else {
        (StatusCode::SERVICE_UNAVAILABLE, "All sources failing")
    }
}

async fn metrics(State(state): State<AppState>) -> Response {
    match state.metrics.encode() {
        Ok(body) => ([(header::CONTENT_TYPE, prometheus::TEXT_FORMAT)], body).into_response(),
        Err(e) => {
            error!(error = %e, "failed to encode metrics");
            (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()).into_response()
        }
    }
}
