//! HTTP read side for the price oracle
//!
//! Serves the latest consensus snapshot, a health probe and Prometheus metrics

pub mod server;
pub mod service;

pub use server::{ApiServer, ApiServerBuilder, ApiServerConfig};
pub use service::{create_router, AppState};
