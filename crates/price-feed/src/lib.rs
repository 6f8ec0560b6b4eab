//! Consensus price feed
//!
//! Features:
//! - Concurrent fan-out to any number of price sources
//! - Per-request deadlines and exponential-backoff retry
//! - Median consensus with staleness tracking
//! - Lock-guarded snapshot for concurrent readers
//! - Injected metrics sink (Prometheus or no-op)

pub mod aggregator;
pub mod metrics;
pub mod poller;
pub mod retry;
pub mod sources;
pub mod state;

pub use aggregator::{median, AggregatorConfig, CycleReport, PriceAggregator};
pub use metrics::{MetricsSink, NoopMetrics, PrometheusMetrics};
pub use poller::PricePoller;
pub use retry::{retry, RetryPolicy};
pub use sources::{default_sources, http_client, PriceSource};
pub use state::{PriceState, PriceStateStats};
