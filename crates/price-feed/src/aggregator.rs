//! Price aggregator - fans out to every source once per cycle and publishes
//! the median as the consensus price

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use parking_lot::Mutex;
use tokio::task::JoinSet;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use oracle_core::{
    ConsensusSnapshot, OracleConfig, RetryError, SourceError, SourceResult, DEFAULT_CURRENCY,
};

use crate::metrics::{MetricsSink, NoopMetrics};
use crate::retry::{retry, RetryPolicy};
use crate::sources::PriceSource;
use crate::state::PriceState;

/// Aggregator configuration
#[derive(Debug, Clone)]
pub struct AggregatorConfig {
    pub request_timeout: Duration,
    pub retry: RetryPolicy,
    pub currency: String,
}

impl Default for AggregatorConfig {
    fn default() -> Self {
        Self {
            request_timeout: Duration::from_secs(3),
            retry: RetryPolicy::default(),
            currency: DEFAULT_CURRENCY.to_string(),
        }
    }
}

impl From<&OracleConfig> for AggregatorConfig {
    fn from(config: &OracleConfig) -> Self {
        Self {
            request_timeout: config.request_timeout,
            retry: RetryPolicy::new(config.max_retries, config.retry_base_delay),
            currency: config.currency.clone(),
        }
    }
}

/// How one source ended a cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SourceOutcome {
    Contributed,
    Failed,
    Cancelled,
}

/// Summary of one completed cycle
#[derive(Debug, Clone, PartialEq)]
pub struct CycleReport {
    pub consensus: Option<f64>,
    pub sources_used: usize,
    pub failed: usize,
    pub cancelled: usize,
    pub elapsed: Duration,
}

impl CycleReport {
    pub fn is_stale(&self) -> bool {
        self.consensus.is_none()
    }
}

/// Consensus engine over a fixed set of sources
pub struct PriceAggregator {
    config: AggregatorConfig,
    sources: Vec<Arc<dyn PriceSource>>,
    state: Arc<PriceState>,
    metrics: Arc<dyn MetricsSink>,
}

impl PriceAggregator {
    pub fn new(config: AggregatorConfig, sources: Vec<Arc<dyn PriceSource>>) -> Self {
        let state = Arc::new(PriceState::new(config.currency.clone()));

        Self {
            config,
            sources,
            state,
            metrics: Arc::new(NoopMetrics),
        }
    }

    pub fn with_metrics(mut self, metrics: Arc<dyn MetricsSink>) -> Self {
        self.metrics = metrics;
        self
    }

    /// Get shared state reference
    pub fn state(&self) -> Arc<PriceState> {
        Arc::clone(&self.state)
    }

    /// Copy of the latest published snapshot
    pub fn snapshot(&self) -> ConsensusSnapshot {
        self.state.read()
    }

    pub fn source_names(&self) -> Vec<&str> {
        self.sources.iter().map(|s| s.name()).collect()
    }

    /// Run exactly one polling cycle and publish its result.
    ///
    /// Every source gets its own task and its full retry budget; the cycle
    /// waits for all of them before computing the median, so a publish
    /// always reflects a complete cycle.
    pub async fn run_cycle(&self, cancel: &CancellationToken) -> CycleReport {
        let started = Instant::now();
        let prices = Arc::new(Mutex::new(Vec::with_capacity(self.sources.len())));
        let mut tasks = JoinSet::new();
        let mut pending: Vec<String> = self
            .source_names()
            .into_iter()
            .map(String::from)
            .collect();

        for source in &self.sources {
            let source = Arc::clone(source);
            let prices = Arc::clone(&prices);
            let metrics = Arc::clone(&self.metrics);
            let cancel = cancel.clone();
            let policy = self.config.retry;
            let timeout = self.config.request_timeout;

            tasks.spawn(async move {
                let name = source.name();
                let result = retry(&policy, &cancel, |attempt| {
                    fetch_once(source.as_ref(), timeout, &cancel, attempt)
                })
                .await;

                let outcome = match result {
                    Ok(price) => {
                        metrics.record_success(name);
                        prices.lock().push(price);
                        SourceOutcome::Contributed
                    }
                    Err(RetryError::Exhausted { attempts, last }) => {
                        metrics.record_failure(name);
                        error!(source = name, attempts, error = %last, "source completely failed");
                        SourceOutcome::Failed
                    }
                    Err(RetryError::Cancelled) => {
                        info!(source = name, "source fetch cancelled");
                        SourceOutcome::Cancelled
                    }
                };

                (name.to_string(), outcome)
            });
        }

        let mut failed = 0;
        let mut cancelled = 0;
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((name, outcome)) => {
                    pending.retain(|p| *p != name);
                    match outcome {
                        SourceOutcome::Contributed => {}
                        SourceOutcome::Failed => failed += 1,
                        SourceOutcome::Cancelled => cancelled += 1,
                    }
                }
                Err(e) => error!(error = %e, "source task aborted"),
            }
        }

        // Tasks that never reported back panicked
        for name in &pending {
            self.metrics.record_failure(name);
            failed += 1;
        }

        let mut collected = std::mem::take(&mut *prices.lock());
        let sources_used = collected.len();
        let consensus = self.publish(&mut collected);

        CycleReport {
            consensus,
            sources_used,
            failed,
            cancelled,
            elapsed: started.elapsed(),
        }
    }

    fn publish(&self, prices: &mut [f64]) -> Option<f64> {
        match median(prices) {
            Some(price) => {
                let snapshot = ConsensusSnapshot::fresh(
                    price,
                    self.config.currency.as_str(),
                    prices.len(),
                    Utc::now(),
                );
                info!(price, sources_used = prices.len(), "state updated: {}", snapshot);
                self.state.publish(snapshot);
                self.metrics.record_value(price);
                Some(price)
            }
            None => {
                self.state.publish_stale();
                warn!("all sources failed, data is now stale");
                None
            }
        }
    }
}

/// One deadline-bounded attempt against a single source
async fn fetch_once(
    source: &dyn PriceSource,
    timeout: Duration,
    cancel: &CancellationToken,
    attempt: u32,
) -> SourceResult<f64> {
    let child = cancel.child_token();
    let started = Instant::now();

    let result = match tokio::time::timeout(timeout, source.fetch_price(child.clone())).await {
        Ok(result) => result.and_then(validate_price),
        Err(_elapsed) => {
            child.cancel();
            Err(SourceError::Timeout(timeout))
        }
    };

    match &result {
        Ok(price) => debug!(
            source = source.name(),
            attempt,
            price,
            latency = ?started.elapsed(),
            "fetch success"
        ),
        Err(SourceError::Cancelled) => {
            debug!(source = source.name(), attempt, "fetch interrupted by cancellation")
        }
        Err(e) => warn!(source = source.name(), attempt, error = %e, "fetch failed"),
    }

    result
}

fn validate_price(price: f64) -> SourceResult<f64> {
    if price.is_finite() && price > 0.0 {
        Ok(price)
    } else {
        Err(SourceError::InvalidPrice(price))
    }
}

/// Standard median; sorts `values` in place. `None` for an empty slice.
pub fn median(values: &mut [f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }

    values.sort_by(f64::total_cmp);
    let mid = values.len() / 2;

    if values.len() % 2 == 0 {
        Some((values[mid - 1] + values[mid]) / 2.0)
    } else {
        Some(values[mid])
    }
}
