//! Fixed-interval driver for the aggregator
//!
//! One cycle runs immediately on start so readers do not wait a full
//! interval for the first price. After that a cycle runs per tick, awaited
//! inline, so cycles never overlap.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::aggregator::{CycleReport, PriceAggregator};

pub struct PricePoller {
    aggregator: Arc<PriceAggregator>,
    interval: Duration,
}

impl PricePoller {
    pub fn new(aggregator: Arc<PriceAggregator>, interval: Duration) -> Self {
        Self {
            aggregator,
            interval,
        }
    }

    /// Poll until `cancel` fires.
    ///
    /// The token is checked between cycles. An in-flight cycle shares the
    /// same token and winds its own fetches down; it is never aborted here.
    pub async fn run(&self, cancel: CancellationToken) {
        info!(
            interval = ?self.interval,
            sources = ?self.aggregator.source_names(),
            "starting price poller"
        );

        self.cycle(&cancel).await;

        let mut ticker = interval_at(Instant::now() + self.interval, self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    info!("stopping price poller");
                    break;
                }
                _ = ticker.tick() => {
                    self.cycle(&cancel).await;
                }
            }
        }
    }

    /// Run the poller on its own task
    pub fn spawn(self, cancel: CancellationToken) -> JoinHandle<()> {
        tokio::spawn(async move { self.run(cancel).await })
    }

    async fn cycle(&self, cancel: &CancellationToken) -> CycleReport {
        let report = self.aggregator.run_cycle(cancel).await;
        let stats = self.aggregator.state().stats();

        debug!(
            consensus = ?report.consensus,
            sources_used = report.sources_used,
            failed = report.failed,
            cancelled = report.cancelled,
            elapsed = ?report.elapsed,
            publish_count = stats.publish_count,
            last_update_age = ?stats.last_update_age,
            "cycle complete"
        );

        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregator::AggregatorConfig;
    use crate::retry::RetryPolicy;
    use crate::sources::PriceSource;
    use async_trait::async_trait;
    use oracle_core::{SourceError, SourceResult};
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Counts calls and tracks how many fetches overlap
    #[derive(Default)]
    struct CountingSource {
        delay: Duration,
        calls: AtomicUsize,
        in_flight: AtomicUsize,
        max_in_flight: AtomicUsize,
    }

    #[async_trait]
    impl PriceSource for CountingSource {
        fn name(&self) -> &str {
            "counting"
        }

        async fn fetch_price(&self, _cancel: CancellationToken) -> SourceResult<f64> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
            let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.max_in_flight.fetch_max(now, Ordering::SeqCst);

            tokio::time::sleep(self.delay).await;

            self.in_flight.fetch_sub(1, Ordering::SeqCst);
            Ok(1_000.0 + n as f64)
        }
    }

    /// Answers after `delay` no matter what the token says, or always fails
    struct StubbornSource {
        name: &'static str,
        delay: Duration,
        price: Option<f64>,
    }

    #[async_trait]
    impl PriceSource for StubbornSource {
        fn name(&self) -> &str {
            self.name
        }

        async fn fetch_price(&self, _cancel: CancellationToken) -> SourceResult<f64> {
            tokio::time::sleep(self.delay).await;
            self.price.ok_or(SourceError::Status(503))
        }
    }

    fn poller(source: Arc<CountingSource>, interval: Duration) -> (PricePoller, Arc<PriceAggregator>) {
        let config = AggregatorConfig {
            request_timeout: Duration::from_secs(30),
            retry: RetryPolicy::no_retry(),
            currency: "USD".to_string(),
        };
        let aggregator = Arc::new(PriceAggregator::new(config, vec![source as Arc<dyn PriceSource>]));
        (PricePoller::new(Arc::clone(&aggregator), interval), aggregator)
    }

    #[tokio::test(start_paused = true)]
    async fn test_first_cycle_runs_immediately() {
        let source = Arc::new(CountingSource::default());
        let (poller, aggregator) = poller(source.clone(), Duration::from_secs(10));
        let cancel = CancellationToken::new();
        let handle = poller.spawn(cancel.clone());

        tokio::time::sleep(Duration::from_millis(1)).await;

        assert_eq!(source.calls.load(Ordering::SeqCst), 1);
        assert!(!aggregator.snapshot().stale);

        cancel.cancel();
        handle.await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_one_cycle_per_interval() {
        let source = Arc::new(CountingSource::default());
        let (poller, aggregator) = poller(source.clone(), Duration::from_secs(10));
        let cancel = CancellationToken::new();
        let handle = poller.spawn(cancel.clone());

        tokio::time::sleep(Duration::from_millis(30_001)).await;

        // t=0, 10s, 20s, 30s
        assert_eq!(source.calls.load(Ordering::SeqCst), 4);
        assert_eq!(aggregator.snapshot().price, 1_004.0);
        assert_eq!(aggregator.state().stats().publish_count, 4);

        cancel.cancel();
        handle.await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_stops_on_cancel() {
        let source = Arc::new(CountingSource::default());
        let (poller, _) = poller(source.clone(), Duration::from_secs(10));
        let cancel = CancellationToken::new();
        let handle = poller.spawn(cancel.clone());

        tokio::time::sleep(Duration::from_millis(1)).await;
        cancel.cancel();
        handle.await.unwrap();

        let calls = source.calls.load(Ordering::SeqCst);
        tokio::time::sleep(Duration::from_secs(60)).await;
        assert_eq!(source.calls.load(Ordering::SeqCst), calls);
    }

    #[tokio::test(start_paused = true)]
    async fn test_slow_cycles_never_overlap() {
        let source = Arc::new(CountingSource {
            delay: Duration::from_secs(3),
            ..Default::default()
        });
        let (poller, _) = poller(source.clone(), Duration::from_secs(1));
        let cancel = CancellationToken::new();
        let handle = poller.spawn(cancel.clone());

        tokio::time::sleep(Duration::from_secs(20)).await;
        cancel.cancel();
        handle.await.unwrap();

        assert!(source.calls.load(Ordering::SeqCst) > 1);
        assert_eq!(source.max_in_flight.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_lets_in_flight_cycle_publish() {
        let sources: Vec<Arc<dyn PriceSource>> = vec![
            Arc::new(StubbornSource {
                name: "slow",
                delay: Duration::from_millis(500),
                price: Some(7.0),
            }),
            Arc::new(StubbornSource {
                name: "down",
                delay: Duration::ZERO,
                price: None,
            }),
        ];
        let config = AggregatorConfig {
            request_timeout: Duration::from_secs(30),
            retry: RetryPolicy::new(5, Duration::from_millis(200)),
            currency: "USD".to_string(),
        };
        let aggregator = Arc::new(PriceAggregator::new(config, sources));
        let poller = PricePoller::new(Arc::clone(&aggregator), Duration::from_secs(10));
        let cancel = CancellationToken::new();
        let handle = poller.spawn(cancel.clone());

        tokio::time::sleep(Duration::from_millis(100)).await;
        cancel.cancel();
        handle.await.unwrap();

        let snapshot = aggregator.snapshot();
        assert_eq!(snapshot.price, 7.0);
        assert_eq!(snapshot.sources_used, 1);
        assert!(!snapshot.stale);
        assert_eq!(aggregator.state().stats().publish_count, 1);
    }
}
