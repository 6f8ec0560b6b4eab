//! Metrics sinks for the aggregation engine
//!
//! The engine only knows the [`MetricsSink`] trait. The Prometheus sink owns
//! its own registry rather than the process-global one, so several engines
//! (and tests) can coexist.

use prometheus::{Encoder, Gauge, IntCounterVec, Opts, Registry, TextEncoder};

/// Observability hooks fired as side effects of a cycle
pub trait MetricsSink: Send + Sync {
    /// A source delivered a value within its retry budget
    fn record_success(&self, source: &str);

    /// A source ran out of retries. Not called for cancelled sources.
    fn record_failure(&self, source: &str);

    /// A new consensus price was published
    fn record_value(&self, value: f64);
}

/// Sink that drops everything
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopMetrics;

impl MetricsSink for NoopMetrics {
    fn record_success(&self, _source: &str) {}
    fn record_failure(&self, _source: &str) {}
    fn record_value(&self, _value: f64) {}
}

/// Prometheus-backed sink
#[derive(Clone)]
pub struct PrometheusMetrics {
    registry: Registry,
    fetch_success: IntCounterVec,
    fetch_failure: IntCounterVec,
    current_price: Gauge,
}

impl PrometheusMetrics {
    pub fn new() -> prometheus::Result<Self> {
        let registry = Registry::new();

        let fetch_success = IntCounterVec::new(
            Opts::new("fetch_success_total", "Successful price fetches per source"),
            &["source"],
        )?;
        let fetch_failure = IntCounterVec::new(
            Opts::new(
                "fetch_failure_total",
                "Price fetches that exhausted their retries per source",
            ),
            &["source"],
        )?;
        let current_price = Gauge::new("current_price", "Latest published consensus price")?;

        registry.register(Box::new(fetch_success.clone()))?;
        registry.register(Box::new(fetch_failure.clone()))?;
        registry.register(Box::new(current_price.clone()))?;

        Ok(Self {
            registry,
            fetch_success,
            fetch_failure,
            current_price,
        })
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn success_count(&self, source: &str) -> u64 {
        self.fetch_success.with_label_values(&[source]).get()
    }

    pub fn failure_count(&self, source: &str) -> u64 {
        self.fetch_failure.with_label_values(&[source]).get()
    }

    /// Text exposition format of everything in the registry
    pub fn encode(&self) -> prometheus::Result<String> {
        let mut buffer = Vec::new();
        TextEncoder::new().encode(&self.registry.gather(), &mut buffer)?;
        String::from_utf8(buffer).map_err(|e| prometheus::Error::Msg(e.to_string()))
    }
}

impl MetricsSink for PrometheusMetrics {
    fn record_success(&self, source: &str) {
        self.fetch_success.with_label_values(&[source]).inc();
    }

    fn record_failure(&self, source: &str) {
        self.fetch_failure.with_label_values(&[source]).inc();
    }

    fn record_value(&self, value: f64) {
        self.current_price.set(value);
    }
}
