//! Prometheus metrics for gateway operations

use prometheus::{CounterVec, Encoder, Opts, Registry, TextEncoder};
use std::sync::Arc;

/// Metrics collected by the gateway
///
/// Every collector is registered on the gateway's own [`Registry`] so that
/// several gateways (as in tests) can live in one process.
#[derive(Clone)]
pub struct GatewayMetrics {
    registry: Registry,

    /// Requests by operation (put/get/head/delete) and response status
    pub requests_total: Arc<CounterVec>,

    /// Range cache lookups by result (hit/miss/error)
    pub cache_lookups_total: Arc<CounterVec>,

    /// Footers cached on upload, by file format
    pub footers_cached_total: Arc<CounterVec>,

    /// Response body bytes by source (cache/storage)
    pub bytes_served_total: Arc<CounterVec>,
}

impl GatewayMetrics {
    /// Create metrics on a fresh registry
    pub fn new() -> Result<Self, prometheus::Error> {
        Self::with_registry(Registry::new())
    }

    /// Create metrics registered on `registry`
    pub fn with_registry(registry: Registry) -> Result<Self, prometheus::Error> {
        let requests_total = CounterVec::new(
            Opts::new("s4_gateway_requests_total", "Total number of object requests"),
            &["operation", "status"],
        )?;
        registry.register(Box::new(requests_total.clone()))?;

        let cache_lookups_total = CounterVec::new(
            Opts::new(
                "s4_gateway_cache_lookups_total",
                "Range cache lookups by result",
            ),
            &["result"], // result: hit, miss, error
        )?;
        registry.register(Box::new(cache_lookups_total.clone()))?;

        let footers_cached_total = CounterVec::new(
            Opts::new(
                "s4_gateway_footers_cached_total",
                "Number of file footers cached on upload",
            ),
            &["format"],
        )?;
        registry.register(Box::new(footers_cached_total.clone()))?;

        let bytes_served_total = CounterVec::new(
            Opts::new(
                "s4_gateway_bytes_served_total",
                "Response body bytes by source",
            ),
            &["source"], // source: cache, storage
        )?;
        registry.register(Box::new(bytes_served_total.clone()))?;

        Ok(Self {
            registry,
            requests_total: Arc::new(requests_total),
            cache_lookups_total: Arc::new(cache_lookups_total),
            footers_cached_total: Arc::new(footers_cached_total),
            bytes_served_total: Arc::new(bytes_served_total),
        })
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn record_request(&self, operation: &str, status: u16) {
        self.requests_total
            .with_label_values(&[operation, &status.to_string()])
            .inc();
    }

    pub fn record_cache_lookup(&self, result: &str) {
        self.cache_lookups_total.with_label_values(&[result]).inc();
    }

    pub fn record_footer_cached(&self, format: &str) {
        self.footers_cached_total.with_label_values(&[format]).inc();
    }

    pub fn record_bytes_served(&self, source: &str, bytes: usize) {
        self.bytes_served_total
            .with_label_values(&[source])
            .inc_by(bytes as f64);
    }

    /// Current value of a cache lookup counter
    pub fn cache_lookups(&self, result: &str) -> u64 {
        self.cache_lookups_total.with_label_values(&[result]).get() as u64
    }

    /// Render all metrics in the Prometheus text exposition format
    pub fn encode(&self) -> Result<(String, Vec<u8>), prometheus::Error> {
        let encoder = TextEncoder::new();
        let mut buffer = Vec::new();
        encoder.encode(&self.registry.gather(), &mut buffer)?;
        Ok((encoder.format_type().to_string(), buffer))
    }
}
