//! Metrics collection and export module

use prometheus::{
    Encoder, Histogram, HistogramOpts, IntCounter, IntGaugeVec, Opts, Registry, TextEncoder,
};
use std::time::Instant;

/// Global metrics registry
pub struct Metrics {
    registry: Registry,

    // Derivation
    pub derivations_total: IntCounter,
    pub derivation_anomalies: IntCounter,

    // Content resolution
    pub content_cache_hits: IntCounter,
    pub content_cache_misses: IntCounter,
    pub content_fetch_failures: IntCounter,
    pub content_cache_evictions: IntCounter,

    // Endpoint failover
    pub rpc_failovers: IntCounter,
    pub rpc_endpoint_failures: IntCounter,
    /// Labeled by pool id, one series per live [`crate::rpc_manager::RpcPool`]
    pub rpc_healthy_endpoints: IntGaugeVec,

    // Assembly and rehearsal
    pub preflight_rejections: IntCounter,
    pub fee_sample_fallbacks: IntCounter,
    pub simulations_total: IntCounter,
    pub simulation_failures: IntCounter,
    pub rehearsals_passed: IntCounter,
    pub rehearsals_failed: IntCounter,

    // Histograms
    pub rpc_latency: Histogram,
    pub build_latency: Histogram,
    pub content_fetch_latency: Histogram,
}

impl Metrics {
    /// Create new metrics instance
    pub fn new() -> anyhow::Result<Self> {
        let registry = Registry::new();

        let derivations_total = IntCounter::with_opts(Opts::new(
            "derivations_total",
            "Keyless identities derived",
        ))?;

        let derivation_anomalies = IntCounter::with_opts(Opts::new(
            "derivation_anomalies_total",
            "Derivations that exhausted the re-hash round cap",
        ))?;

        let content_cache_hits = IntCounter::with_opts(Opts::new(
            "content_cache_hits_total",
            "Content lookups served from cache",
        ))?;

        let content_cache_misses = IntCounter::with_opts(Opts::new(
            "content_cache_misses_total",
            "Content lookups that required a network fetch",
        ))?;

        let content_fetch_failures = IntCounter::with_opts(Opts::new(
            "content_fetch_failures_total",
            "Individual content source attempts that failed",
        ))?;

        let content_cache_evictions = IntCounter::with_opts(Opts::new(
            "content_cache_evictions_total",
            "Expired content entries purged by the sweeper",
        ))?;

        let rpc_failovers = IntCounter::with_opts(Opts::new(
            "rpc_failovers_total",
            "Calls rerouted to a lower-priority endpoint",
        ))?;

        let rpc_endpoint_failures = IntCounter::with_opts(Opts::new(
            "rpc_endpoint_failures_total",
            "Failed calls and probes across all endpoints",
        ))?;

        let rpc_healthy_endpoints = IntGaugeVec::new(
            Opts::new("rpc_healthy_endpoints", "Endpoints currently marked healthy"),
            &["pool"],
        )?;

        let preflight_rejections = IntCounter::with_opts(Opts::new(
            "preflight_rejections_total",
            "Constructions blocked by a preflight policy violation",
        ))?;

        let fee_sample_fallbacks = IntCounter::with_opts(Opts::new(
            "fee_sample_fallbacks_total",
            "Fee estimates that fell back to the fixed default",
        ))?;

        let simulations_total = IntCounter::with_opts(Opts::new(
            "simulations_total",
            "Read-only transaction simulations issued",
        ))?;

        let simulation_failures = IntCounter::with_opts(Opts::new(
            "simulation_failures_total",
            "Simulations that reported an error or could not run",
        ))?;

        let rehearsals_passed = IntCounter::with_opts(Opts::new(
            "rehearsals_passed_total",
            "Dry-run rehearsals that passed",
        ))?;

        let rehearsals_failed = IntCounter::with_opts(Opts::new(
            "rehearsals_failed_total",
            "Dry-run rehearsals that failed",
        ))?;

        let rpc_latency = Histogram::with_opts(
            HistogramOpts::new("rpc_latency_seconds", "RPC call latency")
                .buckets(vec![0.005, 0.01, 0.05, 0.1, 0.5, 1.0, 5.0]),
        )?;

        let build_latency = Histogram::with_opts(
            HistogramOpts::new("build_latency_seconds", "Transaction build latency")
                .buckets(vec![0.01, 0.05, 0.1, 0.5, 1.0, 2.0, 5.0]),
        )?;

        let content_fetch_latency = Histogram::with_opts(
            HistogramOpts::new("content_fetch_latency_seconds", "Content source fetch latency")
                .buckets(vec![0.05, 0.1, 0.5, 1.0, 2.0, 5.0, 10.0]),
        )?;

        registry.register(Box::new(derivations_total.clone()))?;
        registry.register(Box::new(derivation_anomalies.clone()))?;
        registry.register(Box::new(content_cache_hits.clone()))?;
        registry.register(Box::new(content_cache_misses.clone()))?;
        registry.register(Box::new(content_fetch_failures.clone()))?;
        registry.register(Box::new(content_cache_evictions.clone()))?;
        registry.register(Box::new(rpc_failovers.clone()))?;
        registry.register(Box::new(rpc_endpoint_failures.clone()))?;
        registry.register(Box::new(rpc_healthy_endpoints.clone()))?;
        registry.register(Box::new(preflight_rejections.clone()))?;
        registry.register(Box::new(fee_sample_fallbacks.clone()))?;
        registry.register(Box::new(simulations_total.clone()))?;
        registry.register(Box::new(simulation_failures.clone()))?;
        registry.register(Box::new(rehearsals_passed.clone()))?;
        registry.register(Box::new(rehearsals_failed.clone()))?;
        registry.register(Box::new(rpc_latency.clone()))?;
        registry.register(Box::new(build_latency.clone()))?;
        registry.register(Box::new(content_fetch_latency.clone()))?;

        Ok(Self {
            registry,
            derivations_total,
            derivation_anomalies,
            content_cache_hits,
            content_cache_misses,
            content_fetch_failures,
            content_cache_evictions,
            rpc_failovers,
            rpc_endpoint_failures,
            rpc_healthy_endpoints,
            preflight_rejections,
            fee_sample_fallbacks,
            simulations_total,
            simulation_failures,
            rehearsals_passed,
            rehearsals_failed,
            rpc_latency,
            build_latency,
            content_fetch_latency,
        })
    }

    /// Get the registry for exporting
    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Render all metrics in the Prometheus text exposition format
    pub fn encode(&self) -> anyhow::Result<String> {
        let mut buf = Vec::new();
        TextEncoder::new().encode(&self.registry.gather(), &mut buf)?;
        Ok(String::from_utf8(buf)?)
    }
}

/// Global metrics instance
pub fn metrics() -> &'static Metrics {
    static METRICS: once_cell::sync::Lazy<Metrics> =
        once_cell::sync::Lazy::new(|| Metrics::new().expect("Failed to initialize metrics"));
    &METRICS
}

/// Timer helper for measuring operation duration
pub struct Timer {
    start: Instant,
}

impl Timer {
    pub fn new() -> Self {
        Self {
            start: Instant::now(),
        }
    }

    pub fn observe_duration(&self, histogram: &Histogram) {
        histogram.observe(self.start.elapsed().as_secs_f64());
    }

    pub fn elapsed_secs(&self) -> f64 {
        self.start.elapsed().as_secs_f64()
    }
}

impl Default for Timer {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_contains_registered_metrics() {
        let m = Metrics::new().unwrap();
        m.derivations_total.inc();
        m.rpc_healthy_endpoints.with_label_values(&["pool-a"]).set(2);
        m.rpc_healthy_endpoints.with_label_values(&["pool-b"]).set(1);
        let text = m.encode().unwrap();
        assert!(text.contains("derivations_total 1"));
        assert!(text.contains("rpc_healthy_endpoints{pool=\"pool-a\"} 2"));
        assert!(text.contains("rpc_healthy_endpoints{pool=\"pool-b\"} 1"));
    }
}
