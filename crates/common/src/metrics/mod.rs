//! Metrics and observability utilities
//!
//! Prometheus metrics for research runs, pipeline stages, upstream calls
//! and the paper cache, with standardized naming conventions.

use metrics::{counter, describe_counter, describe_histogram, histogram, Unit};
use std::time::Instant;

/// Metrics prefix for all litgraph metrics
pub const METRICS_PREFIX: &str = "litgraph";

/// Histogram buckets for a full research run (in seconds).
/// A run fans out to the search service and three completions.
pub const RUN_BUCKETS: &[f64] = &[
    1.0,    // 1s
    2.5,    // 2.5s
    5.0,    // 5s
    10.0,   // 10s
    20.0,   // 20s
    30.0,   // 30s
    60.0,   // 1min
    120.0,  // 2min
    300.0,  // 5min
];

/// Register all metric descriptions
pub fn register_metrics() {
    // Request metrics
    describe_counter!(
        format!("{}_requests_total", METRICS_PREFIX),
        Unit::Count,
        "Total number of HTTP requests"
    );

    describe_histogram!(
        format!("{}_request_duration_seconds", METRICS_PREFIX),
        Unit::Seconds,
        "HTTP request latency in seconds"
    );

    // Research runs
    describe_counter!(
        format!("{}_research_runs_total", METRICS_PREFIX),
        Unit::Count,
        "Total research runs by outcome"
    );

    describe_histogram!(
        format!("{}_research_duration_seconds", METRICS_PREFIX),
        Unit::Seconds,
        "End-to-end research run latency in seconds"
    );

    describe_histogram!(
        format!("{}_stage_duration_seconds", METRICS_PREFIX),
        Unit::Seconds,
        "Pipeline stage latency in seconds"
    );

    describe_counter!(
        format!("{}_ranking_fallbacks_total", METRICS_PREFIX),
        Unit::Count,
        "Rankings that fell back to citation-count order"
    );

    // Upstream services
    describe_counter!(
        format!("{}_upstream_requests_total", METRICS_PREFIX),
        Unit::Count,
        "Total requests to the search and completion services"
    );

    describe_counter!(
        format!("{}_upstream_errors_total", METRICS_PREFIX),
        Unit::Count,
        "Total failed requests to the search and completion services"
    );

    // Cache metrics
    describe_counter!(
        format!("{}_cache_hits_total", METRICS_PREFIX),
        Unit::Count,
        "Total cache hits"
    );

    describe_counter!(
        format!("{}_cache_misses_total", METRICS_PREFIX),
        Unit::Count,
        "Total cache misses"
    );

    describe_counter!(
        format!("{}_cache_errors_total", METRICS_PREFIX),
        Unit::Count,
        "Total cache operations that failed"
    );

    tracing::info!("Metrics registered");
}

/// Helper to record request metrics
pub struct RequestMetrics {
    start: Instant,
    endpoint: String,
    method: String,
}

impl RequestMetrics {
    /// Start tracking a request
    pub fn start(method: &str, endpoint: &str) -> Self {
        Self {
            start: Instant::now(),
            endpoint: endpoint.to_string(),
            method: method.to_string(),
        }
    }

    /// Record request completion
    pub fn finish(self, status: u16) {
        let duration = self.start.elapsed().as_secs_f64();

        counter!(
            format!("{}_requests_total", METRICS_PREFIX),
            "method" => self.method.clone(),
            "endpoint" => self.endpoint.clone(),
            "status" => status.to_string()
        )
        .increment(1);

        histogram!(
            format!("{}_request_duration_seconds", METRICS_PREFIX),
            "method" => self.method,
            "endpoint" => self.endpoint
        )
        .record(duration);
    }
}

/// Helper to record a finished research run
pub fn record_research_run(outcome: &str, duration_secs: f64) {
    counter!(
        format!("{}_research_runs_total", METRICS_PREFIX),
        "outcome" => outcome.to_string()
    )
    .increment(1);

    histogram!(
        format!("{}_research_duration_seconds", METRICS_PREFIX),
        "outcome" => outcome.to_string()
    )
    .record(duration_secs);
}

/// Helper to record one pipeline stage
pub fn record_stage(stage: &str, duration_secs: f64) {
    histogram!(
        format!("{}_stage_duration_seconds", METRICS_PREFIX),
        "stage" => stage.to_string()
    )
    .record(duration_secs);
}

/// Helper to record an upstream call
pub fn record_upstream(service: &str, operation: &str, success: bool) {
    let status = if success { "success" } else { "error" };

    counter!(
        format!("{}_upstream_requests_total", METRICS_PREFIX),
        "service" => service.to_string(),
        "operation" => operation.to_string(),
        "status" => status
    )
    .increment(1);

    if !success {
        counter!(
            format!("{}_upstream_errors_total", METRICS_PREFIX),
            "service" => service.to_string(),
            "operation" => operation.to_string()
        )
        .increment(1);
    }
}

/// Helper to record cache metrics
pub fn record_cache(hits: usize, misses: usize, cache_name: &str) {
    counter!(
        format!("{}_cache_hits_total", METRICS_PREFIX),
        "cache" => cache_name.to_string()
    )
    .increment(hits as u64);

    counter!(
        format!("{}_cache_misses_total", METRICS_PREFIX),
        "cache" => cache_name.to_string()
    )
    .increment(misses as u64);
}

/// Helper to record a failed cache operation
pub fn record_cache_error(operation: &str) {
    counter!(
        format!("{}_cache_errors_total", METRICS_PREFIX),
        "operation" => operation.to_string()
    )
    .increment(1);
}

/// Helper to record a ranking that used the citation-count fallback
pub fn record_ranking_fallback() {
    counter!(format!("{}_ranking_fallbacks_total", METRICS_PREFIX)).increment(1);
}
