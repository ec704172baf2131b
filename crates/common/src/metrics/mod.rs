//! Metrics and observability utilities
//!
//! Provides Prometheus metrics with standardized naming conventions.
//! Recording is a no-op until the binary installs an exporter.

use metrics::{counter, describe_counter, describe_gauge, describe_histogram, gauge, histogram, Unit};

/// Metrics prefix for all Gravity metrics
pub const METRICS_PREFIX: &str = "gravity";

/// Histogram buckets for view building and query latency (in seconds)
pub const LATENCY_BUCKETS: &[f64] = &[
    0.001,  // 1ms
    0.005,  // 5ms
    0.010,  // 10ms
    0.025,  // 25ms
    0.050,  // 50ms
    0.100,  // 100ms
    0.250,  // 250ms
    0.500,  // 500ms
    1.000,  // 1s
    5.000,  // 5s
];

/// Buckets for global ranking computations (whole-graph, much slower)
pub const COMPUTATION_BUCKETS: &[f64] = &[
    0.100,  // 100ms
    0.500,  // 500ms
    1.000,  // 1s
    5.000,  // 5s
    15.00,  // 15s
    60.00,  // 1m
    300.0,  // 5m
];

/// Register all metric descriptions
pub fn register_metrics() {
    // View metrics
    describe_counter!(
        format!("{}_views_total", METRICS_PREFIX),
        Unit::Count,
        "Total number of gravity views built"
    );

    describe_histogram!(
        format!("{}_view_duration_seconds", METRICS_PREFIX),
        Unit::Seconds,
        "Gravity view build latency in seconds"
    );

    describe_histogram!(
        format!("{}_view_edges", METRICS_PREFIX),
        Unit::Count,
        "Edges in a built gravity view"
    );

    // Global ranking metrics
    describe_counter!(
        format!("{}_global_rank_computations_total", METRICS_PREFIX),
        Unit::Count,
        "Total global ranking computations"
    );

    describe_histogram!(
        format!("{}_global_rank_duration_seconds", METRICS_PREFIX),
        Unit::Seconds,
        "Global ranking computation latency in seconds"
    );

    describe_gauge!(
        format!("{}_global_rank_beacons", METRICS_PREFIX),
        Unit::Count,
        "Number of beacons in the last global ranking"
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

    // Maintenance metrics
    describe_counter!(
        format!("{}_zero_refreshes_total", METRICS_PREFIX),
        Unit::Count,
        "Total zero node refreshes"
    );

    describe_counter!(
        format!("{}_warmup_egos_total", METRICS_PREFIX),
        Unit::Count,
        "Egos calculated during warmup"
    );

    // Listener metrics
    describe_counter!(
        format!("{}_fdw_requests_total", METRICS_PREFIX),
        Unit::Count,
        "Total predicate pushdown requests"
    );

    describe_histogram!(
        format!("{}_fdw_duration_seconds", METRICS_PREFIX),
        Unit::Seconds,
        "Predicate pushdown request latency in seconds"
    );

    describe_histogram!(
        format!("{}_fdw_rows", METRICS_PREFIX),
        Unit::Count,
        "Rows returned per predicate pushdown request"
    );

    // Bridge metrics
    describe_counter!(
        format!("{}_edges_applied_total", METRICS_PREFIX),
        Unit::Count,
        "Edges applied to the rank engine"
    );

    tracing::info!("Metrics registered");
}

/// Helper to record a built view
pub fn record_view(duration_secs: f64, kind: &str, edge_count: usize) {
    counter!(
        format!("{}_views_total", METRICS_PREFIX),
        "kind" => kind.to_string()
    )
    .increment(1);

    histogram!(
        format!("{}_view_duration_seconds", METRICS_PREFIX),
        "kind" => kind.to_string()
    )
    .record(duration_secs);

    histogram!(
        format!("{}_view_edges", METRICS_PREFIX),
        "kind" => kind.to_string()
    )
    .record(edge_count as f64);
}

/// Helper to record a global ranking computation
pub fn record_global_rank(duration_secs: f64, beacon_count: usize) {
    counter!(format!("{}_global_rank_computations_total", METRICS_PREFIX)).increment(1);

    histogram!(format!("{}_global_rank_duration_seconds", METRICS_PREFIX)).record(duration_secs);

    gauge!(format!("{}_global_rank_beacons", METRICS_PREFIX)).set(beacon_count as f64);
}

/// Helper to record cache metrics
pub fn record_cache(hit: bool, cache_name: &str) {
    if hit {
        counter!(
            format!("{}_cache_hits_total", METRICS_PREFIX),
            "cache" => cache_name.to_string()
        )
        .increment(1);
    } else {
        counter!(
            format!("{}_cache_misses_total", METRICS_PREFIX),
            "cache" => cache_name.to_string()
        )
        .increment(1);
    }
}

/// Helper to record a zero node refresh
pub fn record_zero_refresh(success: bool) {
    let status = if success { "success" } else { "error" };

    counter!(
        format!("{}_zero_refreshes_total", METRICS_PREFIX),
        "status" => status.to_string()
    )
    .increment(1);
}

/// Helper to record warmup progress
pub fn record_warmup_ego(success: bool) {
    let status = if success { "success" } else { "error" };

    counter!(
        format!("{}_warmup_egos_total", METRICS_PREFIX),
        "status" => status.to_string()
    )
    .increment(1);
}

/// Helper to record a predicate pushdown request
pub fn record_fdw_request(duration_secs: f64, rows: usize, success: bool) {
    let status = if success { "success" } else { "error" };

    counter!(
        format!("{}_fdw_requests_total", METRICS_PREFIX),
        "status" => status.to_string()
    )
    .increment(1);

    histogram!(format!("{}_fdw_duration_seconds", METRICS_PREFIX)).record(duration_secs);

    if success {
        histogram!(format!("{}_fdw_rows", METRICS_PREFIX)).record(rows as f64);
    }
}

/// Helper to record edges applied by the bridge or the initial load
pub fn record_edges_applied(source: &str, count: u64) {
    counter!(
        format!("{}_edges_applied_total", METRICS_PREFIX),
        "source" => source.to_string()
    )
    .increment(count);
}
