use lazy_static::lazy_static;
use prometheus::{
    register_counter_vec, register_histogram_vec, register_int_gauge, CounterVec, Encoder,
    HistogramVec, IntGauge, TextEncoder,
};

lazy_static! {
    // Cache metrics
    pub static ref CACHE_REQUESTS: CounterVec = register_counter_vec!(
        "orders_cache_requests_total",
        "Total number of cache lookups",
        &["operation", "result"]
    )
    .expect("metric cannot be created");

    pub static ref CACHE_EVICTIONS: CounterVec = register_counter_vec!(
        "orders_cache_evictions_total",
        "Total number of cache entries removed",
        &["reason"]
    )
    .expect("metric cannot be created");

    pub static ref CACHE_ENTRIES: IntGauge = register_int_gauge!(
        "orders_cache_entries",
        "Number of entries held by the cache, expired ones included"
    )
    .expect("metric cannot be created");

    // Store metrics
    pub static ref STORE_OPERATIONS: CounterVec = register_counter_vec!(
        "orders_store_operations_total",
        "Total number of order store operations",
        &["operation", "status"]
    )
    .expect("metric cannot be created");

    pub static ref STORE_DURATION: HistogramVec = register_histogram_vec!(
        "orders_store_duration_seconds",
        "Order store operation duration in seconds",
        &["operation"],
        vec![0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0]
    )
    .expect("metric cannot be created");

    // Ingestion metrics
    pub static ref INGESTED_MESSAGES: CounterVec = register_counter_vec!(
        "orders_ingested_messages_total",
        "Total number of broker messages handled",
        &["outcome"]
    )
    .expect("metric cannot be created");

    pub static ref INGEST_RETRIES: CounterVec = register_counter_vec!(
        "orders_ingest_retries_total",
        "Total number of store write retries during ingestion",
        &["phase"]
    )
    .expect("metric cannot be created");

    // HTTP metrics
    pub static ref HTTP_REQUESTS: CounterVec = register_counter_vec!(
        "orders_http_requests_total",
        "Total number of API requests",
        &["endpoint", "status"]
    )
    .expect("metric cannot be created");

    pub static ref HTTP_DURATION: HistogramVec = register_histogram_vec!(
        "orders_http_request_duration_seconds",
        "API request duration in seconds",
        &["endpoint"],
        vec![0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0]
    )
    .expect("metric cannot be created");
}

/// Get all metrics in Prometheus text format
pub fn gather_metrics() -> Result<String, Box<dyn std::error::Error>> {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();
    encoder.encode(&metric_families, &mut buffer)?;
    Ok(String::from_utf8(buffer)?)
}

/// Helper function to record cache hit/miss
pub fn record_cache_request(operation: &str, hit: bool) {
    let result = if hit { "hit" } else { "miss" };
    CACHE_REQUESTS
        .with_label_values(&[operation, result])
        .inc();
}

/// Helper function to record entries dropped by the sweeper or by capacity eviction
pub fn record_cache_evictions(reason: &str, count: usize) {
    if count > 0 {
        CACHE_EVICTIONS
            .with_label_values(&[reason])
            .inc_by(count as f64);
    }
}

pub fn set_cache_entries(count: usize) {
    CACHE_ENTRIES.set(count as i64);
}

/// Helper function to record order store operation
pub fn record_store_operation(operation: &str, success: bool, duration_secs: f64) {
    let status = if success { "success" } else { "error" };
    STORE_OPERATIONS
        .with_label_values(&[operation, status])
        .inc();
    STORE_DURATION
        .with_label_values(&[operation])
        .observe(duration_secs);
}

/// Helper function to record how a broker message was disposed of
pub fn record_ingested_message(outcome: &str) {
    INGESTED_MESSAGES.with_label_values(&[outcome]).inc();
}

pub fn record_ingest_retry(phase: &str) {
    INGEST_RETRIES.with_label_values(&[phase]).inc();
}

/// Helper function to record an API request
pub fn record_http_request(endpoint: &str, status: u16, duration_secs: f64) {
    HTTP_REQUESTS
        .with_label_values(&[endpoint, &status.to_string()])
        .inc();
    HTTP_DURATION
        .with_label_values(&[endpoint])
        .observe(duration_secs);
}
