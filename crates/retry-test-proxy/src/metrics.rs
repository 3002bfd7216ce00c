//! Prometheus metrics for the retry test proxy.
//!
//! Tracks forwarded requests, injected retry tests and control-plane failures.
use lazy_static::lazy_static;
use prometheus::{
    register_counter_vec, register_histogram_vec, CounterVec, Encoder, HistogramVec, TextEncoder,
};

lazy_static! {
    /// Total number of requests relayed
    pub static ref REQUESTS_TOTAL: CounterVec = register_counter_vec!(
        "retry_proxy_requests_total",
        "Total number of requests processed by the proxy",
        &["request_type", "status"]
    )
    .unwrap();

    /// Requests that carried a retry test id to the backend
    pub static ref INSTRUCTIONS_INJECTED_TOTAL: CounterVec = register_counter_vec!(
        "retry_proxy_instructions_injected_total",
        "Total number of requests forwarded with a retry test attached",
        &["request_type"]
    )
    .unwrap();

    /// Retry test registrations that failed; the request went out unmodified
    pub static ref INJECTION_FAILURES_TOTAL: CounterVec = register_counter_vec!(
        "retry_proxy_injection_failures_total",
        "Total number of failed retry test registrations",
        &["request_type"]
    )
    .unwrap();

    /// Time to response headers, including the control-plane call
    pub static ref REQUEST_DURATION_MS: HistogramVec = register_histogram_vec!(
        "retry_proxy_request_duration_ms",
        "Duration until upstream response headers, in milliseconds",
        &["request_type", "injected"],  // injected: true|false
        vec![1.0, 5.0, 10.0, 25.0, 50.0, 100.0, 250.0, 500.0, 1000.0, 2500.0, 5000.0]
    )
    .unwrap();
}

/// Collect and return all metrics in Prometheus text format
pub fn collect_metrics() -> String {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();
    if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
        tracing::error!("Failed to encode metrics: {}", e);
        return String::new();
    }
    String::from_utf8(buffer).unwrap_or_default()
}

pub fn record_request(request_type: &str, status: u16) {
    REQUESTS_TOTAL
        .with_label_values(&[request_type, &status.to_string()])
        .inc();
}

pub fn record_injection(request_type: &str) {
    INSTRUCTIONS_INJECTED_TOTAL
        .with_label_values(&[request_type])
        .inc();
}

pub fn record_injection_failure(request_type: &str) {
    INJECTION_FAILURES_TOTAL
        .with_label_values(&[request_type])
        .inc();
}

pub fn record_request_duration(request_type: &str, injected: bool, duration_ms: f64) {
    let injected = if injected { "true" } else { "false" };
    REQUEST_DURATION_MS
        .with_label_values(&[request_type, injected])
        .observe(duration_ms);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metrics_collection() {
        record_request("XmlRead", 200);
        record_injection("XmlRead");
        record_injection_failure("JsonStat");
        record_request_duration("XmlRead", true, 12.5);

        let output = collect_metrics();
        assert!(output.contains("retry_proxy_requests_total"));
        assert!(output.contains("retry_proxy_instructions_injected_total"));
        assert!(output.contains("retry_proxy_injection_failures_total"));
        assert!(output.contains("retry_proxy_request_duration_ms"));
    }

    #[test]
    fn test_injection_counter_increments() {
        let before = INSTRUCTIONS_INJECTED_TOTAL
            .with_label_values(&["JsonCompose"])
            .get();
        record_injection("JsonCompose");
        let after = INSTRUCTIONS_INJECTED_TOTAL
            .with_label_values(&["JsonCompose"])
            .get();
        assert!(after >= before + 1.0);
    }
}
