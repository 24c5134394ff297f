//! Metrics collection and exposition.
//!
//! # Metrics
//! - `proxy_requests_total` (counter): requests by method, cache outcome, status
//! - `proxy_request_duration_seconds` (histogram): end-to-end latency
//! - `proxy_upstream_errors_total` (counter): failed backend calls by kind
//! - `proxy_cache_store_errors_total` (counter): cache failures by operation
//! - `proxy_backend_active_connections` (gauge): in-flight calls per backend
//! - `proxy_backend_health` (gauge): 1=healthy, 0=unhealthy
//!
//! Recording is a no-op until [`init_metrics`] installs the exporter.

use std::net::SocketAddr;
use std::time::Instant;

use axum::http::Method;
use metrics::{counter, describe_counter, describe_gauge, describe_histogram, gauge, histogram};
use metrics_exporter_prometheus::{BuildError, PrometheusBuilder};

/// Install the Prometheus recorder and serve `/metrics` on `addr`.
pub fn init_metrics(addr: SocketAddr) -> Result<(), BuildError> {
    PrometheusBuilder::new().with_http_listener(addr).install()?;

    describe_counter!("proxy_requests_total", "Requests handled by the proxy");
    describe_histogram!(
        "proxy_request_duration_seconds",
        "End-to-end request latency in seconds"
    );
    describe_counter!("proxy_upstream_errors_total", "Failed backend calls");
    describe_counter!("proxy_cache_store_errors_total", "Failed cache store operations");
    describe_gauge!(
        "proxy_backend_active_connections",
        "In-flight requests per backend"
    );
    describe_gauge!("proxy_backend_health", "Backend health (1 = healthy)");

    tracing::info!(address = %addr, "Prometheus exporter listening");
    Ok(())
}

/// Label for `method`; extension methods share `OTHER` so clients cannot
/// mint new series.
pub fn method_label(method: &Method) -> &'static str {
    match method.as_str() {
        "GET" => "GET",
        "HEAD" => "HEAD",
        "POST" => "POST",
        "PUT" => "PUT",
        "DELETE" => "DELETE",
        "PATCH" => "PATCH",
        "OPTIONS" => "OPTIONS",
        "CONNECT" => "CONNECT",
        "TRACE" => "TRACE",
        _ => "OTHER",
    }
}

pub fn record_request(method: &Method, cache: &'static str, status: u16, start: Instant) {
    counter!(
        "proxy_requests_total",
        "method" => method_label(method),
        "cache" => cache,
        "status" => status.to_string()
    )
    .increment(1);
    histogram!("proxy_request_duration_seconds", "cache" => cache)
        .record(start.elapsed().as_secs_f64());
}

pub fn record_upstream_error(kind: &'static str) {
    counter!("proxy_upstream_errors_total", "kind" => kind).increment(1);
}

pub fn record_cache_error(op: &'static str) {
    counter!("proxy_cache_store_errors_total", "op" => op).increment(1);
}

pub fn record_active_connections(backend: &str, active: usize) {
    gauge!("proxy_backend_active_connections", "backend" => backend.to_string()).set(active as f64);
}

pub fn record_backend_health(backend: &str, healthy: bool) {
    gauge!("proxy_backend_health", "backend" => backend.to_string())
        .set(if healthy { 1.0 } else { 0.0 });
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_method_label_bounded() {
        assert_eq!(method_label(&Method::GET), "GET");
        assert_eq!(method_label(&Method::PATCH), "PATCH");
        let custom = Method::from_bytes(b"PURGE").unwrap();
        assert_eq!(method_label(&custom), "OTHER");
        let random = Method::from_bytes(b"X-RANDOM-1234").unwrap();
        assert_eq!(method_label(&random), "OTHER");
    }

    #[test]
    fn test_recording_without_exporter_is_noop() {
        record_request(&Method::from_bytes(b"BREW").unwrap(), "MISS", 200, Instant::now());
        record_cache_error("get");
    }
}
