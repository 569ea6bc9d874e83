//! Metrics collection and exposition.
//!
//! # Metrics
//! - `http_requests_total` (counter): requests by engine, method, status
//! - `http_request_duration_seconds` (histogram): handler latency by engine
//! - `http_response_bytes_total` (counter): body bytes written by engine
//! - `http_active_connections` (gauge): current connection count
//!
//! # Design Decisions
//! - Recording is a no-op until a recorder is installed
//! - Labels stay low-cardinality: no paths, extension methods collapse to `OTHER`

use std::net::SocketAddr;
use std::time::Instant;

use metrics::{counter, gauge, histogram};
use metrics_exporter_prometheus::{BuildError, PrometheusBuilder};

/// Install the Prometheus recorder and its scrape endpoint.
pub fn init_metrics(addr: SocketAddr) -> Result<(), BuildError> {
    PrometheusBuilder::new().with_http_listener(addr).install()?;
    tracing::info!(address = %addr, "Metrics endpoint started");
    Ok(())
}

/// Record one completed request.
pub fn record_request(engine: &'static str, method: &str, status: u16, bytes: u64, start: Instant) {
    counter!(
        "http_requests_total",
        "engine" => engine,
        "method" => method_label(method),
        "status" => status.to_string()
    )
    .increment(1);
    histogram!("http_request_duration_seconds", "engine" => engine)
        .record(start.elapsed().as_secs_f64());
    counter!("http_response_bytes_total", "engine" => engine).increment(bytes);
}

/// Metric label for a request method. Extension methods share one label.
fn method_label(method: &str) -> &'static str {
    match method {
        "GET" => "GET",
        "HEAD" => "HEAD",
        "POST" => "POST",
        "PUT" => "PUT",
        "DELETE" => "DELETE",
        "CONNECT" => "CONNECT",
        "OPTIONS" => "OPTIONS",
        "TRACE" => "TRACE",
        "PATCH" => "PATCH",
        _ => "OTHER",
    }
}

pub(crate) fn connection_opened() {
    gauge!("http_active_connections").increment(1.0);
}

pub(crate) fn connection_closed() {
    gauge!("http_active_connections").decrement(1.0);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn standard_methods_keep_their_label() {
        assert_eq!(method_label("GET"), "GET");
        assert_eq!(method_label("PATCH"), "PATCH");
    }

    #[test]
    fn extension_methods_share_a_label() {
        assert_eq!(method_label("PROPFIND"), "OTHER");
        assert_eq!(method_label("X-RANDOM-1234"), "OTHER");
        assert_eq!(method_label("get"), "OTHER");
    }

    #[test]
    fn recording_without_recorder_is_a_noop() {
        record_request("standard", "BREW", 418, 0, Instant::now());
    }
}
