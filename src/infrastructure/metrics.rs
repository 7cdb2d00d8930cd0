//! Prometheus metrics.
//!
//! All metric names are stable and recorded through the `metrics` facade;
//! the Prometheus recorder installed by [`install_recorder`] renders them for
//! `GET /metrics`. Recording without an installed recorder is a no-op.
//!
//! # Metrics
//!
//! - `http_requests_total` (counter): method, path, status
//! - `http_request_duration_seconds` (histogram): method, path, status
//! - `http_slow_requests_total` (counter): method, path
//! - `http_errors_total` (counter): method, path, status
//! - `http_active_requests` (gauge)
//! - `cache_hits_total` / `cache_misses_total` (counter): cache
//! - `db_queries_total` (counter), `db_query_duration_seconds` (histogram),
//!   `db_query_errors_total` (counter): operation, table
//! - `db_pool_connections` (gauge): state
//! - `auth_attempts_total` (counter): outcome
//! - `auth_token_validations_total` (counter): result
//! - `prescriptions_created_total` (counter): kind
//! - `orders_placed_total` (counter): payment_method
//! - `rate_limit_rejections_total` (counter): code

use metrics::{counter, describe_counter, describe_gauge, describe_histogram, gauge, histogram};
use metrics_exporter_prometheus::{BuildError, Matcher, PrometheusBuilder, PrometheusHandle};
use std::time::Duration;

/// Latency buckets in seconds for HTTP and database histograms.
const LATENCY_BUCKETS: &[f64] = &[
    0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0,
];

/// Installs the global Prometheus recorder and describes every metric.
///
/// # Errors
///
/// Returns [`BuildError`] if a recorder is already installed.
pub fn install_recorder() -> Result<PrometheusHandle, BuildError> {
    let handle = builder()?.install_recorder()?;
    describe_all();
    Ok(handle)
}

fn builder() -> Result<PrometheusBuilder, BuildError> {
    PrometheusBuilder::new()
        .set_buckets_for_metric(
            Matcher::Full("http_request_duration_seconds".to_string()),
            LATENCY_BUCKETS,
        )?
        .set_buckets_for_metric(
            Matcher::Full("db_query_duration_seconds".to_string()),
            LATENCY_BUCKETS,
        )
}

/// Registers help text for every metric family.
pub fn describe_all() {
    describe_counter!("http_requests_total", "Total HTTP requests");
    describe_histogram!(
        "http_request_duration_seconds",
        metrics::Unit::Seconds,
        "HTTP request latency"
    );
    describe_counter!(
        "http_slow_requests_total",
        "Requests slower than the slow-request threshold"
    );
    describe_counter!("http_errors_total", "HTTP responses with a 5xx status");
    describe_gauge!("http_active_requests", "Requests currently in flight");
    describe_counter!("cache_hits_total", "Cache lookups that returned a value");
    describe_counter!("cache_misses_total", "Cache lookups that returned nothing");
    describe_counter!("db_queries_total", "Database queries executed");
    describe_histogram!(
        "db_query_duration_seconds",
        metrics::Unit::Seconds,
        "Database query latency"
    );
    describe_counter!("db_query_errors_total", "Database queries that failed");
    describe_gauge!("db_pool_connections", "Database pool connections by state");
    describe_counter!("auth_attempts_total", "Authentication attempts by outcome");
    describe_counter!(
        "auth_token_validations_total",
        "Bearer token validations by result"
    );
    describe_counter!("prescriptions_created_total", "Prescriptions created");
    describe_counter!("orders_placed_total", "Orders placed");
    describe_counter!(
        "rate_limit_rejections_total",
        "Requests rejected by a rate limiter"
    );
}

pub fn record_http_request(method: &str, path: &str, status: u16, elapsed: Duration) {
    let labels = [
        ("method", method.to_string()),
        ("path", path.to_string()),
        ("status", status.to_string()),
    ];
    counter!("http_requests_total", &labels).increment(1);
    histogram!("http_request_duration_seconds", &labels).record(elapsed.as_secs_f64());
}

pub fn record_slow_request(method: &str, path: &str) {
    counter!(
        "http_slow_requests_total",
        "method" => method.to_string(),
        "path" => path.to_string()
    )
    .increment(1);
}

pub fn record_http_error(method: &str, path: &str, status: u16) {
    counter!(
        "http_errors_total",
        "method" => method.to_string(),
        "path" => path.to_string(),
        "status" => status.to_string()
    )
    .increment(1);
}

/// Keeps `http_active_requests` incremented while alive.
///
/// Dropping the guard decrements the gauge, so cancelled requests are
/// accounted for as well.
#[must_use]
pub struct ActiveRequestGuard(());

impl ActiveRequestGuard {
    pub fn new() -> Self {
        gauge!("http_active_requests").increment(1.0);
        Self(())
    }
}

impl Default for ActiveRequestGuard {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for ActiveRequestGuard {
    fn drop(&mut self) {
        gauge!("http_active_requests").decrement(1.0);
    }
}

pub fn record_cache_access(cache: &str, hit: bool) {
    if hit {
        counter!("cache_hits_total", "cache" => cache.to_string()).increment(1);
    } else {
        counter!("cache_misses_total", "cache" => cache.to_string()).increment(1);
    }
}

pub fn record_db_query(operation: &str, table: &str, elapsed: Duration, success: bool) {
    let labels = [
        ("operation", operation.to_string()),
        ("table", table.to_string()),
    ];
    counter!("db_queries_total", &labels).increment(1);
    histogram!("db_query_duration_seconds", &labels).record(elapsed.as_secs_f64());
    if !success {
        counter!("db_query_errors_total", &labels).increment(1);
    }
}

/// Sets the pool gauge for `state` (e.g. `active`, `idle`).
pub fn set_db_pool_connections(state: &str, count: u32) {
    gauge!("db_pool_connections", "state" => state.to_string()).set(f64::from(count));
}

pub fn record_auth_attempt(outcome: &str) {
    counter!("auth_attempts_total", "outcome" => outcome.to_string()).increment(1);
}

pub fn record_token_validation(valid: bool) {
    let result = if valid { "valid" } else { "invalid" };
    counter!("auth_token_validations_total", "result" => result).increment(1);
}

pub fn record_prescription_created(kind: &str) {
    counter!("prescriptions_created_total", "kind" => kind.to_string()).increment(1);
}

pub fn record_order_placed(payment_method: &str) {
    counter!(
        "orders_placed_total",
        "payment_method" => payment_method.to_string()
    )
    .increment(1);
}

pub fn record_rate_limit_rejection(code: &str) {
    counter!("rate_limit_rejections_total", "code" => code.to_string()).increment(1);
}

#[cfg(test)]
mod tests {
    use super::*;

    fn render_with(f: impl FnOnce()) -> String {
        let recorder = builder().unwrap().build_recorder();
        let handle = recorder.handle();
        metrics::with_local_recorder(&recorder, f);
        handle.render()
    }

    #[test]
    fn test_http_request_metrics() {
        let output = render_with(|| {
            record_http_request("GET", "/orders/{id}", 200, Duration::from_millis(40));
            record_slow_request("GET", "/orders/{id}");
            record_http_error("POST", "/orders", 503);
        });

        assert!(output.contains(
            r#"http_requests_total{method="GET",path="/orders/{id}",status="200"} 1"#
        ));
        assert!(output.contains("http_request_duration_seconds_bucket"));
        assert!(output.contains("http_slow_requests_total"));
        assert!(output.contains(r#"http_errors_total{method="POST",path="/orders",status="503"} 1"#));
    }

    #[test]
    fn test_active_request_guard() {
        let output = render_with(|| {
            let _a = ActiveRequestGuard::new();
            let b = ActiveRequestGuard::new();
            drop(b);
        });

        assert!(output.contains("http_active_requests 1"));
    }

    #[test]
    fn test_domain_counters() {
        let output = render_with(|| {
            record_cache_access("prescriptions", true);
            record_cache_access("prescriptions", false);
            record_db_query("select", "orders", Duration::from_millis(3), false);
            set_db_pool_connections("idle", 4);
            record_auth_attempt("success");
            record_token_validation(false);
            record_prescription_created("electronic");
            record_order_placed("card");
            record_rate_limit_rejection("AUTH_RATE_LIMIT_EXCEEDED");
        });

        for name in [
            "cache_hits_total",
            "cache_misses_total",
            "db_queries_total",
            "db_query_errors_total",
            "db_pool_connections",
            "auth_attempts_total",
            "auth_token_validations_total",
            "prescriptions_created_total",
            "orders_placed_total",
            "rate_limit_rejections_total",
        ] {
            assert!(output.contains(name), "missing {name}");
        }
    }
}
