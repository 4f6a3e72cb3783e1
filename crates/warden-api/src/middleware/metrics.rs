//! Prometheus request metrics.
//!
//! HTTP counters and latency are recorded by a middleware sitting outside
//! the policy pipeline; token issuance and rotation counters are bumped by
//! the auth handlers. `/metrics` gathers the registry in text exposition
//! format.

use std::sync::Arc;
use std::time::Instant;

use axum::extract::Request;
use axum::middleware::Next;
use axum::response::Response;
use prometheus::{Encoder, HistogramVec, IntCounter, IntCounterVec, Opts, Registry, TextEncoder};

/// Shared metrics state backed by a Prometheus registry.
#[derive(Clone)]
pub struct ApiMetrics {
    inner: Arc<Inner>,
}

struct Inner {
    registry: Registry,
    http_requests_total: IntCounterVec,
    http_request_duration_seconds: HistogramVec,
    http_errors_total: IntCounterVec,
    tokens_issued_total: IntCounter,
    tokens_rotated_total: IntCounter,
    rate_limited_total: IntCounter,
}

impl ApiMetrics {
    pub fn new() -> Self {
        let registry = Registry::new();

        let http_requests_total = IntCounterVec::new(
            Opts::new("warden_http_requests_total", "Total HTTP requests"),
            &["method", "path", "status"],
        )
        .expect("metric can be created");

        let http_request_duration_seconds = HistogramVec::new(
            prometheus::HistogramOpts::new(
                "warden_http_request_duration_seconds",
                "HTTP request duration in seconds",
            )
            .buckets(vec![0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5]),
            &["method", "path"],
        )
        .expect("metric can be created");

        let http_errors_total = IntCounterVec::new(
            Opts::new("warden_http_errors_total", "Total HTTP errors (4xx and 5xx)"),
            &["method", "path", "status"],
        )
        .expect("metric can be created");

        let tokens_issued_total = IntCounter::new(
            "warden_tokens_issued_total",
            "Token triples issued by login and refresh",
        )
        .expect("metric can be created");

        let tokens_rotated_total = IntCounter::new(
            "warden_tokens_rotated_total",
            "Refresh tokens successfully rotated",
        )
        .expect("metric can be created");

        let rate_limited_total = IntCounter::new(
            "warden_rate_limited_total",
            "Requests rejected by the rate limiter",
        )
        .expect("metric can be created");

        registry
            .register(Box::new(http_requests_total.clone()))
            .expect("metric can be registered");
        registry
            .register(Box::new(http_request_duration_seconds.clone()))
            .expect("metric can be registered");
        registry
            .register(Box::new(http_errors_total.clone()))
            .expect("metric can be registered");
        registry
            .register(Box::new(tokens_issued_total.clone()))
            .expect("metric can be registered");
        registry
            .register(Box::new(tokens_rotated_total.clone()))
            .expect("metric can be registered");
        registry
            .register(Box::new(rate_limited_total.clone()))
            .expect("metric can be registered");

        Self {
            inner: Arc::new(Inner {
                registry,
                http_requests_total,
                http_request_duration_seconds,
                http_errors_total,
                tokens_issued_total,
                tokens_rotated_total,
                rate_limited_total,
            }),
        }
    }

    fn record_request(&self, method: &str, path: &str, status: u16, duration_secs: f64) {
        let status_str = status.to_string();
        self.inner
            .http_requests_total
            .with_label_values(&[method, path, &status_str])
            .inc();
        self.inner
            .http_request_duration_seconds
            .with_label_values(&[method, path])
            .observe(duration_secs);
        if status >= 400 {
            self.inner
                .http_errors_total
                .with_label_values(&[method, path, &status_str])
                .inc();
        }
        if status == 429 {
            self.inner.rate_limited_total.inc();
        }
    }

    pub fn token_issued(&self) {
        self.inner.tokens_issued_total.inc();
    }

    pub fn token_rotated(&self) {
        self.inner.tokens_rotated_total.inc();
    }

    /// Gather all metrics in Prometheus text exposition format.
    pub fn gather_and_encode(&self) -> Result<String, String> {
        let encoder = TextEncoder::new();
        let families = self.inner.registry.gather();
        let mut buffer = Vec::new();
        encoder
            .encode(&families, &mut buffer)
            .map_err(|e| format!("failed to encode metrics: {e}"))?;
        String::from_utf8(buffer)
            .map_err(|e| format!("metrics encoding produced invalid UTF-8: {e}"))
    }
}

impl Default for ApiMetrics {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for ApiMetrics {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApiMetrics").finish_non_exhaustive()
    }
}

/// Records HTTP metrics from the request extension installed in `lib.rs`.
pub async fn metrics_middleware(request: Request, next: Next) -> Response {
    let metrics = request.extensions().get::<ApiMetrics>().cloned();
    let method = request.method().to_string();
    let path = request.uri().path().to_string();
    let start = Instant::now();

    let response = next.run(request).await;

    if let Some(metrics) = metrics {
        metrics.record_request(
            &method,
            &path,
            response.status().as_u16(),
            start.elapsed().as_secs_f64(),
        );
    }
    response
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counters_start_at_zero_and_encode() {
        let metrics = ApiMetrics::new();
        metrics.record_request("GET", "/api/v1/auth/token", 200, 0.01);
        metrics.record_request("POST", "/api/v1/security/sign", 429, 0.002);
        metrics.token_issued();
        metrics.token_rotated();

        let text = metrics.gather_and_encode().unwrap();
        assert!(text.contains("warden_http_requests_total"));
        assert!(text.contains("warden_http_errors_total"));
        assert!(text.contains("warden_tokens_issued_total 1"));
        assert!(text.contains("warden_rate_limited_total 1"));
    }

    #[test]
    fn clones_share_the_registry() {
        let metrics = ApiMetrics::new();
        metrics.clone().token_issued();
        let text = metrics.gather_and_encode().unwrap();
        assert!(text.contains("warden_tokens_issued_total 1"));
    }
}
