use anyhow::Result;
use axum::body::Body;
use axum::http::{header, HeaderValue, StatusCode};
use axum::response::Response;
use prometheus::{Encoder, IntCounterVec, Opts, Registry, TextEncoder};

/// Prometheus registry for the gatekeeper, scraped through [`GatekeeperMetrics::render`].
#[derive(Clone)]
pub struct GatekeeperMetrics {
    registry: Registry,
    http_errors_total: IntCounterVec,
}

impl GatekeeperMetrics {
    pub fn new() -> Result<Self> {
        let registry = Registry::new();

        let http_errors_total = IntCounterVec::new(
            Opts::new(
                "http_errors_total",
                "Count of HTTP error responses emitted (status >= 400)",
            ),
            &["code", "status"],
        )?;
        registry.register(Box::new(http_errors_total.clone()))?;

        Ok(Self {
            registry,
            http_errors_total,
        })
    }

    pub fn record_error(&self, code: &str, status: StatusCode) {
        self.http_errors_total
            .with_label_values(&[code, status.as_str()])
            .inc();
    }

    pub fn error_count(&self, code: &str, status: StatusCode) -> u64 {
        self.http_errors_total
            .with_label_values(&[code, status.as_str()])
            .get()
    }

    pub fn render(&self) -> Result<Response> {
        let encoder = TextEncoder::new();
        let metric_families = self.registry.gather();
        let mut buffer = Vec::new();
        encoder.encode(&metric_families, &mut buffer)?;
        let response = Response::builder()
            .status(StatusCode::OK)
            .header(
                header::CONTENT_TYPE,
                HeaderValue::from_static("text/plain; version=0.0.4"),
            )
            .body(Body::from(buffer))?;
        Ok(response)
    }
}
