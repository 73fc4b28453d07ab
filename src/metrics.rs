// src/metrics.rs
use axum::{http::header, response::IntoResponse, routing::get, Router};
use metrics_exporter_prometheus::{Matcher, PrometheusBuilder, PrometheusHandle};

/// Classifier latency buckets (ms): the lexicon answers in microseconds, the
/// hosted model in hundreds of milliseconds.
const CLASSIFY_MS_BUCKETS: &[f64] = &[0.1, 1.0, 5.0, 25.0, 100.0, 250.0, 500.0, 1_000.0, 5_000.0];

pub struct Metrics {
    pub handle: PrometheusHandle,
}

impl Metrics {
    /// Install the process-wide Prometheus recorder. Fails if one is already set.
    pub fn init() -> anyhow::Result<Self> {
        let handle = PrometheusBuilder::new()
            .set_buckets_for_metric(
                Matcher::Full("stream_classify_ms".to_string()),
                CLASSIFY_MS_BUCKETS,
            )?
            .install_recorder()?;
        Ok(Self { handle })
    }

    /// `/metrics` in the Prometheus text exposition format.
    pub fn router(&self) -> Router {
        let handle = self.handle.clone();
        Router::new().route(
            "/metrics",
            get(move || {
                let body = handle.render();
                async move {
                    (
                        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
                        body,
                    )
                        .into_response()
                }
            }),
        )
    }
}
