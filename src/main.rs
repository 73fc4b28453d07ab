//! Stream Sentiment Service: binary entrypoint.
//! Boots the Axum HTTP server: capture sessions, collection queries and `/metrics`.

use std::sync::Arc;

use shuttle_axum::ShuttleAxum;
use tracing_subscriber::{fmt, prelude::*};

use stream_sentiment::api::AppState;
use stream_sentiment::config::StreamConfig;
use stream_sentiment::credentials::EnvCredentials;
use stream_sentiment::metrics::Metrics;
use stream_sentiment::{build_pipeline, log_filter, router};

/// Compact logs; `RUST_LOG` overrides the default filter.
fn init_tracing() {
    // Shuttle may already have installed a subscriber.
    let _ = tracing_subscriber::registry()
        .with(log_filter())
        .with(fmt::layer().compact())
        .try_init();
}

#[shuttle_runtime::main]
async fn axum() -> ShuttleAxum {
    // Load .env in local/dev; no-op in prod environments.
    // API_KEY / API_SEC / ACS_TOK / ACS_TOK_SEC and STREAM_* come from here.
    let _ = dotenvy::dotenv();

    init_tracing();

    let cfg = StreamConfig::load_default()?;
    let pipeline = build_pipeline(&cfg)?;
    let credentials = Arc::new(EnvCredentials::new(cfg.endpoint.clone()));

    let mut app = router(AppState::new(pipeline, credentials));
    match Metrics::init() {
        Ok(m) => app = app.merge(m.router()),
        Err(e) => tracing::warn!(target: "stream", error = %e, "metrics exporter not installed"),
    }

    Ok(app.into())
}
