// src/lib.rs
// Public library surface for the service binary, the capture CLI and integration tests.

pub mod api;
pub mod config;
pub mod credentials;
pub mod feed;
pub mod ingest;
pub mod metrics;
pub mod sentiment;
pub mod store;
pub mod summary;

use std::sync::Arc;
use std::time::Duration;

use tracing::info;
use tracing_subscriber::EnvFilter;

pub use crate::api::router;
pub use crate::ingest::{Pipeline, PipelineConfig};

use crate::config::StreamConfig;
use crate::store::JsonlStore;

pub const DEFAULT_LOG_FILTER: &str = "stream=info,warn";

/// `RUST_LOG` when set and valid, otherwise [`DEFAULT_LOG_FILTER`].
pub fn log_filter() -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER))
}

/// Wire the classifier and the JSONL store from a loaded config.
pub fn build_pipeline(cfg: &StreamConfig) -> anyhow::Result<Pipeline> {
    let classifier = sentiment::build_classifier(&cfg.classifier)?;
    let store = Arc::new(JsonlStore::new(cfg.data_dir.clone()));
    info!(
        target: "stream",
        classifier = classifier.name(),
        data_dir = %cfg.data_dir.display(),
        "pipeline ready"
    );
    Ok(Pipeline::new(
        classifier,
        store,
        PipelineConfig {
            backoff: Duration::from_secs(cfg.backoff_secs),
            language: cfg.language.clone(),
        },
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[serial_test::serial]
    #[test]
    fn log_filter_defaults_without_rust_log() {
        std::env::remove_var("RUST_LOG");
        let f = log_filter().to_string();
        assert!(f.contains("stream=info"), "got {f}");
        assert!(f.contains("warn"), "got {f}");
    }

    #[serial_test::serial]
    #[test]
    fn log_filter_honours_rust_log() {
        std::env::set_var("RUST_LOG", "stream=debug");
        let f = log_filter().to_string();
        std::env::remove_var("RUST_LOG");
        assert!(f.contains("stream=debug"), "got {f}");
    }
}
