// tests/metrics_stream.rs
#![cfg(feature = "strict-metrics")]

mod common;

use std::sync::Arc;
use std::time::Duration;

use axum::body::{self, Body};
use axum::http::{Request, StatusCode};
use tower::ServiceExt;

use common::*;
use stream_sentiment::ingest::session::StreamSession;
use stream_sentiment::metrics::Metrics;
use stream_sentiment::store::MemoryStore;

#[tokio::test]
async fn metrics_exposed_after_session() {
    let metrics = Metrics::init().expect("recorder");

    let p = pipeline(
        Arc::new(CountingClassifier::default()),
        Arc::new(MemoryStore::new()),
    );
    let (feed, _log) = ScriptedFeed::new(vec![
        Step::Event(post("I love this policy")),
        Step::Event(repost("policy again")),
    ]);
    let session = StreamSession::new("m", vec!["policy".into()], Duration::from_millis(200));
    let _ = p.run(&ScriptedProvider::new(feed), session).await;

    let resp = metrics
        .router()
        .oneshot(Request::get("/metrics").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let body = body::to_bytes(resp.into_body(), 1_048_576).await.unwrap();
    let text = String::from_utf8_lossy(&body);

    assert!(text.contains("stream_events_total"));
    assert!(text.contains("stream_persisted_total"));
    assert!(text.contains("stream_dropped_total"));
    assert!(text.contains("reason=\"repost\""));
    assert!(text.contains("stream_classify_ms"));
}
