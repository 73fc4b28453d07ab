// tests/common/mod.rs
//
// Scripted feed, credential provider and classifier doubles shared by the
// integration tests. Nothing here touches the network.
#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::json;

use stream_sentiment::credentials::{AuthError, CredentialProvider};
use stream_sentiment::feed::{FeedError, FeedHandle, FeedTransport, StreamFilter};
use stream_sentiment::ingest::types::RawEvent;
use stream_sentiment::sentiment::lexicon::LexiconClassifier;
use stream_sentiment::sentiment::{ClassifyError, Sentiment, SentimentClassifier, SharedClassifier};
use stream_sentiment::store::SharedStore;
use stream_sentiment::{Pipeline, PipelineConfig};

pub const FEED_TIME: &str = "Wed Oct 10 20:19:24 +0000 2018";

/// One scripted item the feed hands out on `next_event`.
pub enum Step {
    Event(RawEvent),
    Error(FeedError),
    /// Transport terminated.
    End,
}

/// What the pipeline did with the feed.
#[derive(Default)]
pub struct FeedLog {
    pub opened_with: Mutex<Vec<StreamFilter>>,
    pub closed: AtomicUsize,
}

impl FeedLog {
    pub fn opens(&self) -> Vec<StreamFilter> {
        self.opened_with.lock().unwrap().clone()
    }

    pub fn close_count(&self) -> usize {
        self.closed.load(Ordering::SeqCst)
    }
}

/// Plays `steps` in order, then idles until the pipeline stops polling.
pub struct ScriptedFeed {
    open_results: VecDeque<Result<(), FeedError>>,
    steps: VecDeque<Step>,
    log: Arc<FeedLog>,
}

impl ScriptedFeed {
    pub fn new(steps: Vec<Step>) -> (Self, Arc<FeedLog>) {
        let log = Arc::new(FeedLog::default());
        (
            Self {
                open_results: VecDeque::new(),
                steps: steps.into(),
                log: log.clone(),
            },
            log,
        )
    }

    /// Results for successive `open` calls; once exhausted, opens succeed.
    pub fn with_open_results(mut self, results: Vec<Result<(), FeedError>>) -> Self {
        self.open_results = results.into();
        self
    }
}

#[async_trait]
impl FeedTransport for ScriptedFeed {
    async fn open(&mut self, filter: &StreamFilter) -> Result<(), FeedError> {
        self.log.opened_with.lock().unwrap().push(filter.clone());
        self.open_results.pop_front().unwrap_or(Ok(()))
    }

    async fn next_event(&mut self) -> Option<Result<RawEvent, FeedError>> {
        match self.steps.pop_front() {
            Some(Step::Event(ev)) => Some(Ok(ev)),
            Some(Step::Error(e)) => Some(Err(e)),
            Some(Step::End) => None,
            None => std::future::pending().await,
        }
    }

    async fn close(&mut self) {
        self.log.closed.fetch_add(1, Ordering::SeqCst);
    }
}

/// Hands out the scripted feed once; without one it behaves like missing secrets.
pub struct ScriptedProvider {
    feed: Mutex<Option<ScriptedFeed>>,
}

impl ScriptedProvider {
    pub fn new(feed: ScriptedFeed) -> Self {
        Self {
            feed: Mutex::new(Some(feed)),
        }
    }

    pub fn without_secrets() -> Self {
        Self {
            feed: Mutex::new(None),
        }
    }
}

impl CredentialProvider for ScriptedProvider {
    fn authenticate(&self) -> Result<FeedHandle, AuthError> {
        match self.feed.lock().unwrap().take() {
            Some(feed) => Ok(Box::new(feed)),
            None => Err(AuthError::MissingSecret("API_KEY")),
        }
    }
}

/// Lexicon classifier that records every text it is asked about.
#[derive(Default)]
pub struct CountingClassifier {
    inner: LexiconClassifier,
    pub seen: Mutex<Vec<String>>,
}

impl CountingClassifier {
    pub fn calls(&self) -> usize {
        self.seen.lock().unwrap().len()
    }
}

#[async_trait]
impl SentimentClassifier for CountingClassifier {
    async fn classify(&self, text: &str) -> Result<Sentiment, ClassifyError> {
        self.seen.lock().unwrap().push(text.to_string());
        self.inner.classify(text).await
    }

    fn name(&self) -> &'static str {
        "counting"
    }
}

pub struct FailingClassifier;

#[async_trait]
impl SentimentClassifier for FailingClassifier {
    async fn classify(&self, _text: &str) -> Result<Sentiment, ClassifyError> {
        Err(ClassifyError::Unavailable("model loading".into()))
    }

    fn name(&self) -> &'static str {
        "failing"
    }
}

pub fn pipeline(classifier: SharedClassifier, store: SharedStore) -> Pipeline {
    Pipeline::new(
        classifier,
        store,
        PipelineConfig {
            backoff: Duration::from_millis(20),
            language: "en".into(),
        },
    )
}

/// Plain post: no geo, profile location set.
pub fn post(text: &str) -> RawEvent {
    serde_json::from_value(json!({
        "text": text,
        "truncated": false,
        "created_at": FEED_TIME,
        "user": { "id_str": "42", "followers_count": 1200, "location": "Prague" }
    }))
    .unwrap()
}

pub fn repost(text: &str) -> RawEvent {
    let mut ev = post(text);
    ev.retweeted_status = Some(json!({ "text": text }));
    ev
}
