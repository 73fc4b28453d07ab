// src/ingest/mod.rs
//! Streaming ingestion pipeline.
//!
//! Each event runs Normalizer → Matcher → Classifier → Store, one at a time and in
//! arrival order. Classification only happens for posts that matched a keyword.

pub mod matcher;
pub mod normalize;
pub mod session;
pub mod types;

use std::time::{Duration, Instant};

use metrics::{counter, describe_counter, describe_gauge, describe_histogram, gauge, histogram};
use once_cell::sync::OnceCell;
use tokio::sync::watch;
use tokio::time::{sleep_until, Instant as TokioInstant, MissedTickBehavior};
use tracing::{debug, info, warn};

use crate::credentials::{AuthError, CredentialProvider};
use crate::feed::{FeedError, FeedHandle, StreamFilter};
use crate::sentiment::SharedClassifier;
use crate::store::SharedStore;

use matcher::KeywordMatcher;
use normalize::{normalize, Dropped};
use session::{
    percent_elapsed, PipelineState, SessionHandle, SessionReport, SessionStatus, StreamSession,
};
use types::{ClassifiedPost, RawEvent};

/// The progress indicator advances in this many steps across the budget.
const PROGRESS_STEPS: u32 = 100;
const MIN_PROGRESS_PERIOD: Duration = Duration::from_millis(10);

/// One-time metrics registration (so series show up on /metrics).
fn ensure_metrics_described() {
    static ONCE: OnceCell<()> = OnceCell::new();
    ONCE.get_or_init(|| {
        describe_counter!("stream_events_total", "Raw events received from the feed.");
        describe_counter!("stream_persisted_total", "Classified posts written to the store.");
        describe_counter!(
            "stream_dropped_total",
            "Events dropped before persisting, by reason."
        );
        describe_counter!("stream_store_errors_total", "Store write failures.");
        describe_counter!(
            "stream_rate_limited_total",
            "Rate-limit signals received from the feed."
        );
        describe_counter!(
            "stream_transport_errors_total",
            "Non rate-limit transport errors."
        );
        describe_histogram!("stream_classify_ms", "Classifier latency in milliseconds.");
        describe_gauge!("stream_session_active", "1 while a capture session is running.");
    });
}

/// Short, stable id for a post body so logs never carry raw text.
pub fn anon_id(text: &str) -> String {
    use sha2::{Digest, Sha256};
    let digest = Sha256::digest(text.as_bytes());
    digest.iter().take(6).map(|b| format!("{b:02x}")).collect()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DropReason {
    Repost,
    Malformed,
    Unmatched,
    ClassifyFailed,
}

impl DropReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            DropReason::Repost => "repost",
            DropReason::Malformed => "malformed",
            DropReason::Unmatched => "unmatched",
            DropReason::ClassifyFailed => "classify_failed",
        }
    }
}

impl From<Dropped> for DropReason {
    fn from(d: Dropped) -> Self {
        match d {
            Dropped::Repost => DropReason::Repost,
            Dropped::Malformed(_) => DropReason::Malformed,
        }
    }
}

/// What happened to a single event.
#[derive(Debug, Clone, PartialEq)]
pub enum EventOutcome {
    Persisted(ClassifiedPost),
    Dropped(DropReason),
    /// Classified but the write failed; the record is lost.
    StoreFailed,
}

#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Fixed pause after a rate-limit signal.
    pub backoff: Duration,
    pub language: String,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            backoff: Duration::from_secs(5),
            language: "en".to_string(),
        }
    }
}

/// Owns the constructed-once collaborators shared by every session it starts.
#[derive(Clone)]
pub struct Pipeline {
    classifier: SharedClassifier,
    store: SharedStore,
    cfg: PipelineConfig,
}

impl Pipeline {
    pub fn new(classifier: SharedClassifier, store: SharedStore, cfg: PipelineConfig) -> Self {
        ensure_metrics_described();
        Self {
            classifier,
            store,
            cfg,
        }
    }

    pub fn store(&self) -> &SharedStore {
        &self.store
    }

    /// Authenticate, then drive the session on its own task. Auth failures are
    /// returned here and no stream is opened.
    pub fn start(
        &self,
        provider: &dyn CredentialProvider,
        session: StreamSession,
    ) -> Result<SessionHandle, AuthError> {
        let transport = provider.authenticate()?;
        let (tx, rx) = watch::channel(SessionStatus {
            state: PipelineState::Connecting,
            ..SessionStatus::idle()
        });
        let pipeline = self.clone();
        let join = tokio::spawn(async move { pipeline.drive(transport, session, tx).await });
        Ok(SessionHandle { status: rx, join })
    }

    /// Same as [`Pipeline::start`] but runs on the calling task.
    pub async fn run(
        &self,
        provider: &dyn CredentialProvider,
        session: StreamSession,
    ) -> Result<SessionReport, AuthError> {
        let transport = provider.authenticate()?;
        let (tx, _rx) = watch::channel(SessionStatus::idle());
        Ok(self.drive(transport, session, tx).await)
    }

    /// Normalize → match → classify → write, for one event.
    pub async fn process_event(
        &self,
        matcher: &KeywordMatcher,
        collection: &str,
        ev: &RawEvent,
    ) -> EventOutcome {
        let post = match normalize(ev) {
            Ok(p) => p,
            Err(d) => {
                debug!(target: "stream", reason = d.reason(), detail = ?d, "event dropped");
                return EventOutcome::Dropped(d.into());
            }
        };
        let id = anon_id(&post.text);

        let Some(subject) = matcher.subject_for(&post.text).map(str::to_string) else {
            debug!(target: "stream", %id, "no keyword matched");
            return EventOutcome::Dropped(DropReason::Unmatched);
        };

        let t0 = Instant::now();
        let sentiment = match self.classifier.classify(&post.text).await {
            Ok(s) => s,
            Err(e) => {
                warn!(target: "stream", %id, error = %e, classifier = self.classifier.name(), "classification failed");
                return EventOutcome::Dropped(DropReason::ClassifyFailed);
            }
        };
        histogram!("stream_classify_ms").record(t0.elapsed().as_secs_f64() * 1_000.0);

        let record = ClassifiedPost {
            post,
            subject,
            sentiment,
        };
        match self.store.insert(collection, &record).await {
            Ok(()) => {
                debug!(target: "stream", %id, subject = %record.subject, label = %record.sentiment.label, "persisted");
                EventOutcome::Persisted(record)
            }
            Err(e) => {
                warn!(target: "stream", %id, collection, error = %e, "store write failed");
                EventOutcome::StoreFailed
            }
        }
    }

    async fn drive(
        &self,
        mut transport: FeedHandle,
        session: StreamSession,
        tx: watch::Sender<SessionStatus>,
    ) -> SessionReport {
        let started = TokioInstant::now();
        let deadline = started + session.budget;
        let matcher = KeywordMatcher::new(session.keywords.iter().cloned());
        let filter = StreamFilter {
            keywords: session.keywords.clone(),
            language: self.cfg.language.clone(),
        };
        let mut report = SessionReport::new(&session.collection);

        let period = (session.budget / PROGRESS_STEPS).max(MIN_PROGRESS_PERIOD);
        let mut ticker = tokio::time::interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        let publish = |state: PipelineState, report: &SessionReport| {
            tx.send_replace(SessionStatus {
                state,
                percent: percent_elapsed(started.elapsed(), session.budget),
                received: report.received,
                persisted: report.persisted,
            });
        };

        gauge!("stream_session_active").set(1.0);
        info!(
            target: "stream",
            collection = %session.collection,
            keywords = ?session.keywords,
            budget_secs = session.budget.as_secs(),
            "capture session started"
        );

        let mut state = PipelineState::Connecting;
        publish(state, &report);
        state = self.open(&mut transport, &filter, &mut report).await;

        loop {
            publish(state, &report);
            match state {
                PipelineState::Streaming => {
                    tokio::select! {
                        biased;
                        _ = sleep_until(deadline) => {
                            state = PipelineState::Draining;
                        }
                        _ = ticker.tick() => {}
                        item = transport.next_event() => {
                            state = self.on_item(item, &matcher, &session.collection, &mut report).await;
                        }
                    }
                }
                PipelineState::Backoff => {
                    let resume_at = TokioInstant::now() + self.cfg.backoff;
                    info!(target: "stream", backoff_ms = self.cfg.backoff.as_millis() as u64, "rate limited, pausing");
                    state = loop {
                        tokio::select! {
                            biased;
                            _ = sleep_until(deadline) => break PipelineState::Draining,
                            _ = sleep_until(resume_at) => {
                                break self.open(&mut transport, &filter, &mut report).await;
                            }
                            _ = ticker.tick() => publish(PipelineState::Backoff, &report),
                        }
                    };
                }
                PipelineState::Draining => {
                    transport.close().await;
                    state = PipelineState::Closed;
                }
                PipelineState::Closed => break,
                PipelineState::Idle | PipelineState::Connecting => {
                    state = self.open(&mut transport, &filter, &mut report).await;
                }
            }
        }

        if report.ended_early {
            // Terminated transports are still released explicitly.
            transport.close().await;
        }

        report.elapsed_ms = started.elapsed().as_millis() as u64;
        report.final_state = PipelineState::Closed;
        gauge!("stream_session_active").set(0.0);
        info!(
            target: "stream",
            collection = %report.collection,
            received = report.received,
            persisted = report.persisted,
            dropped = ?report.dropped,
            store_errors = report.store_errors,
            rate_limit_pauses = report.rate_limit_pauses,
            ended_early = report.ended_early,
            "capture session closed"
        );
        tx.send_replace(SessionStatus {
            state: PipelineState::Closed,
            percent: if report.ended_early {
                percent_elapsed(started.elapsed(), session.budget)
            } else {
                100
            },
            received: report.received,
            persisted: report.persisted,
        });
        report
    }

    /// Connecting/resume step: the same filter is used on every (re)open.
    async fn open(
        &self,
        transport: &mut FeedHandle,
        filter: &StreamFilter,
        report: &mut SessionReport,
    ) -> PipelineState {
        match transport.open(filter).await {
            Ok(()) => {
                info!(target: "stream", track = %filter.track_param(), language = %filter.language, "stream open");
                PipelineState::Streaming
            }
            Err(e) if e.is_rate_limit() => {
                counter!("stream_rate_limited_total").increment(1);
                report.rate_limit_pauses += 1;
                PipelineState::Backoff
            }
            Err(e) => {
                counter!("stream_transport_errors_total").increment(1);
                warn!(target: "stream", error = %e, "cannot open stream; stream ended early");
                report.transport_errors += 1;
                report.ended_early = true;
                PipelineState::Closed
            }
        }
    }

    async fn on_item(
        &self,
        item: Option<Result<RawEvent, FeedError>>,
        matcher: &KeywordMatcher,
        collection: &str,
        report: &mut SessionReport,
    ) -> PipelineState {
        match item {
            None => {
                warn!(target: "stream", "transport terminated; stream ended early");
                report.ended_early = true;
                PipelineState::Closed
            }
            Some(Err(e)) if e.is_rate_limit() => {
                counter!("stream_rate_limited_total").increment(1);
                report.rate_limit_pauses += 1;
                PipelineState::Backoff
            }
            Some(Err(FeedError::Malformed(e))) => {
                counter!("stream_events_total").increment(1);
                report.received += 1;
                self.tally(report, &EventOutcome::Dropped(DropReason::Malformed));
                debug!(target: "stream", error = %e, "malformed event dropped");
                PipelineState::Streaming
            }
            Some(Err(e)) => {
                // The transport reports termination through `None` on the next poll.
                counter!("stream_transport_errors_total").increment(1);
                report.transport_errors += 1;
                warn!(target: "stream", error = %e, "transport error");
                PipelineState::Streaming
            }
            Some(Ok(ev)) => {
                counter!("stream_events_total").increment(1);
                report.received += 1;
                let outcome = self.process_event(matcher, collection, &ev).await;
                self.tally(report, &outcome);
                PipelineState::Streaming
            }
        }
    }

    fn tally(&self, report: &mut SessionReport, outcome: &EventOutcome) {
        match outcome {
            EventOutcome::Persisted(_) => {
                counter!("stream_persisted_total").increment(1);
                report.persisted += 1;
            }
            EventOutcome::StoreFailed => {
                counter!("stream_store_errors_total").increment(1);
                report.store_errors += 1;
            }
            EventOutcome::Dropped(reason) => {
                counter!("stream_dropped_total", "reason" => reason.as_str()).increment(1);
                let d = &mut report.dropped;
                match reason {
                    DropReason::Repost => d.repost += 1,
                    DropReason::Malformed => d.malformed += 1,
                    DropReason::Unmatched => d.unmatched += 1,
                    DropReason::ClassifyFailed => d.classify_failed += 1,
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn anon_id_is_short_and_stable() {
        let a = anon_id("hello");
        assert_eq!(a.len(), 12);
        assert_eq!(a, anon_id("hello"));
        assert_ne!(a, anon_id("hello!"));
    }

    #[test]
    fn drop_reason_from_normalizer() {
        assert_eq!(DropReason::from(Dropped::Repost), DropReason::Repost);
        assert_eq!(
            DropReason::from(Dropped::Malformed("text")),
            DropReason::Malformed
        );
    }
}
