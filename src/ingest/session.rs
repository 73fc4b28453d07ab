// src/ingest/session.rs
//! Capture session: the caller's request, the validated run-scoped session, and the
//! status/report the running pipeline publishes back.

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::watch;
use tokio::task::{JoinError, JoinHandle};

use crate::store::{validate_collection, Store, StoreError};

/// Durations a caller may pick, in minutes.
pub const ALLOWED_DURATIONS_MIN: [u64; 3] = [1, 5, 10];
pub const MAX_COLLECTION_CHARS: usize = 15;

#[derive(Debug, thiserror::Error)]
pub enum RequestError {
    #[error("collection name must be 1-{MAX_COLLECTION_CHARS} chars of letters, digits, '_' or '-'")]
    InvalidCollection(String),

    #[error("at least one keyword is required")]
    NoKeywords,

    #[error("duration must be one of 1, 5 or 10 minutes (got {0})")]
    InvalidDuration(u64),

    #[error("collection {0:?} already exists; confirm to append to it")]
    CollectionExists(String),

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// What a caller (UI form, CLI, HTTP) submits to start a capture.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionRequest {
    pub collection: String,
    /// Comma-separated keyword phrases.
    pub keywords: String,
    pub duration_minutes: u64,
    #[serde(default)]
    pub confirm_existing: bool,
}

impl SessionRequest {
    /// Shape checks only; see [`SessionRequest::admit`] for the store check.
    pub fn validate(&self) -> Result<StreamSession, RequestError> {
        let collection = self.collection.trim();
        if collection.chars().count() > MAX_COLLECTION_CHARS || validate_collection(collection).is_err() {
            return Err(RequestError::InvalidCollection(collection.to_string()));
        }

        let keywords = split_keywords(&self.keywords);
        if keywords.is_empty() {
            return Err(RequestError::NoKeywords);
        }

        if !ALLOWED_DURATIONS_MIN.contains(&self.duration_minutes) {
            return Err(RequestError::InvalidDuration(self.duration_minutes));
        }

        Ok(StreamSession::new(
            collection,
            keywords,
            Duration::from_secs(self.duration_minutes * 60),
        ))
    }

    /// Validate, then refuse to append into an existing collection unless confirmed.
    pub async fn admit(&self, store: &dyn Store) -> Result<StreamSession, RequestError> {
        let session = self.validate()?;
        let existing = store.list_collections().await?;
        if existing.contains(&session.collection) && !self.confirm_existing {
            return Err(RequestError::CollectionExists(session.collection));
        }
        Ok(session)
    }
}

/// Comma-separated phrases, trimmed, empties removed, order kept.
pub fn split_keywords(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|k| !k.is_empty())
        .map(str::to_string)
        .collect()
}

/// Run-scoped session state. Never persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamSession {
    pub collection: String,
    pub keywords: Vec<String>,
    pub budget: Duration,
}

impl StreamSession {
    pub fn new(collection: impl Into<String>, keywords: Vec<String>, budget: Duration) -> Self {
        Self {
            collection: collection.into(),
            keywords,
            budget,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PipelineState {
    Idle,
    Connecting,
    Streaming,
    Backoff,
    Draining,
    Closed,
}

/// Live snapshot published on the session's watch channel.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SessionStatus {
    pub state: PipelineState,
    /// Wall-clock share of the duration budget elapsed, 0..=100.
    pub percent: u8,
    pub received: u64,
    pub persisted: u64,
}

impl SessionStatus {
    pub fn idle() -> Self {
        Self {
            state: PipelineState::Idle,
            percent: 0,
            received: 0,
            persisted: 0,
        }
    }
}

pub fn percent_elapsed(elapsed: Duration, budget: Duration) -> u8 {
    if budget.is_zero() {
        return 100;
    }
    let pct = elapsed.as_secs_f64() / budget.as_secs_f64() * 100.0;
    pct.clamp(0.0, 100.0) as u8
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DropCounts {
    pub repost: u64,
    pub malformed: u64,
    pub unmatched: u64,
    pub classify_failed: u64,
}

/// Final account of a session.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SessionReport {
    pub collection: String,
    pub started_at: DateTime<Utc>,
    pub elapsed_ms: u64,
    pub received: u64,
    pub persisted: u64,
    pub dropped: DropCounts,
    pub store_errors: u64,
    pub transport_errors: u64,
    pub rate_limit_pauses: u64,
    /// The transport terminated before the duration budget elapsed.
    pub ended_early: bool,
    pub final_state: PipelineState,
}

impl SessionReport {
    pub fn new(collection: &str) -> Self {
        Self {
            collection: collection.to_string(),
            started_at: Utc::now(),
            elapsed_ms: 0,
            received: 0,
            persisted: 0,
            dropped: DropCounts::default(),
            store_errors: 0,
            transport_errors: 0,
            rate_limit_pauses: 0,
            ended_early: false,
            final_state: PipelineState::Idle,
        }
    }
}

/// Returned to the caller once the session task is running.
pub struct SessionHandle {
    pub status: watch::Receiver<SessionStatus>,
    pub join: JoinHandle<SessionReport>,
}

impl SessionHandle {
    pub async fn wait(self) -> Result<SessionReport, JoinError> {
        self.join.await
    }
}
