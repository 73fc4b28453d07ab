// src/feed/mod.rs
//! Live feed transport: the connection yielding raw events that match a
//! server-side keyword filter.

pub mod http;
pub mod oauth;

use crate::ingest::types::{MalformedEvent, RawEvent};

pub use http::HttpFeedTransport;

/// Statuses the feed uses to signal rate limiting (420 "Enhance Your Calm", 429).
pub const RATE_LIMIT_STATUSES: [u16; 2] = [420, 429];

/// Server-side filter the transport is opened with.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamFilter {
    pub keywords: Vec<String>,
    pub language: String,
}

impl StreamFilter {
    pub fn track_param(&self) -> String {
        self.keywords.join(",")
    }
}

#[derive(Debug, thiserror::Error)]
pub enum FeedError {
    #[error("rate limited (http {status})")]
    RateLimited { status: u16 },

    #[error("feed returned http {status}")]
    Status { status: u16 },

    #[error("network error: {0}")]
    Network(String),

    #[error(transparent)]
    Malformed(#[from] MalformedEvent),
}

impl FeedError {
    pub fn from_status(status: u16) -> Self {
        if RATE_LIMIT_STATUSES.contains(&status) {
            FeedError::RateLimited { status }
        } else {
            FeedError::Status { status }
        }
    }

    pub fn is_rate_limit(&self) -> bool {
        matches!(self, FeedError::RateLimited { .. })
    }
}

#[async_trait::async_trait]
pub trait FeedTransport: Send {
    /// (Re)open the connection with `filter`. Any previous connection is dropped.
    async fn open(&mut self, filter: &StreamFilter) -> Result<(), FeedError>;

    /// Next event, a per-event/transport error, or `None` once the transport has
    /// terminated and will yield nothing more.
    async fn next_event(&mut self) -> Option<Result<RawEvent, FeedError>>;

    async fn close(&mut self);
}

/// Authenticated, not yet opened transport.
pub type FeedHandle = Box<dyn FeedTransport>;
