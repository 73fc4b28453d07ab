// src/ingest/types.rs
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::sentiment::Sentiment;

/// Raw payload line from the feed transport. Every field is optional: the feed is
/// untrusted and also interleaves control messages (limit notices, deletes) that
/// carry none of the post fields.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawEvent {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub retweeted_status: Option<serde_json::Value>,
    #[serde(default)]
    pub truncated: Option<bool>,
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extended_tweet: Option<ExtendedBody>,
    #[serde(default)]
    pub created_at: Option<String>,
    #[serde(default)]
    pub geo: Option<serde_json::Value>,
    #[serde(default)]
    pub user: Option<RawAuthor>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExtendedBody {
    #[serde(default)]
    pub full_text: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawAuthor {
    #[serde(default)]
    pub id_str: Option<String>,
    #[serde(default)]
    pub id: Option<u64>,
    #[serde(default)]
    pub followers_count: Option<u64>,
    #[serde(default)]
    pub location: Option<String>,
}

/// A line from the transport that is not a JSON object we can read.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("malformed feed event: {0}")]
pub struct MalformedEvent(pub String);

impl RawEvent {
    /// Parse one newline-delimited payload from the feed.
    pub fn from_line(line: &str) -> Result<Self, MalformedEvent> {
        serde_json::from_str(line.trim()).map_err(|e| MalformedEvent(e.to_string()))
    }

    pub fn is_repost(&self) -> bool {
        self.retweeted_status.is_some()
    }
}

/// Canonical record extracted from a raw event by the normalizer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CanonicalPost {
    #[serde(rename = "id")]
    pub author_id: String,
    pub created_at: DateTime<Utc>,
    pub text: String,
    pub location: Option<String>,
    #[serde(rename = "followers")]
    pub follower_count: u64,
}

/// The persisted unit: a canonical post tagged with its subject and sentiment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassifiedPost {
    #[serde(flatten)]
    pub post: CanonicalPost,
    pub subject: String,
    pub sentiment: Sentiment,
}
