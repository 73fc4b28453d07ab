//! # Collection summary
//! Read-only aggregation over a persisted collection: label counts per subject,
//! the latest post time, and the most-followed authors' posts.
//!
//! Scores are reported as stored (raw confidence); no sign is applied here.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::ingest::types::ClassifiedPost;
use crate::sentiment::SentimentLabel;

pub const DEFAULT_TOP_POSTS: usize = 10;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SubjectSummary {
    pub subject: String,
    pub total: usize,
    pub negative: usize,
    pub neutral: usize,
    pub positive: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CollectionSummary {
    pub collection: String,
    pub total: usize,
    pub last_created_at: Option<DateTime<Utc>>,
    pub subjects: Vec<SubjectSummary>,
    pub top_posts: Vec<ClassifiedPost>,
}

pub fn summarize(collection: &str, records: &[ClassifiedPost], top_n: usize) -> CollectionSummary {
    let mut by_subject: BTreeMap<&str, SubjectSummary> = BTreeMap::new();
    for r in records {
        let s = by_subject
            .entry(r.subject.as_str())
            .or_insert_with(|| SubjectSummary {
                subject: r.subject.clone(),
                ..Default::default()
            });
        s.total += 1;
        match r.sentiment.label {
            SentimentLabel::Negative => s.negative += 1,
            SentimentLabel::Neutral => s.neutral += 1,
            SentimentLabel::Positive => s.positive += 1,
        }
    }

    let mut top: Vec<&ClassifiedPost> = records.iter().collect();
    // Stable: equal follower counts keep insertion order.
    top.sort_by(|a, b| b.post.follower_count.cmp(&a.post.follower_count));

    CollectionSummary {
        collection: collection.to_string(),
        total: records.len(),
        last_created_at: records.iter().map(|r| r.post.created_at).max(),
        subjects: by_subject.into_values().collect(),
        top_posts: top.into_iter().take(top_n).cloned().collect(),
    }
}
