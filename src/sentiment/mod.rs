// src/sentiment/mod.rs
//! Sentiment classification: text → closed label set + confidence.
//!
//! A classifier is built once per process and handed to every capture session by
//! reference (`SharedClassifier`); sessions never construct their own.

pub mod inference;
pub mod lexicon;

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::config::{ClassifierConfig, ClassifierKind};

pub use inference::InferenceClassifier;
pub use lexicon::LexiconClassifier;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum SentimentLabel {
    Negative,
    Neutral,
    Positive,
}

impl SentimentLabel {
    /// Map a model output label (`LABEL_0..2` or plain names) onto the closed set.
    pub fn from_model_label(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "label_0" | "negative" | "neg" => Some(Self::Negative),
            "label_1" | "neutral" | "neu" => Some(Self::Neutral),
            "label_2" | "positive" | "pos" => Some(Self::Positive),
            _ => None,
        }
    }
}

impl fmt::Display for SentimentLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Negative => "Negative",
            Self::Neutral => "Neutral",
            Self::Positive => "Positive",
        };
        f.write_str(s)
    }
}

/// Label plus the classifier's raw (unsigned) confidence in `[0, 1]`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Sentiment {
    pub label: SentimentLabel,
    pub score: f32,
}

impl Sentiment {
    /// Clamps `score` into `[0, 1]`; NaN becomes 0.
    pub fn new(label: SentimentLabel, score: f32) -> Self {
        let score = if score.is_nan() {
            0.0
        } else {
            score.clamp(0.0, 1.0)
        };
        Self { label, score }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ClassifyError {
    #[error("empty input")]
    EmptyInput,

    #[error("input too long: {chars} chars (max {max})")]
    InputTooLong { chars: usize, max: usize },

    #[error("classifier unavailable: {0}")]
    Unavailable(String),

    #[error("inference failed: {0}")]
    Inference(String),
}

#[async_trait::async_trait]
pub trait SentimentClassifier: Send + Sync {
    async fn classify(&self, text: &str) -> Result<Sentiment, ClassifyError>;
    fn name(&self) -> &'static str;
}

pub type SharedClassifier = Arc<dyn SentimentClassifier>;

/// Factory: build the configured classifier.
pub fn build_classifier(cfg: &ClassifierConfig) -> anyhow::Result<SharedClassifier> {
    match cfg.kind {
        ClassifierKind::Lexicon => Ok(Arc::new(LexiconClassifier::new())),
        ClassifierKind::Inference => {
            let c = InferenceClassifier::new(&cfg.endpoint, cfg.api_key.clone())?;
            Ok(Arc::new(c))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn score_is_clamped() {
        assert_eq!(Sentiment::new(SentimentLabel::Positive, 1.7).score, 1.0);
        assert_eq!(Sentiment::new(SentimentLabel::Negative, -0.2).score, 0.0);
        assert_eq!(Sentiment::new(SentimentLabel::Neutral, f32::NAN).score, 0.0);
    }

    #[test]
    fn model_labels_map_to_closed_set() {
        assert_eq!(
            SentimentLabel::from_model_label("LABEL_0"),
            Some(SentimentLabel::Negative)
        );
        assert_eq!(
            SentimentLabel::from_model_label("Neutral"),
            Some(SentimentLabel::Neutral)
        );
        assert_eq!(
            SentimentLabel::from_model_label("label_2"),
            Some(SentimentLabel::Positive)
        );
        assert_eq!(SentimentLabel::from_model_label("LABEL_3"), None);
    }

    #[test]
    fn label_serializes_by_name() {
        let s = Sentiment::new(SentimentLabel::Positive, 0.9);
        let v = serde_json::to_value(s).unwrap();
        assert_eq!(v["label"], "Positive");
    }
}
