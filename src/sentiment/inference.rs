//! Remote model inference over HTTP (hosted text-classification endpoint).
//!
//! The endpoint answers `[[{"label": "LABEL_2", "score": 0.93}, ...]]`; the best
//! scoring label wins.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::{ClassifyError, Sentiment, SentimentClassifier, SentimentLabel};

pub const DEFAULT_INFERENCE_ENDPOINT: &str =
    "https://api-inference.huggingface.co/models/cardiffnlp/twitter-roberta-base-sentiment";

/// The hosted model truncates long inputs silently; refuse them instead.
pub const MAX_INFERENCE_CHARS: usize = 2_000;

pub struct InferenceClassifier {
    http: reqwest::Client,
    endpoint: String,
    api_key: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LabelScore {
    pub label: String,
    pub score: f32,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum InferenceResp {
    Nested(Vec<Vec<LabelScore>>),
    Flat(Vec<LabelScore>),
}

impl InferenceClassifier {
    pub fn new(endpoint: &str, api_key: String) -> anyhow::Result<Self> {
        let http = reqwest::Client::builder()
            .user_agent("stream-sentiment/0.1")
            .connect_timeout(Duration::from_secs(4))
            .timeout(Duration::from_secs(15))
            .build()?;
        Ok(Self {
            http,
            endpoint: endpoint.to_string(),
            api_key,
        })
    }
}

/// Pick the highest-scoring known label.
pub fn best_label(scores: &[LabelScore]) -> Option<Sentiment> {
    scores
        .iter()
        .filter_map(|ls| SentimentLabel::from_model_label(&ls.label).map(|l| (l, ls.score)))
        .filter(|(_, s)| !s.is_nan())
        .max_by(|a, b| a.1.total_cmp(&b.1))
        .map(|(label, score)| Sentiment::new(label, score))
}

#[async_trait::async_trait]
impl SentimentClassifier for InferenceClassifier {
    async fn classify(&self, text: &str) -> Result<Sentiment, ClassifyError> {
        if text.trim().is_empty() {
            return Err(ClassifyError::EmptyInput);
        }
        let chars = text.chars().count();
        if chars > MAX_INFERENCE_CHARS {
            return Err(ClassifyError::InputTooLong {
                chars,
                max: MAX_INFERENCE_CHARS,
            });
        }

        #[derive(Serialize)]
        struct Req<'a> {
            inputs: &'a str,
        }

        let mut req = self.http.post(&self.endpoint).json(&Req { inputs: text });
        if !self.api_key.is_empty() {
            req = req.bearer_auth(&self.api_key);
        }
        let resp = req
            .send()
            .await
            .map_err(|e| ClassifyError::Unavailable(e.to_string()))?;

        let status = resp.status();
        if status.as_u16() == 503 {
            return Err(ClassifyError::Unavailable("model loading".into()));
        }
        if !status.is_success() {
            return Err(ClassifyError::Inference(format!("http status {status}")));
        }

        let body: InferenceResp = resp
            .json()
            .await
            .map_err(|e| ClassifyError::Inference(e.to_string()))?;
        let scores = match body {
            InferenceResp::Nested(mut outer) if !outer.is_empty() => outer.swap_remove(0),
            InferenceResp::Nested(_) => Vec::new(),
            InferenceResp::Flat(v) => v,
        };
        best_label(&scores).ok_or_else(|| ClassifyError::Inference("no known label".into()))
    }

    fn name(&self) -> &'static str {
        "inference"
    }
}
