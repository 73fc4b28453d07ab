use once_cell::sync::Lazy;
use std::collections::HashMap;

use super::{ClassifyError, Sentiment, SentimentClassifier, SentimentLabel};

static LEXICON: Lazy<HashMap<String, i32>> = Lazy::new(|| {
    let raw = include_str!("../../sentiment_lexicon.json");
    serde_json::from_str::<HashMap<String, i32>>(raw).expect("valid sentiment lexicon")
});

/// Inputs longer than this are rejected rather than scored.
pub const MAX_INPUT_CHARS: usize = 4_096;

/// Word-lexicon classifier with short-range negation.
#[derive(Debug, Clone, Default)]
pub struct LexiconClassifier;

impl LexiconClassifier {
    pub fn new() -> Self {
        Self
    }

    #[inline]
    fn word_score(&self, w: &str) -> i32 {
        *LEXICON.get(w).unwrap_or(&0)
    }

    /// Returns (summed score, number of lexicon hits).
    /// A negator within the previous 1..=3 tokens flips the sign of a word's score.
    pub fn score_text(&self, text: &str) -> (i32, usize) {
        let tokens: Vec<String> = tokenize(text).collect();
        let mut score: i32 = 0;
        let mut hits = 0usize;

        for i in 0..tokens.len() {
            let base = self.word_score(tokens[i].as_str());
            if base == 0 {
                continue;
            }
            let negated = (1..=3).any(|k| i >= k && is_negator(tokens[i - k].as_str()));
            score += if negated { -base } else { base };
            hits += 1;
        }

        (score, hits)
    }

    /// Polar results map |score| onto (0.5, 1); neutral confidence shrinks as more
    /// opposing hits cancel out.
    fn to_sentiment(score: i32, hits: usize) -> Sentiment {
        let magnitude = score.unsigned_abs() as f32;
        match score {
            s if s > 0 => Sentiment::new(
                SentimentLabel::Positive,
                0.5 + 0.5 * magnitude / (magnitude + 2.0),
            ),
            s if s < 0 => Sentiment::new(
                SentimentLabel::Negative,
                0.5 + 0.5 * magnitude / (magnitude + 2.0),
            ),
            _ => Sentiment::new(SentimentLabel::Neutral, 1.0 / (1.0 + hits as f32)),
        }
    }
}

#[async_trait::async_trait]
impl SentimentClassifier for LexiconClassifier {
    async fn classify(&self, text: &str) -> Result<Sentiment, ClassifyError> {
        if text.trim().is_empty() {
            return Err(ClassifyError::EmptyInput);
        }
        let chars = text.chars().count();
        if chars > MAX_INPUT_CHARS {
            return Err(ClassifyError::InputTooLong {
                chars,
                max: MAX_INPUT_CHARS,
            });
        }
        let (score, hits) = self.score_text(text);
        Ok(Self::to_sentiment(score, hits))
    }

    fn name(&self) -> &'static str {
        "lexicon"
    }
}

/// Alphanumeric tokens (apostrophes kept so contractions survive), lower-case.
fn tokenize(s: &str) -> impl Iterator<Item = String> + '_ {
    s.split(|c: char| !(c.is_alphanumeric() || c == '\''))
        .map(|t| t.trim_matches('\''))
        .filter(|t| !t.is_empty())
        .map(|t| t.to_lowercase())
}

fn is_negator(tok: &str) -> bool {
    matches!(
        tok,
        "not"
            | "no"
            | "never"
            | "isn't"
            | "wasn't"
            | "aren't"
            | "won't"
            | "can't"
            | "don't"
            | "doesn't"
            | "didn't"
            | "cannot"
            | "without"
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn embedded_lexicon_is_loaded() {
        assert!(LEXICON.len() > 50);
        assert!(LEXICON.get("love").is_some_and(|s| *s > 0));
        assert!(LEXICON.get("hate").is_some_and(|s| *s < 0));
    }

    #[tokio::test]
    async fn love_is_positive() {
        let c = LexiconClassifier::new();
        let s = c.classify("I love the new policy").await.unwrap();
        assert_eq!(s.label, SentimentLabel::Positive);
        assert!(s.score > 0.5 && s.score <= 1.0);
    }

    #[tokio::test]
    async fn negation_flips_polarity() {
        let c = LexiconClassifier::new();
        let s = c.classify("this is not good at all").await.unwrap();
        assert_eq!(s.label, SentimentLabel::Negative);
        let s = c.classify("I don't hate it").await.unwrap();
        assert_eq!(s.label, SentimentLabel::Positive);
    }

    #[tokio::test]
    async fn no_hits_is_confident_neutral() {
        let c = LexiconClassifier::new();
        let s = c.classify("the meeting is on tuesday").await.unwrap();
        assert_eq!(s.label, SentimentLabel::Neutral);
        assert_eq!(s.score, 1.0);
    }

    #[tokio::test]
    async fn oversized_input_fails() {
        let c = LexiconClassifier::new();
        let long = "a".repeat(MAX_INPUT_CHARS + 1);
        assert!(matches!(
            c.classify(&long).await,
            Err(ClassifyError::InputTooLong { .. })
        ));
        assert!(matches!(c.classify("  ").await, Err(ClassifyError::EmptyInput)));
    }
}
