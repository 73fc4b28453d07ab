// src/ingest/matcher.rs
//! Subject assignment: which configured keyword phrase a post belongs to.

/// Keyword phrases in operator order, pre-split into lowercase words.
#[derive(Debug, Clone)]
pub struct KeywordMatcher {
    phrases: Vec<(String, Vec<String>)>,
}

impl KeywordMatcher {
    pub fn new<I, S>(keywords: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let phrases = keywords
            .into_iter()
            .map(|k| {
                let phrase: String = k.into();
                let words = phrase.split_whitespace().map(str::to_lowercase).collect();
                (phrase, words)
            })
            .collect();
        Self { phrases }
    }

    /// First phrase (in configured order) having any word that occurs in `text`,
    /// compared case-insensitively as a plain substring.
    pub fn subject_for(&self, text: &str) -> Option<&str> {
        let haystack = text.to_lowercase();
        self.phrases
            .iter()
            .find(|(_, words)| words.iter().any(|w| haystack.contains(w.as_str())))
            .map(|(phrase, _)| phrase.as_str())
    }
}
