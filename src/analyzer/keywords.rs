use crate::utils::tokenize;
use std::collections::{HashMap, HashSet};

const MIN_TOKEN_LEN: usize = 3;

const STOPWORDS: &[&str] = &[
    "a", "about", "after", "all", "also", "am", "an", "and", "any", "are", "as", "at", "be",
    "because", "been", "before", "but", "by", "can", "could", "did", "do", "does", "for", "from",
    "get", "got", "had", "has", "have", "he", "her", "him", "his", "how", "i", "if", "in", "into",
    "is", "it", "it's", "its", "just", "me", "more", "most", "my", "no", "not", "now", "of", "on",
    "only", "or", "other", "our", "out", "over", "please", "so", "some", "than", "that", "the",
    "their", "them", "then", "there", "these", "they", "this", "those", "to", "too", "up", "us",
    "use", "using", "very", "was", "we", "were", "what", "when", "which", "while", "who", "why",
    "will", "with", "would", "you", "your", "i'm", "don't", "doesn't", "can't", "app",
    "application", "bank", "banking",
];

/// Frequency-count keyword extraction over tokenized, stopword-filtered text.
pub struct KeywordExtractor {
    stopwords: HashSet<&'static str>,
}

impl KeywordExtractor {
    pub fn new() -> Self {
        Self {
            stopwords: STOPWORDS.iter().copied().collect(),
        }
    }

    fn keep(&self, token: &str) -> bool {
        token.chars().count() >= MIN_TOKEN_LEN
            && !self.stopwords.contains(token)
            && !token.chars().all(|c| c.is_ascii_digit())
    }

    /// Most frequent tokens, highest count first; ties break alphabetically.
    pub fn top_keywords<'a, I>(&self, texts: I, limit: usize) -> Vec<(String, usize)>
    where
        I: IntoIterator<Item = &'a str>,
    {
        let mut counts: HashMap<String, usize> = HashMap::new();
        for text in texts {
            for token in tokenize(text).filter(|t| self.keep(t)) {
                *counts.entry(token).or_default() += 1;
            }
        }

        let mut ranked: Vec<(String, usize)> = counts.into_iter().collect();
        ranked.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
        ranked.truncate(limit);
        ranked
    }
}

impl Default for KeywordExtractor {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stopwords_and_short_tokens_ignored() {
        let extractor = KeywordExtractor::new();
        let top = extractor.top_keywords(["the app is ok and it is so good", "good app, ok"], 10);
        assert_eq!(top, vec![("good".to_string(), 2)]);
    }

    #[test]
    fn test_ordering_and_limit() {
        let extractor = KeywordExtractor::new();
        let top = extractor.top_keywords(
            ["transfer failed", "transfer slow", "otp failed", "transfer otp", "2024 2024 2024"],
            3,
        );
        assert_eq!(
            top,
            vec![
                ("transfer".to_string(), 3),
                ("failed".to_string(), 2),
                ("otp".to_string(), 2),
            ]
        );
    }

    #[test]
    fn test_empty_input() {
        let extractor = KeywordExtractor::new();
        assert!(extractor.top_keywords(Vec::<&str>::new(), 5).is_empty());
    }
}
