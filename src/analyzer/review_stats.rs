use crate::analyzer::keywords::KeywordExtractor;
use crate::model::{SentimentLabel, StoredReview};
use std::collections::BTreeMap;

#[derive(Debug, Clone, PartialEq)]
pub struct BankStats {
    pub bank_code: String,
    pub bank_name: String,
    pub review_count: usize,
    pub avg_rating: f64,
    /// Index 0 holds 1-star counts, index 4 holds 5-star counts.
    pub rating_distribution: [usize; 5],
    pub sentiment_counts: BTreeMap<SentimentLabel, usize>,
}

impl BankStats {
    pub fn sentiment_pct(&self, label: SentimentLabel) -> f64 {
        percent(self.sentiment_counts.get(&label).copied().unwrap_or(0), self.review_count)
    }
}

#[derive(Debug, Clone, Default)]
pub struct ReviewSummary {
    pub total_reviews: usize,
    pub sentiment_counts: BTreeMap<SentimentLabel, usize>,
    pub banks: Vec<BankStats>,
    pub top_positive_keywords: Vec<(String, usize)>,
    pub top_negative_keywords: Vec<(String, usize)>,
}

impl ReviewSummary {
    pub fn sentiment_pct(&self, label: SentimentLabel) -> f64 {
        percent(self.sentiment_counts.get(&label).copied().unwrap_or(0), self.total_reviews)
    }
}

pub fn percent(part: usize, whole: usize) -> f64 {
    if whole == 0 {
        0.0
    } else {
        part as f64 * 100.0 / whole as f64
    }
}

/// Interface for turning stored reviews into report-ready aggregates.
pub trait Analyzer {
    fn bank_stats(&self, reviews: &[StoredReview]) -> Vec<BankStats>;
    fn summarize(&self, reviews: &[StoredReview]) -> ReviewSummary;
}

pub struct ReviewAnalyzer {
    keywords: KeywordExtractor,
    top_keywords: usize,
}

impl ReviewAnalyzer {
    pub fn new(top_keywords: usize) -> Self {
        Self {
            keywords: KeywordExtractor::new(),
            top_keywords,
        }
    }

    fn keywords_for(
        &self,
        reviews: &[StoredReview],
        label: SentimentLabel,
    ) -> Vec<(String, usize)> {
        self.keywords.top_keywords(
            reviews
                .iter()
                .filter(|r| r.sentiment.label == label)
                .map(|r| r.review_text.as_str()),
            self.top_keywords,
        )
    }
}

impl Analyzer for ReviewAnalyzer {
    /// Per-bank rating distribution, average rating and sentiment split, ordered by bank code.
    fn bank_stats(&self, reviews: &[StoredReview]) -> Vec<BankStats> {
        let mut map: BTreeMap<&str, BankStats> = BTreeMap::new();
        let mut rating_sums: BTreeMap<&str, u64> = BTreeMap::new();

        for r in reviews {
            let stats = map.entry(r.bank_code.as_str()).or_insert_with(|| BankStats {
                bank_code: r.bank_code.clone(),
                bank_name: r.bank_name.clone(),
                review_count: 0,
                avg_rating: 0.0,
                rating_distribution: [0; 5],
                sentiment_counts: BTreeMap::new(),
            });
            stats.review_count += 1;
            if (1..=5).contains(&r.rating) {
                stats.rating_distribution[(r.rating - 1) as usize] += 1;
            }
            *stats.sentiment_counts.entry(r.sentiment.label).or_default() += 1;
            *rating_sums.entry(r.bank_code.as_str()).or_default() += u64::from(r.rating);
        }

        map.into_iter()
            .map(|(code, mut stats)| {
                let sum = rating_sums.get(code).copied().unwrap_or(0);
                stats.avg_rating = sum as f64 / stats.review_count as f64;
                stats
            })
            .collect()
    }

    fn summarize(&self, reviews: &[StoredReview]) -> ReviewSummary {
        let mut sentiment_counts = BTreeMap::new();
        for r in reviews {
            *sentiment_counts.entry(r.sentiment.label).or_default() += 1;
        }

        ReviewSummary {
            total_reviews: reviews.len(),
            sentiment_counts,
            banks: self.bank_stats(reviews),
            top_positive_keywords: self.keywords_for(reviews, SentimentLabel::Positive),
            top_negative_keywords: self.keywords_for(reviews, SentimentLabel::Negative),
        }
    }
}
