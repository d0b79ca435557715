// Core structs: RawReview, CleanedReview, SentimentResult, StoredReview
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

pub const PLAY_STORE_SOURCE: &str = "Google Play Store";

/// A review exactly as collected from the store. Everything but the bank is optional
/// because the raw CSV is allowed to carry holes.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RawReview {
    pub review_id: Option<String>,
    pub user_name: Option<String>,
    pub review_text: Option<String>,
    #[serde(deserialize_with = "csv::invalid_option")]
    pub rating: Option<f64>,
    pub review_date: Option<String>,
    #[serde(default, deserialize_with = "csv::invalid_option")]
    pub thumbs_up_count: Option<u64>,
    pub reply_content: Option<String>,
    pub bank_code: String,
    pub bank_name: Option<String>,
    pub app_id: Option<String>,
    pub source: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CleanedReview {
    pub review: String,
    pub rating: u8,
    pub date: NaiveDate,
    pub bank_code: String,
    pub source: String,
    pub reply: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum SentimentLabel {
    Positive,
    Negative,
    Neutral,
}

impl SentimentLabel {
    pub const ALL: [SentimentLabel; 3] = [
        SentimentLabel::Positive,
        SentimentLabel::Negative,
        SentimentLabel::Neutral,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            SentimentLabel::Positive => "Positive",
            SentimentLabel::Negative => "Negative",
            SentimentLabel::Neutral => "Neutral",
        }
    }

    /// Accepts our own labels as well as the upper-case ones classifiers emit.
    pub fn parse(label: &str) -> Option<Self> {
        match label.trim().to_ascii_lowercase().as_str() {
            "positive" | "pos" | "label_1" => Some(SentimentLabel::Positive),
            "negative" | "neg" | "label_0" => Some(SentimentLabel::Negative),
            "neutral" => Some(SentimentLabel::Neutral),
            _ => None,
        }
    }
}

impl fmt::Display for SentimentLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SentimentResult {
    pub label: SentimentLabel,
    pub score: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TaggedReview {
    pub review: CleanedReview,
    pub sentiment: SentimentResult,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Bank {
    pub bank_id: i64,
    pub bank_code: String,
    pub bank_name: String,
}

/// A review row read back from storage, joined with its bank.
#[derive(Debug, Clone, PartialEq)]
pub struct StoredReview {
    pub review_id: i64,
    pub bank_code: String,
    pub bank_name: String,
    pub review_text: String,
    pub rating: u8,
    pub review_date: NaiveDate,
    pub sentiment: SentimentResult,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum DropReason {
    Duplicate,
    MissingField,
    DateParseFailure,
    InvalidRating,
}

impl fmt::Display for DropReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            DropReason::Duplicate => "duplicate",
            DropReason::MissingField => "missing field",
            DropReason::DateParseFailure => "unparseable date",
            DropReason::InvalidRating => "invalid rating",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Error)]
pub enum ScraperError {
    #[error("http error: {0}")]
    HttpError(String),
    #[error("request timed out")]
    Timeout,
    #[error("invalid response: status {0}")]
    InvalidResponse(u16),
    #[error(transparent)]
    Parse(#[from] ParserError),
}

impl From<reqwest::Error> for ScraperError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            ScraperError::Timeout
        } else {
            ScraperError::HttpError(e.to_string())
        }
    }
}

#[derive(Debug, Error)]
pub enum ParserError {
    #[error("malformed payload: {0}")]
    Malformed(String),
    #[error("missing field: {0}")]
    MissingField(String),
}

impl From<serde_json::Error> for ParserError {
    fn from(e: serde_json::Error) -> Self {
        ParserError::Malformed(e.to_string())
    }
}

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("database error: {0}")]
    DatabaseError(#[from] rusqlite::Error),
    #[error("load failed for bank {bank_code}: {reason}")]
    LoadFailure { bank_code: String, reason: String },
    #[error("storage io error: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Debug, Error)]
pub enum CsvError {
    #[error("io error on {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error(transparent)]
    Csv(#[from] csv::Error),
    #[error("{path} is missing columns: {missing:?}")]
    MissingColumns { path: String, missing: Vec<String> },
    #[error("invalid value in {path}: {reason}")]
    InvalidValue { path: String, reason: String },
}

#[derive(Debug, Error)]
pub enum SentimentError {
    #[error("classifier request failed: {0}")]
    ApiError(String),
    #[error("classifier returned no usable label")]
    EmptyResponse,
}

impl From<reqwest::Error> for SentimentError {
    fn from(e: reqwest::Error) -> Self {
        SentimentError::ApiError(e.to_string())
    }
}

#[derive(Debug, Error)]
pub enum ReportError {
    #[error("failed to write report {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse config: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("invalid config: {0}")]
    Invalid(String),
}
