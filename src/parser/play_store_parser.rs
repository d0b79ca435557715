// Google Play batch-execute review payload parsing
use crate::config::BankConfig;
use crate::model::{ParserError, RawReview, PLAY_STORE_SOURCE};
use chrono::DateTime;
use serde_json::Value;

const XSSI_PREFIX: &str = ")]}'";

/// One page of reviews plus the token that fetches the next one.
#[derive(Debug, Default)]
pub struct ReviewPage {
    pub reviews: Vec<RawReview>,
    pub next_token: Option<String>,
}

pub trait Parser {
    fn parse(&self, body: &str, bank: &BankConfig) -> Result<ReviewPage, ParserError>;
}

pub struct PlayStoreParser;

impl PlayStoreParser {
    pub fn new() -> Self {
        Self
    }

    /// The response is an XSSI-guarded JSON envelope whose `[0][2]` slot holds the
    /// real payload as a JSON-encoded string.
    fn unwrap_envelope(body: &str) -> Result<Option<Value>, ParserError> {
        let trimmed = body.trim_start();
        let json = trimmed.strip_prefix(XSSI_PREFIX).unwrap_or(trimmed);

        let mut stream = serde_json::Deserializer::from_str(json).into_iter::<Value>();
        let envelope = match stream.next() {
            Some(v) => v?,
            None => return Err(ParserError::Malformed("empty response body".into())),
        };

        let inner = envelope
            .get(0)
            .and_then(|e| e.get(2))
            .ok_or_else(|| ParserError::MissingField("envelope[0][2]".into()))?;

        match inner {
            Value::Null => Ok(None),
            Value::String(s) => Ok(Some(serde_json::from_str(s)?)),
            other => Err(ParserError::Malformed(format!(
                "expected string payload, got {}",
                other
            ))),
        }
    }

    fn at<'a>(value: &'a Value, path: &[usize]) -> Option<&'a Value> {
        path.iter().try_fold(value, |v, &i| v.get(i))
    }

    fn string_at(value: &Value, path: &[usize]) -> Option<String> {
        Self::at(value, path)
            .and_then(Value::as_str)
            .map(str::to_string)
    }

    fn parse_review(entry: &Value, bank: &BankConfig) -> Result<RawReview, ParserError> {
        let review_id = Self::string_at(entry, &[0])
            .ok_or_else(|| ParserError::MissingField("reviewId".into()))?;

        let review_date = Self::at(entry, &[5, 0])
            .and_then(Value::as_i64)
            .and_then(|secs| DateTime::from_timestamp(secs, 0))
            .map(|dt| dt.to_rfc3339());

        Ok(RawReview {
            review_id: Some(review_id),
            user_name: Self::string_at(entry, &[1, 0]),
            review_text: Self::string_at(entry, &[4]),
            rating: Self::at(entry, &[2]).and_then(Value::as_f64),
            review_date,
            thumbs_up_count: Some(Self::at(entry, &[6]).and_then(Value::as_u64).unwrap_or(0)),
            reply_content: Self::string_at(entry, &[7, 1]),
            bank_code: bank.code.clone(),
            bank_name: Some(bank.name.clone()),
            app_id: Some(Self::string_at(entry, &[10]).unwrap_or_else(|| "N/A".into())),
            source: Some(PLAY_STORE_SOURCE.to_string()),
        })
    }

    fn next_token(payload: &Value) -> Option<String> {
        // The token trails the review list as `[null, "<token>"]`.
        payload
            .as_array()?
            .iter()
            .skip(1)
            .find_map(|v| v.as_array()?.last()?.as_str())
            .map(str::to_string)
    }
}

impl Parser for PlayStoreParser {
    fn parse(&self, body: &str, bank: &BankConfig) -> Result<ReviewPage, ParserError> {
        let payload = match Self::unwrap_envelope(body)? {
            Some(p) => p,
            None => return Ok(ReviewPage::default()),
        };

        let entries = match payload.get(0) {
            Some(Value::Array(entries)) => entries.as_slice(),
            Some(Value::Null) | None => &[],
            Some(other) => {
                return Err(ParserError::Malformed(format!("unexpected review list: {}", other)));
            }
        };

        let mut reviews = Vec::with_capacity(entries.len());
        for entry in entries {
            match Self::parse_review(entry, bank) {
                Ok(r) => reviews.push(r),
                Err(e) => {
                    tracing::warn!("Skipping unreadable review entry for {}: {}", bank.code, e)
                }
            }
        }

        Ok(ReviewPage {
            reviews,
            next_token: Self::next_token(&payload),
        })
    }
}
