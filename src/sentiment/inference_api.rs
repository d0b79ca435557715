use crate::config::SentimentConfig;
use crate::model::{SentimentError, SentimentLabel, SentimentResult};
use crate::sentiment::SentimentModel;

use reqwest::Client;
use serde::Deserialize;
use serde_json::json;
use std::time::Duration;

#[derive(Debug, Deserialize)]
struct LabelScore {
    label: String,
    score: f64,
}

/// The endpoint answers either `[[{label, score}, ...]]` or `[{label, score}, ...]`.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum ClassifierResponse {
    Nested(Vec<Vec<LabelScore>>),
    Flat(Vec<LabelScore>),
}

/// Remote text-classification model (a hosted binary sentiment classifier).
pub struct InferenceApiModel {
    client: Client,
    endpoint: String,
    api_token: Option<String>,
    neutral_threshold: f64,
}

impl InferenceApiModel {
    pub fn new(cfg: &SentimentConfig) -> Result<Self, SentimentError> {
        let client = Client::builder().timeout(Duration::from_secs(30)).build()?;
        Ok(Self {
            client,
            endpoint: cfg.endpoint.clone(),
            api_token: cfg.api_token.clone(),
            neutral_threshold: cfg.neutral_threshold,
        })
    }

    /// Picks the top label; a low-confidence top label becomes Neutral.
    fn interpret(
        response: ClassifierResponse,
        neutral_threshold: f64,
    ) -> Result<SentimentResult, SentimentError> {
        let candidates = match response {
            ClassifierResponse::Nested(outer) => outer.into_iter().flatten().collect::<Vec<_>>(),
            ClassifierResponse::Flat(v) => v,
        };

        let top = candidates
            .into_iter()
            .filter(|c| c.score.is_finite())
            .max_by(|a, b| a.score.total_cmp(&b.score))
            .ok_or(SentimentError::EmptyResponse)?;

        let label = SentimentLabel::parse(&top.label).ok_or(SentimentError::EmptyResponse)?;
        let score = top.score.clamp(0.0, 1.0);

        if score < neutral_threshold {
            Ok(SentimentResult {
                label: SentimentLabel::Neutral,
                score,
            })
        } else {
            Ok(SentimentResult { label, score })
        }
    }
}

#[async_trait::async_trait]
impl SentimentModel for InferenceApiModel {
    async fn classify(&self, text: &str) -> Result<SentimentResult, SentimentError> {
        let mut request = self.client.post(&self.endpoint).json(&json!({ "inputs": text }));
        if let Some(token) = &self.api_token {
            request = request.bearer_auth(token);
        }

        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_else(|_| "unknown".into());
            return Err(SentimentError::ApiError(format!("[{}] {}", status, body)));
        }

        let parsed: ClassifierResponse = response.json().await?;
        Self::interpret(parsed, self.neutral_threshold)
    }

    fn name(&self) -> &'static str {
        "inference-api"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(body: &str) -> ClassifierResponse {
        serde_json::from_str(body).unwrap()
    }

    #[test]
    fn test_nested_response_takes_top_label() {
        let body = r#"[[{"label":"NEGATIVE","score":0.03},{"label":"POSITIVE","score":0.97}]]"#;
        let r = InferenceApiModel::interpret(parse(body), 0.6).unwrap();
        assert_eq!(r.label, SentimentLabel::Positive);
        assert!((r.score - 0.97).abs() < 1e-9);
    }

    #[test]
    fn test_flat_response() {
        let body = r#"[{"label":"NEGATIVE","score":0.88},{"label":"POSITIVE","score":0.12}]"#;
        let r = InferenceApiModel::interpret(parse(body), 0.6).unwrap();
        assert_eq!(r.label, SentimentLabel::Negative);
    }

    #[test]
    fn test_low_confidence_is_neutral() {
        let body = r#"[[{"label":"POSITIVE","score":0.55},{"label":"NEGATIVE","score":0.45}]]"#;
        let r = InferenceApiModel::interpret(parse(body), 0.6).unwrap();
        assert_eq!(r.label, SentimentLabel::Neutral);
        assert!((r.score - 0.55).abs() < 1e-9);
    }

    #[test]
    fn test_empty_or_unknown_label_is_error() {
        assert!(InferenceApiModel::interpret(parse("[[]]"), 0.6).is_err());
        let body = r#"[{"label":"SARCASTIC","score":0.99}]"#;
        assert!(InferenceApiModel::interpret(parse(body), 0.6).is_err());
    }
}
