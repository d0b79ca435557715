// Sentiment tagging: pluggable models behind one async trait.

pub mod inference_api;
pub mod lexicon;

pub use inference_api::InferenceApiModel;
pub use lexicon::LexiconModel;

use crate::config::{SentimentBackend, SentimentConfig};
use crate::model::{
    CleanedReview, SentimentError, SentimentLabel, SentimentResult, TaggedReview,
};
use std::collections::BTreeMap;
use tracing::{info, warn};

/// Text in, (label, confidence) out. Implementations keep no state between calls.
#[async_trait::async_trait]
pub trait SentimentModel: Send + Sync {
    async fn classify(&self, text: &str) -> Result<SentimentResult, SentimentError>;

    fn name(&self) -> &'static str;
}

#[derive(Debug, Clone, Default)]
pub struct TaggingReport {
    pub tagged: usize,
    pub fallbacks: usize,
    pub per_label: BTreeMap<SentimentLabel, usize>,
}

pub fn build_model(cfg: &SentimentConfig) -> Result<Box<dyn SentimentModel>, SentimentError> {
    match cfg.backend {
        SentimentBackend::Lexicon => Ok(Box::new(LexiconModel::new())),
        SentimentBackend::InferenceApi => Ok(Box::new(InferenceApiModel::new(cfg)?)),
    }
}

/// Classifies every review in order. A failed call is logged and recorded as Neutral/0.0.
pub async fn tag_reviews(
    model: &dyn SentimentModel,
    reviews: Vec<CleanedReview>,
) -> (Vec<TaggedReview>, TaggingReport) {
    info!("Tagging {} reviews with {}", reviews.len(), model.name());
    let mut report = TaggingReport::default();
    let mut tagged = Vec::with_capacity(reviews.len());

    for review in reviews {
        let sentiment = match model.classify(&review.review).await {
            Ok(s) => s,
            Err(e) => {
                warn!("Sentiment failed for review ({}): {}", review.bank_code, e);
                report.fallbacks += 1;
                SentimentResult {
                    label: SentimentLabel::Neutral,
                    score: 0.0,
                }
            }
        };
        *report.per_label.entry(sentiment.label).or_default() += 1;
        report.tagged += 1;
        tagged.push(TaggedReview { review, sentiment });
    }

    info!(
        "Tagged {} reviews ({} fallbacks): {:?}",
        report.tagged, report.fallbacks, report.per_label
    );
    (tagged, report)
}
