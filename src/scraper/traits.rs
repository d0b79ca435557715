use crate::config::BankConfig;
use crate::model::{RawReview, ScraperError};

/// Anything that can hand back the most recent reviews for a bank's app.
#[async_trait::async_trait]
pub trait ReviewSource: Send + Sync {
    async fn fetch_reviews(
        &self,
        bank: &BankConfig,
        count: usize,
    ) -> Result<Vec<RawReview>, ScraperError>;

    fn name(&self) -> &'static str;
}
